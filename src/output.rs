/// Abstraction over user-facing output.
///
/// Command modules use this trait instead of `println!`/`eprintln!`; log
/// records go to the log file through `tracing`, while this is what the
/// operator sees on the terminal.
pub trait UserOutput: Send + Sync {
    /// Informational status message (e.g., "Discovered 3 servers")
    fn status(&self, message: &str);

    /// Success message (e.g., "Registered with smt-ec2.susecloud.net")
    fn success(&self, message: &str);

    /// Warning message (e.g., "Certificate import failed")
    fn warning(&self, message: &str);

    /// A blank line separator.
    fn blank(&self);
}

/// Standard CLI output: messages to stdout, warnings to stderr.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        println!("{}", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn blank(&self) {
        println!();
    }
}

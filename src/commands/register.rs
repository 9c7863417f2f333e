use crate::output::UserOutput;
use cloudregister::{RegisterOutcome, Registration};

pub async fn run_register(
    registration: &Registration,
    force_new: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    match registration.register(force_new).await? {
        RegisterOutcome::AlreadyRegistered(server) => {
            out.status(&format!("Already registered with {}", server));
            out.status("Use --force-new to register with a new server");
        }
        RegisterOutcome::Registered { server, report } => {
            out.success(&format!("Registered with {}", server));
            for path in &report.rewritten {
                out.status(&format!("  updated {}", path.display()));
            }
            if let Some(reason) = &report.trust_error {
                out.warning(&format!(
                    "Could not import the server certificate: {}",
                    reason
                ));
                out.warning("Run `cloudregister register --force-new` to retry");
            }
        }
    }

    Ok(())
}

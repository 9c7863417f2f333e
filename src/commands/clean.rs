use crate::output::UserOutput;
use cloudregister::Registration;

pub fn run_clean(
    registration: &Registration,
    keep_cache: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    match registration.clean(keep_cache)? {
        Some(report) => {
            for name in &report.credentials {
                out.status(&format!("  removed credentials {}", name));
            }
            for path in report.repos.iter().chain(&report.services) {
                out.status(&format!("  removed {}", path.display()));
            }
            if !report.hosts_block_removed {
                out.warning("No marked hosts entry found, hosts file left unchanged");
            }
            out.success("Registration removed");
        }
        None => out.status("Instance is not registered, nothing to remove"),
    }

    if !keep_cache {
        out.status("Candidate cache cleared");
    }

    Ok(())
}

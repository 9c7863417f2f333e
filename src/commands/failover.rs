use crate::output::UserOutput;
use cloudregister::{FailoverOutcome, Registration};

pub async fn run_failover(registration: &Registration, out: &dyn UserOutput) -> anyhow::Result<()> {
    match registration.failover().await? {
        FailoverOutcome::CurrentHealthy(server) => {
            out.status(&format!("{} is responsive, nothing to do", server));
        }
        FailoverOutcome::Switched { from, to, report } => {
            out.success(&format!("Switched from {} to {}", from, to));
            if let Some(reason) = &report.trust_error {
                out.warning(&format!(
                    "Could not import the server certificate: {}",
                    reason
                ));
            }
        }
    }

    Ok(())
}

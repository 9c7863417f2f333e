use crate::output::UserOutput;
use cloudregister::Registration;

pub async fn run_discover(registration: &Registration, out: &dyn UserOutput) -> anyhow::Result<()> {
    let servers = registration.discover().await?;

    out.status(&format!("Discovered {} registration server(s):", servers.len()));
    for server in &servers {
        out.status(&format!(
            "  {:<16} {:<40} {}",
            server.ip(),
            server.fqdn(),
            server.fingerprint()
        ));
    }

    Ok(())
}

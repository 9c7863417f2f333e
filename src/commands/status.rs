use crate::output::UserOutput;
use cloudregister::{Registration, ServerRecord};
use serde_json::json;

pub fn run_status(
    registration: &Registration,
    json: bool,
    package_manager_pid: Option<&str>,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let stored = registration.registry().load_current();
    let current = registration.inspect_current();
    let candidates = registration.candidates();

    if json {
        let status = json!({
            "registered": current.is_some(),
            "current": current.as_ref().map(server_json),
            "stored": stored.as_ref().map(server_json),
            "candidates": candidates.iter().map(server_json).collect::<Vec<_>>(),
            "package_manager_pid": package_manager_pid,
        });
        out.status(&serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    out.status("Registration Status:");
    out.status(&format!("{:-<50}", ""));
    match (&current, &stored) {
        (Some(server), _) => out.status(&format!("  + registered with {}", server)),
        (None, Some(server)) => out.status(&format!(
            "  x stored server {} does not match host state",
            server
        )),
        (None, None) => out.status("  o not registered"),
    }

    if let Some(server) = &current {
        if server.cert().is_none() {
            out.warning("  certificate for the current server is not known");
        }
    }

    out.blank();
    if candidates.is_empty() {
        out.status("No cached candidate servers");
    } else {
        out.status("Cached candidate servers:");
        for server in &candidates {
            out.status(&format!("  {:<16} {}", server.ip(), server.fqdn()));
        }
    }

    if let Some(pid) = package_manager_pid {
        out.blank();
        out.warning(&format!("zypper is running (PID {})", pid));
    }

    Ok(())
}

fn server_json(server: &ServerRecord) -> serde_json::Value {
    json!({
        "ip": server.ip(),
        "fqdn": server.fqdn(),
        "name": server.name(),
        "fingerprint": server.fingerprint(),
        "has_cert": server.cert().is_some(),
    })
}

//! Replacement selection for an unreachable registration server.

use crate::probe::ServerProbe;
use crate::server::ServerRecord;
use tracing::{debug, info};

/// First candidate, in the given order, that is equivalent to `current` and
/// answers the probe. A candidate sharing `current`'s address is never
/// returned. `None` means the caller has to fall back to full discovery.
pub async fn find_replacement(
    current: &ServerRecord,
    candidates: &[ServerRecord],
    probe: &dyn ServerProbe,
) -> Option<ServerRecord> {
    for candidate in candidates {
        if candidate.ip() == current.ip() {
            continue;
        }
        if !current.is_equivalent(candidate) {
            debug!("{} is not equivalent to {}", candidate, current);
            continue;
        }
        if probe.is_responsive(candidate).await {
            info!("Selected {} as replacement for {}", candidate, current);
            return Some(candidate.clone());
        }
    }

    info!("No equivalent responsive server found for {}", current);
    None
}

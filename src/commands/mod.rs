mod clean;
mod discover;
mod failover;
mod register;
mod status;

pub use clean::run_clean;
pub use discover::run_discover;
pub use failover::run_failover;
pub use register::run_register;
pub use status::run_status;

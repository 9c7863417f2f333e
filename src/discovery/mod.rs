//! Discovery of registration server data.
//!
//! - `transport` - the HTTP seam ([`HttpTransport`]) and its reqwest implementation
//! - `payload` - decoding region server XML and metadata JSON into records
//! - `instance_args` - strategies producing extra region server query arguments
//! - `client` - the [`DiscoveryClient`] trying metadata or region servers

mod client;
mod instance_args;
mod payload;
mod transport;

pub use client::*;
pub use instance_args::*;
pub use payload::*;
pub use transport::*;

#![allow(unused_assignments)]

//! # cloudregister
//!
//! Guest-side registration of a cloud instance with its region's SMT update
//! server.
//!
//! ## Features
//!
//! - **Discovery**: server data from a metadata endpoint (JSON) or from a
//!   shuffled list of region servers contacted over certificate-pinned HTTPS (XML)
//! - **Registry**: the current server and a candidate cache, persisted as
//!   owner-only versioned JSON records that load as absent when corrupt
//! - **Consistency checking**: the stored server is only trusted while the
//!   hosts file and the package manager configuration agree with it
//! - **Migration**: hosts entries, repository and service files, credentials
//!   and the system trust store follow the current server
//! - **Failover**: move to an equivalent, responsive server when the current
//!   one stops answering
//!
//! ## Quick Start
//!
//! ```no_run
//! use cloudregister::{Parser, RegisterOutcome, Registration};
//!
//! # async fn example() -> Result<(), cloudregister::Error> {
//! let config = Parser::new().load_config("/etc/regionserverclnt.yaml")?;
//! let registration = Registration::builder().config(config).build()?;
//!
//! match registration.register(false).await? {
//!     RegisterOutcome::AlreadyRegistered(server) => println!("using {}", server),
//!     RegisterOutcome::Registered { server, .. } => println!("registered with {}", server),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! Everything runs on one thread and network calls are awaited one at a time,
//! each bounded by the configured timeout. Host files are shared with other
//! tools, so mutating operations must run under a [`RegistrationLock`].

pub mod config;
pub mod consistency;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod failover;
pub mod hosts;
pub mod lock;
pub mod migration;
pub mod probe;
pub mod registration;
pub mod registry;
pub mod server;
pub mod stores;
pub mod trust;

pub use config::{ClientConfig, Parser, ProxyConfig, DEFAULT_CONFIG_FILE};
pub use consistency::ConsistencyChecker;
pub use discovery::{DiscoveryClient, DiscoveryMode, HttpRequest, HttpResponse, HttpTransport};
pub use error::{Error, Result};
pub use hosts::HostsFile;
pub use lock::RegistrationLock;
pub use migration::{Coordinator, MigrationReport, RetireReport};
pub use probe::{HttpProbe, ServerProbe};
pub use registration::{FailoverOutcome, RegisterOutcome, Registration, RegistrationBuilder};
pub use registry::Registry;
pub use server::ServerRecord;
pub use stores::DependentStores;
pub use trust::TrustStore;

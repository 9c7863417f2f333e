//! Registration server records.
//!
//! - `record` - the immutable [`ServerRecord`] value and equivalence rules
//! - `cert` - PEM decoding and SHA-1 fingerprint verification

mod cert;
mod record;

pub use cert::*;
pub use record::*;

//! Client configuration.
//!
//! - `types` - the `ClientConfig` structure and its sections
//! - `parser` - YAML loading
//! - `proxy` - outbound proxy settings from `/etc/sysconfig/proxy`

mod parser;
mod proxy;
mod types;

pub use parser::*;
pub use proxy::*;
pub use types::*;

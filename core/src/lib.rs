//! pchain Core Library
//!
//! Identifiers, error taxonomy, configuration and the fork clock shared by
//! the staking ledger and the atomic executor.

pub mod types;
pub mod traits;
pub mod error;
pub mod config;
pub mod fork;
pub mod logging;

pub use types::*;
pub use traits::*;
pub use error::*;
pub use config::*;
pub use fork::*;

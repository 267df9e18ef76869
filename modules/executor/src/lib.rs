//! pchain Executor
//!
//! Import/export execution against versioned chain state, staking
//! transactions, chain-time advancement and block acceptance.

pub mod transaction;
pub mod shared_memory;
pub mod commit;
pub mod executor;
pub mod staking;
pub mod block;

pub use transaction::*;
pub use shared_memory::*;
pub use commit::*;
pub use executor::AtomicExecutor;
pub use staking::*;
pub use block::*;

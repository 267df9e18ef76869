//! pchain State Management
//!
//! Current and pending staker sets over a committed key-value store, with
//! copy-on-write diffs that can be stacked, iterated in order and folded
//! back into their parent.

pub mod store;
pub mod memory;
pub mod persistent;
pub mod snapshot;
pub mod staker;
pub mod stakers;
pub mod iterator;
pub mod base;
pub mod diff;
pub mod versioned;

pub use store::*;
pub use memory::*;
pub use persistent::*;
pub use snapshot::*;
pub use staker::*;
pub use stakers::*;
pub use iterator::*;
pub use base::*;
pub use diff::*;
pub use versioned::*;

//! Approval history, deprecation chains and the immutability guard.
//!
//! Together these govern an item once it reaches the Approved state: how it
//! got there, how it is retired, and that it is never edited in place.

pub mod approval;
pub mod deprecation;
pub mod immutability;

pub use approval::{ApprovalEventRecord, ApprovalLedger, ApprovalType};
pub use deprecation::{DeprecationLedger, DeprecationRecord, DEFAULT_MAX_CHAIN_DEPTH};
pub use immutability::{assert_mutable, MutationOperation};

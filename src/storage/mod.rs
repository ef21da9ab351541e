//! Repositories for Sieve.
//!
//! The engine reaches storage only through the traits in [`traits`]. This
//! module ships in-memory implementations of all of them and a JSONL
//! file-backed gate result store.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileGateResultStore;
pub use memory::{
    normalize_text, trigram_similarity, MemoryApprovalEventRepository,
    MemoryDeprecationRepository, MemoryDuplicationRepository, MemoryFailureRecorderRepository,
    MemoryPrerequisiteRepository, MemoryTransitionRepository,
};
pub use traits::{
    ApprovalEventRepository, DeprecationRepository, DuplicationRepository,
    FailureRecorderRepository, PrerequisiteInfo, PrerequisiteRepository, SimilarItem,
    TransitionRepository,
};

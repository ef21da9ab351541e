//! Core types and logic for Sieve.
//!
//! This module contains the lifecycle state model, the transition validator,
//! the normalized gate input and draft normalization.

pub mod input;
pub mod normalize;
pub mod state;
pub mod transition;

pub use input::{CefrView, ContentType, GateInput, PrerequisiteView};
pub use normalize::{normalize_draft, schema_issues, DraftPayload, NormalizedDraft};
pub use state::{CefrLevel, ItemType, LifecycleState, StateTransition};
pub use transition::{
    assert_valid_transition, is_state_after, is_terminal_state, is_valid_transition,
    next_valid_states, state_order,
};

//! Transition validator for the item lifecycle.
//!
//! The adjacency table is a constant indexed by state. Every function here is
//! pure and total.

use crate::core::state::LifecycleState;
use crate::error::{Result, SieveError};

/// Direct successors of each state.
const fn successors(state: LifecycleState) -> &'static [LifecycleState] {
    match state {
        LifecycleState::Draft => &[LifecycleState::Candidate],
        LifecycleState::Candidate => &[LifecycleState::Validated],
        LifecycleState::Validated => &[LifecycleState::Approved],
        LifecycleState::Approved => &[],
    }
}

/// Check whether `from → to` is an edge of the lifecycle graph.
pub fn is_valid_transition(from: LifecycleState, to: LifecycleState) -> bool {
    successors(from).contains(&to)
}

/// Fail with [`SieveError::InvalidTransition`] unless `from → to` is legal.
pub fn assert_valid_transition(from: LifecycleState, to: LifecycleState) -> Result<()> {
    if is_valid_transition(from, to) {
        Ok(())
    } else {
        Err(SieveError::invalid_transition(from, to))
    }
}

/// States reachable from `state` in one step.
pub fn next_valid_states(state: LifecycleState) -> Vec<LifecycleState> {
    successors(state).to_vec()
}

/// Whether `state` has no outgoing edges.
pub fn is_terminal_state(state: LifecycleState) -> bool {
    successors(state).is_empty()
}

/// Position of `state` in the lifecycle (0 for Draft through 3 for Approved).
pub fn state_order(state: LifecycleState) -> u8 {
    match state {
        LifecycleState::Draft => 0,
        LifecycleState::Candidate => 1,
        LifecycleState::Validated => 2,
        LifecycleState::Approved => 3,
    }
}

/// Whether `state` comes strictly after `other` in the lifecycle.
pub fn is_state_after(state: LifecycleState, other: LifecycleState) -> bool {
    state_order(state) > state_order(other)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EDGES: [(LifecycleState, LifecycleState); 3] = [
        (LifecycleState::Draft, LifecycleState::Candidate),
        (LifecycleState::Candidate, LifecycleState::Validated),
        (LifecycleState::Validated, LifecycleState::Approved),
    ];

    #[test]
    fn test_forward_edges_are_valid() {
        for (from, to) in EDGES {
            assert!(is_valid_transition(from, to), "{} -> {}", from, to);
            assert!(assert_valid_transition(from, to).is_ok());
        }
    }

    #[test]
    fn test_skip_and_backward_edges_are_invalid() {
        assert!(!is_valid_transition(
            LifecycleState::Draft,
            LifecycleState::Validated
        ));
        assert!(!is_valid_transition(
            LifecycleState::Draft,
            LifecycleState::Approved
        ));
        assert!(!is_valid_transition(
            LifecycleState::Validated,
            LifecycleState::Candidate
        ));
        assert!(!is_valid_transition(
            LifecycleState::Approved,
            LifecycleState::Draft
        ));
    }

    #[test]
    fn test_self_transitions_are_invalid() {
        for state in LifecycleState::ALL {
            assert!(!is_valid_transition(state, state));
        }
    }

    #[test]
    fn test_assert_error_carries_states() {
        let err = assert_valid_transition(LifecycleState::Candidate, LifecycleState::Approved)
            .unwrap_err();
        match err {
            SieveError::InvalidTransition { from, to } => {
                assert_eq!(from, LifecycleState::Candidate);
                assert_eq!(to, LifecycleState::Approved);
            }
            other => panic!("Expected InvalidTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_next_valid_states() {
        assert_eq!(
            next_valid_states(LifecycleState::Draft),
            vec![LifecycleState::Candidate]
        );
        assert!(next_valid_states(LifecycleState::Approved).is_empty());
    }

    #[test]
    fn test_only_approved_is_terminal() {
        assert!(is_terminal_state(LifecycleState::Approved));
        assert!(!is_terminal_state(LifecycleState::Draft));
        assert!(!is_terminal_state(LifecycleState::Candidate));
        assert!(!is_terminal_state(LifecycleState::Validated));
    }

    #[test]
    fn test_state_order_and_after() {
        assert_eq!(state_order(LifecycleState::Draft), 0);
        assert_eq!(state_order(LifecycleState::Approved), 3);
        assert!(is_state_after(LifecycleState::Validated, LifecycleState::Draft));
        assert!(!is_state_after(LifecycleState::Draft, LifecycleState::Draft));
        assert!(!is_state_after(LifecycleState::Candidate, LifecycleState::Validated));
    }

    // =========================================================================
    // Property-based tests
    // =========================================================================

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_state() -> impl Strategy<Value = LifecycleState> {
            prop_oneof![
                Just(LifecycleState::Draft),
                Just(LifecycleState::Candidate),
                Just(LifecycleState::Validated),
                Just(LifecycleState::Approved),
            ]
        }

        proptest! {
            // Property: assert fails exactly for pairs outside the adjacency list
            #[test]
            fn prop_assert_matches_adjacency(from in arb_state(), to in arb_state()) {
                let listed = EDGES.contains(&(from, to));
                prop_assert_eq!(assert_valid_transition(from, to).is_ok(), listed);
            }

            // Property: every legal edge advances the order by exactly one
            #[test]
            fn prop_valid_edges_step_by_one(from in arb_state(), to in arb_state()) {
                if is_valid_transition(from, to) {
                    prop_assert_eq!(state_order(to), state_order(from) + 1);
                    prop_assert!(is_state_after(to, from));
                }
            }

            // Property: terminal states have no successors
            #[test]
            fn prop_terminal_has_no_successors(state in arb_state()) {
                prop_assert_eq!(is_terminal_state(state), next_valid_states(state).is_empty());
            }
        }
    }
}

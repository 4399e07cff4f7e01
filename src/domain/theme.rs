//! Theme selection for a freshly paired room.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::IndexedRandom;

/// Choose a shared practice topic for a pair from their unlocked-content sets.
///
/// Prefers a uniform pick from the intersection so the session is immediately
/// usable by either role; falls back to the union when nothing is shared,
/// since a topic is a nice-to-have rather than a precondition for pairing.
/// Returns `None` only when both sets are empty.
pub fn select_theme(a: &HashSet<String>, b: &HashSet<String>) -> Option<String> {
    select_theme_with(a, b, &mut rand::rng())
}

fn select_theme_with<R: Rng + ?Sized>(
    a: &HashSet<String>,
    b: &HashSet<String>,
    rng: &mut R,
) -> Option<String> {
    let shared: Vec<&String> = a.intersection(b).collect();
    if !shared.is_empty() {
        return shared.choose(rng).map(|topic| (*topic).clone());
    }
    let any: Vec<&String> = a.union(b).collect();
    any.choose(rng).map(|topic| (*topic).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_forced_intersection_is_always_chosen() {
        // given (precondition): sets {1,2} and {2,3} share exactly one topic
        let a = set(&["1", "2"]);
        let b = set(&["2", "3"]);

        // then (expected result): the shared topic wins on every draw
        for _ in 0..32 {
            assert_eq!(select_theme(&a, &b), Some("2".to_string()));
        }
    }

    #[test]
    fn test_disjoint_sets_fall_back_to_union() {
        // given (precondition): sets {1,2} and {3,4} share nothing
        let a = set(&["1", "2"]);
        let b = set(&["3", "4"]);
        let union = set(&["1", "2", "3", "4"]);

        // then (expected result): a topic only one side has unlocked is chosen
        for _ in 0..32 {
            let topic = select_theme(&a, &b).expect("union fallback must pick a topic");
            assert!(union.contains(&topic));
        }
    }

    #[test]
    fn test_one_empty_set_still_yields_a_topic() {
        // given (precondition):
        let a = set(&["1"]);
        let b = set(&[]);

        // when (operation):
        let topic = select_theme(&a, &b);

        // then (expected result):
        assert_eq!(topic, Some("1".to_string()));
    }

    #[test]
    fn test_both_empty_sets_yield_no_topic() {
        // given (precondition):
        let a = set(&[]);
        let b = set(&[]);

        // then (expected result): the room is created without a shared topic
        assert_eq!(select_theme(&a, &b), None);
    }
}

//! Peer agreement.
//!
//! Share of the *other* evaluators' authority weight that sits on the same
//! position as a given evaluator. This is the peer-recognition signal fed
//! back into authority updates after a task has been aggregated.

use crate::position::Positions;

/// Fraction in [0, 1] of peer weight agreeing with `user_id`.
///
/// Returns `None` when the user supports no position, or when no other
/// evaluator carries any weight.
pub fn peer_agreement(positions: &Positions, user_id: u64) -> Option<f64> {
    let own = positions.position_of(user_id)?;

    let mut agreeing = 0.0;
    let mut peers = 0.0;
    for (key, supporters) in positions.iter() {
        for supporter in supporters.iter().filter(|s| s.user_id != user_id) {
            peers += supporter.authority_weight;
            if key == own {
                agreeing += supporter.authority_weight;
            }
        }
    }

    if peers <= 0.0 {
        return None;
    }
    Some((agreeing / peers).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{extract_positions, Judgment};
    use serde_json::{json, Value};

    fn judgment(user_id: u64, authority: f64, data: Value) -> Judgment {
        Judgment::new(user_id, "", authority, data.as_object().cloned().unwrap())
    }

    #[test]
    fn test_peer_agreement() {
        let positions = extract_positions(&[
            judgment(1, 0.8, json!({ "answer": "yes" })),
            judgment(2, 0.6, json!({ "answer": "yes" })),
            judgment(3, 0.2, json!({ "answer": "no" })),
        ]);
        assert!((peer_agreement(&positions, 1).unwrap() - 0.75).abs() < 1e-12);
        assert!((peer_agreement(&positions, 3).unwrap() - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_unanimous_is_one() {
        let positions = extract_positions(&[
            judgment(1, 0.5, json!({ "answer": "yes" })),
            judgment(2, 0.5, json!({ "answer": "yes" })),
        ]);
        assert_eq!(peer_agreement(&positions, 2), Some(1.0));
    }

    #[test]
    fn test_no_peers() {
        let alone = extract_positions(&[judgment(1, 0.5, json!({ "answer": "yes" }))]);
        assert_eq!(peer_agreement(&alone, 1), None);

        let weightless = extract_positions(&[
            judgment(1, 0.5, json!({ "answer": "yes" })),
            judgment(2, 0.0, json!({ "answer": "no" })),
        ]);
        assert_eq!(peer_agreement(&weightless, 1), None);
    }

    #[test]
    fn test_unknown_user() {
        let positions = extract_positions(&[judgment(1, 0.5, json!({ "answer": "yes" }))]);
        assert_eq!(peer_agreement(&positions, 42), None);
    }
}

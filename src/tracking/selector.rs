use crate::{
    config::SelectionPolicy,
    types::{Hand, Handedness},
};

#[derive(Clone, Copy, Debug)]
pub struct HandSelector {
    policy: SelectionPolicy,
}

impl HandSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Picks the hand to follow this frame, with its index in detection order.
    ///
    /// Several hands carrying the wanted label resolve to the first one.
    pub fn select<'a>(&self, hands: &'a [Hand]) -> Option<(usize, &'a Hand)> {
        let wanted = match self.policy {
            SelectionPolicy::First => return hands.first().map(|hand| (0, hand)),
            SelectionPolicy::Left => Handedness::Left,
            SelectionPolicy::Right => Handedness::Right,
        };
        hands
            .iter()
            .enumerate()
            .find(|(_, hand)| hand.handedness == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(handedness: Handedness, score: f32) -> Hand {
        Hand {
            score,
            ..Hand::new(Vec::new(), handedness)
        }
    }

    #[test]
    fn first_policy_takes_head_of_list() {
        let selector = HandSelector::new(SelectionPolicy::First);
        let hands = vec![hand(Handedness::Right, 0.9), hand(Handedness::Left, 0.8)];
        let (idx, picked) = selector.select(&hands).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(picked.handedness, Handedness::Right);
        assert!(selector.select(&[]).is_none());
    }

    #[test]
    fn label_policy_skips_other_hands() {
        let selector = HandSelector::new(SelectionPolicy::Left);
        let hands = vec![hand(Handedness::Right, 0.9), hand(Handedness::Left, 0.8)];
        let (idx, picked) = selector.select(&hands).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(picked.handedness, Handedness::Left);
    }

    #[test]
    fn duplicate_labels_resolve_to_first_match() {
        let selector = HandSelector::new(SelectionPolicy::Right);
        let hands = vec![
            hand(Handedness::Unknown, 0.7),
            hand(Handedness::Right, 0.6),
            hand(Handedness::Right, 0.95),
        ];
        let (idx, picked) = selector.select(&hands).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(picked.score, 0.6);
    }

    #[test]
    fn no_match_returns_none() {
        let selector = HandSelector::new(SelectionPolicy::Left);
        let hands = vec![hand(Handedness::Right, 0.9), hand(Handedness::Unknown, 0.8)];
        assert!(selector.select(&hands).is_none());
    }

    #[test]
    fn selection_is_deterministic() {
        let hands = vec![hand(Handedness::Left, 0.5), hand(Handedness::Left, 0.6)];
        for policy in [SelectionPolicy::Left, SelectionPolicy::First] {
            let selector = HandSelector::new(policy);
            let a = selector.select(&hands).map(|(i, _)| i);
            let b = selector.select(&hands).map(|(i, _)| i);
            assert_eq!(a, b);
            assert_eq!(a, Some(0));
        }
    }
}

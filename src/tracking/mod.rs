//! Per-frame cursor tracking: pick a hand, derive the cursor, extend the trail.
//!
//! [`CursorTracker`] owns the only state that survives between frames (the
//! trail and the current cursor). Everything it reads per frame comes in as
//! arguments, so the same tracker drives the UI and the tests.

pub mod cursor;
pub mod selector;
pub mod trail;

pub use cursor::CursorDeriver;
pub use selector::HandSelector;
pub use trail::{Trail, TrailSegment};

use crate::{
    config::TrackingConfig,
    pipeline::mapper::CoordinateMapper,
    types::{Cursor, Hand},
};

/// What the tracker decided for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrackedFrame {
    /// Index of the followed hand in the frame's detection list.
    pub selected: Option<usize>,
    pub cursor: Option<Cursor>,
}

pub struct CursorTracker {
    selector: HandSelector,
    deriver: CursorDeriver,
    trail: Trail,
    cursor: Option<Cursor>,
}

impl CursorTracker {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            selector: HandSelector::new(config.hand),
            deriver: CursorDeriver::new(config.keypoint_index, config.depth),
            trail: Trail::new(config.trail_capacity),
            cursor: None,
        }
    }

    pub fn update<M: CoordinateMapper>(&mut self, hands: &[Hand], mapper: &M) -> TrackedFrame {
        let selected = self.selector.select(hands);
        let cursor = self.deriver.derive(selected.map(|(_, hand)| hand), mapper);

        match (self.cursor.is_some(), cursor.as_ref()) {
            (false, Some(c)) => log::debug!(
                "cursor acquired at ({:.0}, {:.0}) z={:.3}",
                c.position.x,
                c.position.y,
                c.depth
            ),
            (true, None) => log::debug!("cursor lost ({} hands this frame)", hands.len()),
            _ => {}
        }

        if let Some(c) = &cursor {
            self.trail.push(c.position);
        }
        self.cursor = cursor;

        TrackedFrame {
            selected: selected.map(|(idx, _)| idx),
            cursor,
        }
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn trail(&self) -> &Trail {
        &self.trail
    }

    pub fn selector(&self) -> &HandSelector {
        &self.selector
    }

    pub fn deriver(&self) -> &CursorDeriver {
        &self.deriver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SelectionPolicy,
        pipeline::mapper::ViewportMapper,
        types::{Handedness, Keypoint, Keypoint3, NUM_KEYPOINTS},
    };

    fn hand_at(handedness: Handedness, x: f32, with_3d: bool) -> Hand {
        let keypoints = (0..NUM_KEYPOINTS).map(|_| Keypoint::new(x, 10.0)).collect();
        let hand = Hand::new(keypoints, handedness);
        if with_3d {
            hand.with_keypoints_3d(vec![Keypoint3::new(0.0, 0.0, 0.0); NUM_KEYPOINTS])
        } else {
            hand
        }
    }

    fn tracker(policy: SelectionPolicy, capacity: usize) -> CursorTracker {
        CursorTracker::new(&TrackingConfig {
            hand: policy,
            trail_capacity: capacity,
            ..TrackingConfig::default()
        })
    }

    #[test]
    fn cursor_is_replaced_each_frame() {
        let mapper = ViewportMapper::for_frame(640, 480, false);
        let mut tracker = tracker(SelectionPolicy::First, 20);

        tracker.update(&[hand_at(Handedness::Left, 10.0, true)], &mapper);
        tracker.update(&[hand_at(Handedness::Left, 30.0, true)], &mapper);
        assert_eq!(tracker.cursor().map(|c| c.position.x), Some(30.0));
        assert_eq!(tracker.trail().len(), 2);

        let frame = tracker.update(&[], &mapper);
        assert_eq!(frame, TrackedFrame::default());
        assert!(tracker.cursor().is_none());
        assert_eq!(tracker.trail().len(), 2);
    }

    #[test]
    fn hand_without_depth_leaves_trail_alone() {
        let mapper = ViewportMapper::for_frame(640, 480, false);
        let mut tracker = tracker(SelectionPolicy::Left, 20);
        tracker.update(&[hand_at(Handedness::Left, 10.0, true)], &mapper);

        let frame = tracker.update(&[hand_at(Handedness::Left, 50.0, false)], &mapper);
        assert_eq!(frame.selected, Some(0));
        assert!(frame.cursor.is_none());
        assert_eq!(tracker.trail().len(), 1);
    }

    #[test]
    fn trail_survives_hand_reappearing() {
        let mapper = ViewportMapper::for_frame(640, 480, false);
        let mut tracker = tracker(SelectionPolicy::Right, 3);
        for x in [1.0, 2.0] {
            tracker.update(&[hand_at(Handedness::Right, x, true)], &mapper);
        }
        tracker.update(&[hand_at(Handedness::Left, 99.0, true)], &mapper);
        for x in [3.0, 4.0] {
            tracker.update(&[hand_at(Handedness::Right, x, true)], &mapper);
        }
        let xs: Vec<f32> = tracker.trail().points().map(|p| p.x).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.0]);
    }
}

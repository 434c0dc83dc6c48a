use crate::{
    config::DepthCalibration,
    pipeline::mapper::CoordinateMapper,
    types::{Cursor, Hand},
};

#[derive(Clone, Copy, Debug)]
pub struct CursorDeriver {
    keypoint_index: usize,
    calibration: DepthCalibration,
}

impl CursorDeriver {
    pub fn new(keypoint_index: usize, calibration: DepthCalibration) -> Self {
        Self {
            keypoint_index,
            calibration,
        }
    }

    pub fn keypoint_index(&self) -> usize {
        self.keypoint_index
    }

    /// Builds the cursor for `hand`, or nothing when 2D or 3D landmarks are missing.
    ///
    /// A hand without 3D landmarks yields no cursor at all; there is no 2D-only fallback.
    pub fn derive<M: CoordinateMapper>(&self, hand: Option<&Hand>, mapper: &M) -> Option<Cursor> {
        let hand = hand?;
        let keypoints_3d = hand.keypoints_3d.as_deref()?;
        let raw = hand.keypoints.get(self.keypoint_index)?;
        let depth = keypoints_3d.get(self.keypoint_index)?.z;

        Some(Cursor {
            position: mapper.map(*raw),
            depth,
            depth_size: self.calibration.size_for_depth(depth),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::mapper::ViewportMapper,
        types::{Handedness, Keypoint, Keypoint3, NUM_KEYPOINTS, ScreenPoint},
    };
    use approx::assert_relative_eq;

    fn hand_with_tip_depth(z: f32) -> Hand {
        let keypoints = (0..NUM_KEYPOINTS)
            .map(|i| Keypoint::new(10.0 * i as f32, 5.0 * i as f32))
            .collect();
        let keypoints_3d = (0..NUM_KEYPOINTS)
            .map(|i| Keypoint3::new(0.0, 0.0, if i == 8 { z } else { 0.0 }))
            .collect();
        Hand::new(keypoints, Handedness::Left).with_keypoints_3d(keypoints_3d)
    }

    fn deriver() -> CursorDeriver {
        CursorDeriver::new(8, DepthCalibration::default())
    }

    #[test]
    fn maps_keypoint_through_mapper() {
        let mapper = ViewportMapper::for_frame(640, 480, true);
        let hand = hand_with_tip_depth(0.0);
        let cursor = deriver().derive(Some(&hand), &mapper).unwrap();
        assert_eq!(cursor.position, ScreenPoint::new(640.0 - 80.0, 40.0));
        assert_relative_eq!(cursor.depth, 0.0);
        assert_relative_eq!(cursor.depth_size, 35.0);
    }

    #[test]
    fn depth_size_follows_calibration_and_clamp() {
        let mapper = ViewportMapper::for_frame(640, 480, false);
        for (z, size) in [(-0.1, 50.0), (0.1, 20.0), (-1.0, 60.0), (1.0, 15.0)] {
            let hand = hand_with_tip_depth(z);
            let cursor = deriver().derive(Some(&hand), &mapper).unwrap();
            assert_relative_eq!(cursor.depth_size, size);
        }
    }

    #[test]
    fn missing_3d_landmarks_suppress_cursor() {
        let mapper = ViewportMapper::for_frame(640, 480, false);
        let mut hand = hand_with_tip_depth(0.0);
        hand.keypoints_3d = None;
        assert!(deriver().derive(Some(&hand), &mapper).is_none());

        hand.keypoints_3d = Some(Vec::new());
        assert!(deriver().derive(Some(&hand), &mapper).is_none());
    }

    #[test]
    fn missing_2d_landmarks_suppress_cursor() {
        let mapper = ViewportMapper::for_frame(640, 480, false);
        let mut hand = hand_with_tip_depth(0.0);
        hand.keypoints.clear();
        assert!(deriver().derive(Some(&hand), &mapper).is_none());
    }

    #[test]
    fn short_landmark_lists_yield_nothing() {
        let mapper = ViewportMapper::for_frame(640, 480, false);
        let mut hand = hand_with_tip_depth(0.0);
        hand.keypoints.truncate(5);
        assert!(deriver().derive(Some(&hand), &mapper).is_none());
    }

    #[test]
    fn no_hand_no_cursor() {
        let mapper = ViewportMapper::for_frame(640, 480, false);
        assert!(deriver().derive(None, &mapper).is_none());
    }
}

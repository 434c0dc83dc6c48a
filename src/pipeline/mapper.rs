use crate::types::{Keypoint, ScreenPoint};

/// Converts source-frame keypoints into display coordinates.
pub trait CoordinateMapper {
    fn map(&self, raw: Keypoint) -> ScreenPoint;

    fn map_all(&self, raw: &[Keypoint]) -> Vec<ScreenPoint> {
        raw.iter().map(|p| self.map(*p)).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitMode {
    /// Stretch each axis independently.
    Fill,
    /// Uniform scale so the whole source is visible, centred.
    Contain,
    /// Uniform scale so the target is fully covered, centred.
    Cover,
}

/// Maps a `source_w x source_h` frame onto a `target_w x target_h` view.
#[derive(Clone, Copy, Debug)]
pub struct ViewportMapper {
    source_w: f32,
    scale_x: f32,
    scale_y: f32,
    offset_x: f32,
    offset_y: f32,
    mirror: bool,
}

impl ViewportMapper {
    pub fn new(source: (u32, u32), target: (f32, f32), fit: FitMode, mirror: bool) -> Self {
        let source_w = source.0.max(1) as f32;
        let source_h = source.1.max(1) as f32;
        let sx = target.0 / source_w;
        let sy = target.1 / source_h;
        let (scale_x, scale_y) = match fit {
            FitMode::Fill => (sx, sy),
            FitMode::Contain => (sx.min(sy), sx.min(sy)),
            FitMode::Cover => (sx.max(sy), sx.max(sy)),
        };

        Self {
            source_w,
            scale_x,
            scale_y,
            offset_x: (target.0 - source_w * scale_x) / 2.0,
            offset_y: (target.1 - source_h * scale_y) / 2.0,
            mirror,
        }
    }

    /// Identity-sized mapping used when drawing straight onto the camera frame.
    pub fn for_frame(width: u32, height: u32, mirror: bool) -> Self {
        Self::new(
            (width, height),
            (width as f32, height as f32),
            FitMode::Fill,
            mirror,
        )
    }
}

impl CoordinateMapper for ViewportMapper {
    fn map(&self, raw: Keypoint) -> ScreenPoint {
        let x = if self.mirror {
            self.source_w - raw.x
        } else {
            raw.x
        };
        ScreenPoint::new(
            self.offset_x + x * self.scale_x,
            self.offset_y + raw.y * self.scale_y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn frame_mapping_is_identity_without_mirror() {
        let mapper = ViewportMapper::for_frame(640, 480, false);
        let p = mapper.map(Keypoint::new(100.0, 50.0));
        assert_relative_eq!(p.x, 100.0);
        assert_relative_eq!(p.y, 50.0);
    }

    #[test]
    fn mirror_flips_horizontally() {
        let mapper = ViewportMapper::for_frame(640, 480, true);
        let p = mapper.map(Keypoint::new(100.0, 50.0));
        assert_relative_eq!(p.x, 540.0);
        assert_relative_eq!(p.y, 50.0);
    }

    #[test]
    fn contain_letterboxes_vertically() {
        // 640x480 into 800x800: scale 1.25, 600px tall, 100px bars.
        let mapper = ViewportMapper::new((640, 480), (800.0, 800.0), FitMode::Contain, false);
        let top_left = mapper.map(Keypoint::new(0.0, 0.0));
        let bottom_right = mapper.map(Keypoint::new(640.0, 480.0));
        assert_relative_eq!(top_left.x, 0.0);
        assert_relative_eq!(top_left.y, 100.0);
        assert_relative_eq!(bottom_right.x, 800.0);
        assert_relative_eq!(bottom_right.y, 700.0);
    }

    #[test]
    fn cover_crops_horizontally() {
        // 640x480 into 800x800: scale 800/480, width overflows and is centred.
        let mapper = ViewportMapper::new((640, 480), (800.0, 800.0), FitMode::Cover, false);
        let centre = mapper.map(Keypoint::new(320.0, 240.0));
        assert_relative_eq!(centre.x, 400.0, epsilon = 1e-3);
        assert_relative_eq!(centre.y, 400.0, epsilon = 1e-3);
        let top_left = mapper.map(Keypoint::new(0.0, 0.0));
        assert!(top_left.x < 0.0);
        assert_relative_eq!(top_left.y, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn batch_mapping_preserves_order() {
        let mapper = ViewportMapper::for_frame(100, 100, true);
        let mapped = mapper.map_all(&[Keypoint::new(0.0, 1.0), Keypoint::new(25.0, 2.0)]);
        assert_eq!(
            mapped,
            vec![ScreenPoint::new(100.0, 1.0), ScreenPoint::new(75.0, 2.0)]
        );
    }
}

/// Number of landmarks in the hand topology produced by the handpose model.
pub const NUM_KEYPOINTS: usize = 21;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A 2D landmark in source-frame pixels, before any display mapping.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A 3D landmark in model space. `z` is negative towards the camera.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Keypoint3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// A position in display coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

impl Handedness {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.5 {
            Handedness::Right
        } else if score > 0.0 {
            Handedness::Left
        } else {
            Handedness::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "左手",
            Handedness::Right => "右手",
            Handedness::Unknown => "未知",
        }
    }
}

/// One detected hand for a single frame. Nothing links hands across frames.
#[derive(Clone, Debug, PartialEq)]
pub struct Hand {
    pub keypoints: Vec<Keypoint>,
    pub keypoints_3d: Option<Vec<Keypoint3>>,
    pub handedness: Handedness,
    pub score: f32,
}

impl Hand {
    pub fn new(keypoints: Vec<Keypoint>, handedness: Handedness) -> Self {
        Self {
            keypoints,
            keypoints_3d: None,
            handedness,
            score: 1.0,
        }
    }

    pub fn with_keypoints_3d(mut self, keypoints_3d: Vec<Keypoint3>) -> Self {
        self.keypoints_3d = Some(keypoints_3d);
        self
    }
}

/// The tracked point derived for the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cursor {
    pub position: ScreenPoint,
    pub depth: f32,
    pub depth_size: f32,
}

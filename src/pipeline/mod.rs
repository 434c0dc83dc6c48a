pub mod camera;
pub mod mapper;
pub mod overlay;
pub mod recognizer;
pub mod slot;

// Re-exports for convenience
pub use camera::{CameraDevice, CameraStream, available_cameras, start_camera_stream};
pub use mapper::{CoordinateMapper, FitMode, ViewportMapper};
pub use overlay::{Overlay, OverlayOptions, mirror_rgba};
pub use recognizer::{RecognizerBackend, start_recognizer};
pub use slot::{HandsReader, HandsWriter, latest_hands};

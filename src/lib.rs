//! Hand-tracked cursor: follows one keypoint of a detected hand, sizes it by
//! depth, and keeps a tapered trail of where it has been.

pub mod config;
pub mod model_download;
pub mod pipeline;
pub mod tracking;
pub mod types;
pub mod ui;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::Sender;
use nokhwa::{
    Buffer, Camera,
    pixel_format::{RgbAFormat, RgbFormat},
    query,
    utils::{
        ApiBackend, CameraIndex, CameraInfo, FrameFormat, RequestedFormat, RequestedFormatType,
    },
};

use crate::types::Frame;

// Raw formats first: some built-in macOS cameras advertise YUYV and then reject it.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 3] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

/// Owns the capture thread; dropping it stops capture.
#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CameraStream {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info: CameraInfo| CameraDevice {
            index: info.index().clone(),
            label: info.human_name(),
        })
        .collect())
}

fn open_camera(index: &CameraIndex) -> Result<Camera> {
    let mut last_err = None;
    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(anyhow::Error::from(err)),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        anyhow!("camera {index} accepted none of the requested formats")
    }))
}

fn to_frame(buffer: &Buffer) -> Result<Frame> {
    let image = buffer
        .decode_image::<RgbAFormat>()
        .with_context(|| format!("failed to decode {} frame", buffer.source_frame_format()))?;
    Ok(Frame {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

/// Starts capturing from `index`, offering every frame to each sink.
///
/// Sinks are expected to be bounded; a busy sink simply misses the frame.
pub fn start_camera_stream(index: CameraIndex, sinks: Vec<Sender<Frame>>) -> Result<CameraStream> {
    // Open once up front so the caller sees device errors synchronously.
    drop(open_camera(&index)?);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut camera = match open_camera(&index) {
            Ok(camera) => camera,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                return;
            }
        };
        log::info!(
            "camera {index} streaming {} at {} fps",
            camera.resolution(),
            camera.frame_rate()
        );

        while !stop_flag.load(Ordering::Relaxed) {
            let frame = match camera
                .frame()
                .map_err(anyhow::Error::from)
                .and_then(|b| to_frame(&b))
            {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!("camera frame dropped: {err:?}");
                    continue;
                }
            };

            for sink in &sinks {
                let _ = sink.try_send(frame.clone());
            }
        }
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}

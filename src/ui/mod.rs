use std::{mem, sync::Arc, thread, time::Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use gpui::{
    AnyElement, App, AppContext, Context, InteractiveElement, IntoElement, MouseButton,
    MouseDownEvent, ObjectFit, ParentElement, Render, RenderImage, SharedString, Styled,
    StyledImage, TitlebarOptions, Window, WindowOptions, div, img, px,
};
use gpui_component::{
    ActiveTheme, Root, Selectable, StyledExt,
    button::{Button, ButtonVariants},
    h_flex,
    tag::Tag,
    v_flex,
};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};
use nokhwa::utils::CameraIndex;

use crate::{
    config::Config,
    model_download::{ModelDownloadEvent, ModelKind, ensure_model_ready},
    pipeline::{
        CameraStream, CoordinateMapper, HandsReader, HandsWriter, Overlay, OverlayOptions,
        RecognizerBackend, ViewportMapper, available_cameras, mirror_rgba, start_camera_stream,
        start_recognizer,
    },
    tracking::{CursorTracker, TrackedFrame},
    types::{Frame, ScreenPoint},
};

mod download;
mod main_view;

const CAMERA_VIEW_WIDTH: f32 = 720.0;
const DEFAULT_CAMERA_RATIO: f32 = 4.0 / 3.0;

/// Both ends of every channel the UI wires together once the models are ready.
pub struct PipelineChannels {
    pub display_tx: Sender<Frame>,
    pub display_rx: Receiver<Frame>,
    pub recognizer_tx: Sender<Frame>,
    pub recognizer_rx: Receiver<Frame>,
    pub hands_tx: HandsWriter,
    pub hands_rx: HandsReader,
}

pub fn launch_ui(app: &mut App, config: Config, channels: PipelineChannels) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Hand Cursor".into()),
            ..Default::default()
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(config, channels));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    screen: Screen,
    config: Config,
    display_rx: Receiver<Frame>,
    camera_sinks: Option<Vec<Sender<Frame>>>,
    recognizer_io: Option<(Receiver<Frame>, HandsWriter)>,
    hands_rx: HandsReader,
    recognizer_handle: Option<thread::JoinHandle<()>>,
    camera_stream: Option<CameraStream>,
    camera_label: String,
    camera_error: Option<String>,
    tracker: CursorTracker,
    tracked: TrackedFrame,
    last_detection: Option<Instant>,
    overlay: OverlayOptions,
    frame_size: Option<(u32, u32)>,
    latest_image: Option<Arc<RenderImage>>,
    download_rx: Receiver<DownloadMessage>,
    _download_handle: thread::JoinHandle<()>,
}

enum Screen {
    Download(DownloadState),
    Main,
}

struct DownloadState {
    current: Option<ModelKind>,
    downloaded: u64,
    total: Option<u64>,
    ready: usize,
    message: String,
    error: Option<String>,
}

impl DownloadState {
    fn new() -> Self {
        Self {
            current: None,
            downloaded: 0,
            total: None,
            ready: 0,
            message: "正在检查模型...".to_string(),
            error: None,
        }
    }

    fn finished(&self) -> bool {
        self.error.is_none() && self.ready >= ModelKind::ALL.len()
    }
}

enum DownloadMessage {
    Event(ModelDownloadEvent),
    Error(String),
}

impl AppView {
    fn new(config: Config, channels: PipelineChannels) -> Self {
        let (download_tx, download_rx) = unbounded();
        let download_handle = download::spawn_model_download(&config, download_tx);
        let PipelineChannels {
            display_tx,
            display_rx,
            recognizer_tx,
            recognizer_rx,
            hands_tx,
            hands_rx,
        } = channels;

        Self {
            screen: Screen::Download(DownloadState::new()),
            tracker: CursorTracker::new(&config.tracking),
            config,
            display_rx,
            camera_sinks: Some(vec![display_tx, recognizer_tx]),
            recognizer_io: Some((recognizer_rx, hands_tx)),
            hands_rx,
            recognizer_handle: None,
            camera_stream: None,
            camera_label: "未启动".to_string(),
            camera_error: None,
            tracked: TrackedFrame::default(),
            last_detection: None,
            overlay: OverlayOptions::default(),
            frame_size: None,
            latest_image: None,
            download_rx,
            _download_handle: download_handle,
        }
    }

    fn start_pipeline(&mut self) {
        if let Some((frame_rx, hands_tx)) = self.recognizer_io.take() {
            let backend = RecognizerBackend::from_config(&self.config.detector);
            self.recognizer_handle = Some(start_recognizer(backend, frame_rx, hands_tx));
        }

        let Some(sinks) = self.camera_sinks.take() else {
            return;
        };
        let wanted = self.config.camera.index;
        let (index, label) = match available_cameras() {
            Ok(devices) => match devices.into_iter().nth(wanted) {
                Some(device) => (device.index, device.label),
                None => {
                    self.camera_error = Some(format!("未找到编号为 {wanted} 的摄像头"));
                    return;
                }
            },
            Err(err) => {
                log::warn!("camera enumeration failed, trying index {wanted}: {err:?}");
                (CameraIndex::Index(wanted as u32), format!("摄像头 {wanted}"))
            }
        };

        match start_camera_stream(index, sinks) {
            Ok(stream) => {
                log::info!("camera started: {label}");
                self.camera_label = label;
                self.camera_stream = Some(stream);
            }
            Err(err) => {
                log::error!("failed to start camera {label}: {err:?}");
                self.camera_error = Some(format!("无法打开摄像头 {label}: {err:#}"));
            }
        }
    }

    /// Runs one display tick: picks up new detections, tracks, and redraws the newest frame.
    fn process_frame(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        if self.hands_rx.poll() {
            self.last_detection = Some(Instant::now());
        }

        let mut latest = None;
        while let Ok(frame) = self.display_rx.try_recv() {
            latest = Some(frame);
        }
        if let Some(frame) = &latest {
            self.frame_size = Some((frame.width, frame.height));
        }

        let Some((width, height)) = self.frame_size else {
            return;
        };
        let mapper = ViewportMapper::for_frame(width, height, self.config.camera.mirror);

        // Every tick tracks, reusing the last detection when the recognizer lags.
        self.tracked = self.tracker.update(self.hands_rx.hands(), &mapper);

        let Some(mut frame) = latest else {
            return;
        };
        if self.config.camera.mirror {
            mirror_rgba(&mut frame.rgba, frame.width);
        }

        let projected: Vec<Vec<ScreenPoint>> = self
            .hands_rx
            .hands()
            .iter()
            .map(|hand| mapper.map_all(&hand.keypoints))
            .collect();
        let overlay = Overlay {
            hands: &projected,
            selected: self.tracked.selected,
            trail: self.tracker.trail(),
            cursor: self.tracked.cursor,
        };
        overlay.draw(&mut frame.rgba, frame.width, frame.height, self.overlay);

        if let Some(image) = frame_to_image(frame) {
            self.replace_latest_image(image, window, cx);
        }
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // The sprite atlas keeps every texture until it is dropped explicitly.
            cx.drop_image(old_image, Some(window));
        }
    }
}

fn frame_to_image(frame: Frame) -> Option<Arc<RenderImage>> {
    let mut bgra = frame.rgba;
    // GPUI expects BGRA.
    for px in bgra.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(frame.width, frame.height, bgra)?;
    Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
}

impl Render for AppView {
    fn render(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) -> impl IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        let screen = mem::replace(&mut self.screen, Screen::Main);
        let (view, screen) = match screen {
            Screen::Download(mut state) => {
                self.poll_download_events(&mut state);
                let view = self.render_download_view(&state, cx);
                if state.finished() {
                    self.start_pipeline();
                    (view, Screen::Main)
                } else {
                    (view, Screen::Download(state))
                }
            }
            Screen::Main => {
                self.process_frame(window, cx);
                (self.render_main(cx), Screen::Main)
            }
        };
        self.screen = screen;
        view
    }
}

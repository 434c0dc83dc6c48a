pub mod common;
mod ort;
pub mod palm;

use std::{path::PathBuf, thread};

use crossbeam_channel::Receiver;

use crate::{
    config::DetectorConfig,
    pipeline::slot::HandsWriter,
    types::{Frame, Hand},
};

/// Turns one camera frame into the hands visible in it, in detection order.
pub(crate) trait HandposeEngine: Send + 'static {
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Vec<Hand>>;
}

fn run_worker_loop<E: HandposeEngine>(
    mut engine: E,
    frame_rx: Receiver<Frame>,
    hands_tx: HandsWriter,
) {
    let mut last_count = 0;
    while let Some(frame) = recv_latest_frame(&frame_rx) {
        match engine.infer(&frame) {
            Ok(hands) => {
                if hands.len() != last_count {
                    log::debug!("detector now sees {} hands", hands.len());
                    last_count = hands.len();
                }
                hands_tx.publish(hands);
            }
            Err(err) => {
                log::warn!("handpose inference failed: {err:?}");
            }
        }
    }
    log::info!("frame source closed, recognizer worker exiting");
}

fn recv_latest_frame(frame_rx: &Receiver<Frame>) -> Option<Frame> {
    let mut frame = frame_rx.recv().ok()?;
    // Skip frames that queued up while the last inference ran.
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}

#[derive(Clone, Debug)]
pub struct RecognizerBackend {
    pub palm_model: PathBuf,
    pub handpose_model: PathBuf,
    pub max_hands: usize,
    pub min_confidence: f32,
}

impl RecognizerBackend {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            palm_model: config.palm_model.clone(),
            handpose_model: config.handpose_model.clone(),
            max_hands: config.max_hands,
            min_confidence: config.min_confidence,
        }
    }

    pub fn label(&self) -> &'static str {
        "ort"
    }
}

pub fn start_recognizer(
    backend: RecognizerBackend,
    frame_rx: Receiver<Frame>,
    hands_tx: HandsWriter,
) -> thread::JoinHandle<()> {
    log::info!("starting handpose backend: {}", backend.label());

    ort::start_worker(backend, frame_rx, hands_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pipeline::slot::latest_hands, types::Handedness};
    use crossbeam_channel::unbounded;

    /// Reports one left hand per 10 pixels of frame width.
    struct WidthEngine;

    impl HandposeEngine for WidthEngine {
        fn infer(&mut self, frame: &Frame) -> anyhow::Result<Vec<Hand>> {
            if frame.width == 0 {
                anyhow::bail!("empty frame");
            }
            Ok((0..frame.width / 10)
                .map(|_| Hand::new(Vec::new(), Handedness::Left))
                .collect())
        }
    }

    fn frame(width: u32) -> Frame {
        Frame {
            rgba: Vec::new(),
            width,
            height: 1,
        }
    }

    #[test]
    fn worker_publishes_newest_frame_result() {
        let (frame_tx, frame_rx) = unbounded();
        let (writer, mut reader) = latest_hands();
        frame_tx.send(frame(10)).unwrap();
        frame_tx.send(frame(0)).unwrap();
        frame_tx.send(frame(30)).unwrap();
        drop(frame_tx);

        run_worker_loop(WidthEngine, frame_rx, writer);

        assert!(reader.poll());
        assert_eq!(reader.hands().len(), 3);
    }

    #[test]
    fn failed_inference_keeps_previous_hands() {
        let (frame_tx, frame_rx) = unbounded();
        let (writer, mut reader) = latest_hands();
        let handle = thread::spawn(move || run_worker_loop(WidthEngine, frame_rx, writer));

        frame_tx.send(frame(20)).unwrap();
        while !reader.poll() {
            thread::yield_now();
        }
        frame_tx.send(frame(0)).unwrap();
        drop(frame_tx);
        handle.join().unwrap();

        assert!(!reader.poll());
        assert_eq!(reader.hands().len(), 2);
    }
}

use std::{path::Path, thread};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::Receiver;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    HandposeEngine, RecognizerBackend,
    common::{RotatedCrop, decode_keypoints},
    palm::{PalmDetector, PalmDetectorConfig, crop_for_palm},
    run_worker_loop,
};
use crate::{
    model_download::ModelKind,
    pipeline::slot::HandsWriter,
    types::{Frame, Hand, Handedness, Keypoint},
};

pub fn start_worker(
    backend: RecognizerBackend,
    frame_rx: Receiver<Frame>,
    hands_tx: HandsWriter,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        if let Err(err) = check_models(&backend) {
            log::error!("handpose worker not started: {err:#}");
            return;
        }

        let engine = match OrtEngine::new(&backend) {
            Ok(engine) => {
                log::info!(
                    "handpose ORT backend ready using {} and palm detector {} (max {} hands)",
                    backend.handpose_model.display(),
                    backend.palm_model.display(),
                    backend.max_hands
                );
                engine
            }
            Err(err) => {
                log::error!("failed to load ORT handpose models: {err:?}");
                return;
            }
        };

        run_worker_loop(engine, frame_rx, hands_tx);
    })
}

/// The download screen fetches models before the worker starts; this only confirms them.
fn check_models(backend: &RecognizerBackend) -> Result<()> {
    for (kind, path) in [
        (ModelKind::HandposeEstimator, &backend.handpose_model),
        (ModelKind::PalmDetector, &backend.palm_model),
    ] {
        if !path.exists() {
            return Err(anyhow!("{} model missing at {}", kind.label(), path.display()));
        }
    }
    Ok(())
}

struct OrtEngine {
    handpose: Session,
    palm_detector: PalmDetector,
    max_hands: usize,
    min_confidence: f32,
}

impl OrtEngine {
    fn new(backend: &RecognizerBackend) -> Result<Self> {
        Ok(Self {
            handpose: load_session(&backend.handpose_model)?,
            palm_detector: PalmDetector::new(&backend.palm_model, PalmDetectorConfig::default())?,
            max_hands: backend.max_hands,
            min_confidence: backend.min_confidence,
        })
    }

    fn estimate(
        &mut self,
        frame: &Frame,
        palm_score: f32,
        crop: RotatedCrop,
    ) -> Result<Option<Hand>> {
        let input = crop.tensor(frame)?;
        let outputs = self
            .handpose
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("failed to run handpose estimator")?;
        if outputs.len() < 3 {
            return Err(anyhow!(
                "handpose estimator returned {} outputs, need 3",
                outputs.len()
            ));
        }

        let scalar = |idx: usize| -> f32 {
            outputs[idx]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        };
        let confidence = (scalar(1) * palm_score).clamp(0.0, 1.0);
        if confidence < self.min_confidence {
            return Ok(None);
        }
        let handedness = Handedness::from_score(scalar(2));

        let screen = outputs[0].try_extract_array::<f32>()?;
        let screen: Vec<f32> = screen.iter().copied().collect();
        let keypoints: Vec<Keypoint> = decode_keypoints(&screen)?
            .into_iter()
            .map(|p| crop.to_frame(p.x, p.y))
            .collect();

        // The fourth output carries metric world landmarks; older exports lack it.
        let keypoints_3d = if outputs.len() > 3 {
            let world = outputs[3].try_extract_array::<f32>()?;
            let world: Vec<f32> = world.iter().copied().collect();
            decode_keypoints(&world).ok()
        } else {
            None
        };

        Ok(Some(Hand {
            keypoints,
            keypoints_3d,
            handedness,
            score: confidence,
        }))
    }
}

impl HandposeEngine for OrtEngine {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Hand>> {
        let palms = self.palm_detector.detect(frame).unwrap_or_else(|err| {
            log::warn!("palm detection failed: {err:?}");
            Vec::new()
        });

        let mut hands = Vec::with_capacity(self.max_hands);
        for palm in palms.iter().take(self.max_hands) {
            let crop = crop_for_palm(palm, frame.width, frame.height);
            match self.estimate(frame, palm.score, crop) {
                Ok(Some(hand)) => hands.push(hand),
                Ok(None) => {}
                Err(err) => log::warn!("handpose estimation failed: {err:?}"),
            }
        }
        Ok(hands)
    }
}

pub(super) fn load_session(model_path: &Path) -> Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .commit_from_file(model_path)
        .with_context(|| format!("failed to load ORT session from {}", model_path.display()))
}

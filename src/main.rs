#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use gpui::Application;
use hand_cursor::{
    config::Config,
    pipeline::latest_hands,
    ui::{self, PipelineChannels},
};

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::load_from_env().context("invalid configuration")?;
    log::info!(
        "tracking {:?} hand, keypoint {}, trail of {}",
        config.tracking.hand,
        config.tracking.keypoint_index,
        config.tracking.trail_capacity
    );

    let (display_tx, display_rx) = bounded(1);
    let (recognizer_tx, recognizer_rx) = bounded(1);
    let (hands_tx, hands_rx) = latest_hands();
    let channels = PipelineChannels {
        display_tx,
        display_rx,
        recognizer_tx,
        recognizer_rx,
        hands_tx,
        hands_rx,
    };

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, config, channels) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}

use super::{
    ActiveTheme, AnyElement, AppView, Context, DownloadMessage, DownloadState, IntoElement,
    ModelDownloadEvent, ModelKind, ParentElement, Sender, Styled, StyledExt, Tag, div,
    ensure_model_ready, h_flex, thread, v_flex,
};
use crate::config::Config;

impl AppView {
    pub(super) fn poll_download_events(&mut self, state: &mut DownloadState) {
        while let Ok(msg) = self.download_rx.try_recv() {
            match msg {
                DownloadMessage::Event(ModelDownloadEvent::AlreadyPresent { model }) => {
                    state.current = Some(model);
                    state.message = format!("{} 已存在", model.label());
                }
                DownloadMessage::Event(ModelDownloadEvent::Started { model, total }) => {
                    state.current = Some(model);
                    state.downloaded = 0;
                    state.total = total;
                    state.message = format!("正在下载 {}...", model.label());
                }
                DownloadMessage::Event(ModelDownloadEvent::Progress {
                    model,
                    downloaded,
                    total,
                }) => {
                    state.current = Some(model);
                    state.downloaded = downloaded;
                    state.total = total;
                }
                DownloadMessage::Event(ModelDownloadEvent::Finished { model }) => {
                    state.ready += 1;
                    state.message = format!("{} 就绪", model.label());
                }
                DownloadMessage::Error(err) => {
                    state.error = Some(err);
                    state.message = "模型下载失败".to_string();
                }
            }
        }
    }

    pub(super) fn render_download_view(
        &self,
        state: &DownloadState,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let bar = progress_bar_string(state.downloaded, state.total);
        let detail = match state.total {
            Some(total) if total > 0 => {
                let percent = (state.downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
                format!("{percent:.1}%")
            }
            _ => format!("已下载 {} KB", state.downloaded / 1024),
        };
        let current = state
            .current
            .map(|model| model.label().to_string())
            .unwrap_or_else(|| "--".to_string());

        let (status_icon, status_text, status_color) = if state.finished() {
            ("✓", "模型就绪", theme.success)
        } else if state.error.is_some() {
            ("✗", "模型下载失败", theme.accent)
        } else {
            ("⟳", "模型下载中", theme.foreground)
        };

        let mut container = v_flex()
            .gap_3()
            .p_6()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .bg(theme.group_box)
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(
                        div()
                            .text_color(status_color)
                            .font_semibold()
                            .child(format!("{status_icon} {status_text}")),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.muted_foreground)
                            .child(format!(
                                "手部模型 {}/{}",
                                state.ready.min(ModelKind::ALL.len()),
                                ModelKind::ALL.len()
                            )),
                    ),
            )
            .child(
                div()
                    .px_3()
                    .py_2()
                    .rounded_md()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.muted)
                    .font_family(theme.mono_font_family.clone())
                    .text_color(theme.foreground)
                    .child(bar),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(theme.muted_foreground)
                    .child(format!("{current}: {detail}")),
            )
            .child(div().text_color(theme.foreground).child(state.message.clone()));

        if let Some(err) = &state.error {
            container = container.child(Tag::danger().rounded_full().child(format!("错误: {err}")));
        }

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(container)
            .into_any_element()
    }
}

/// Fetches both models in sequence on a background thread, forwarding progress.
pub(super) fn spawn_model_download(
    config: &Config,
    tx: Sender<DownloadMessage>,
) -> thread::JoinHandle<()> {
    let models = [
        (ModelKind::PalmDetector, config.detector.palm_model.clone()),
        (ModelKind::HandposeEstimator, config.detector.handpose_model.clone()),
    ];

    thread::spawn(move || {
        for (kind, path) in models {
            let result = ensure_model_ready(kind, &path, |event| {
                let _ = tx.send(DownloadMessage::Event(event));
            });
            if let Err(err) = result {
                log::error!("failed to prepare {} model: {err:?}", kind.label());
                let _ = tx.send(DownloadMessage::Error(format!("{err:#}")));
                return;
            }
        }
    })
}

fn progress_bar_string(downloaded: u64, total: Option<u64>) -> String {
    const BAR_LEN: usize = 30;
    match total {
        Some(total) if total > 0 => {
            let pct = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
            let filled = ((pct * BAR_LEN as f64).round() as usize).min(BAR_LEN);
            format!(
                "[{}{}] {:>5.1}%",
                "=".repeat(filled),
                " ".repeat(BAR_LEN - filled),
                pct * 100.0
            )
        }
        _ => {
            let spinner_width = ((downloaded / 64) as usize % BAR_LEN) + 1;
            format!("[{:-<width$}] 大小未知", ">", width = spinner_width)
        }
    }
}

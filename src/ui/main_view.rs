use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, CAMERA_VIEW_WIDTH, Context,
    DEFAULT_CAMERA_RATIO, InteractiveElement, IntoElement, MouseButton, MouseDownEvent,
    ObjectFit, ParentElement, Selectable, SharedString, Styled, StyledImage, div, h_flex, img, px,
    v_flex,
};
use crate::{tracking::CursorTracker, types::Hand};

#[derive(Clone, Copy)]
enum OverlayLayer {
    Skeleton,
    Trail,
    Cursor,
}

impl AppView {
    pub(super) fn render_main(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let ratio = self
            .frame_size
            .filter(|&(_, h)| h > 0)
            .map(|(w, h)| w as f32 / h as f32)
            .unwrap_or(DEFAULT_CAMERA_RATIO);
        let camera_height = CAMERA_VIEW_WIDTH / ratio;

        let frame_view: AnyElement = if let Some(image) = &self.latest_image {
            img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element()
        } else {
            div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .child("等待摄像头...")
                .into_any_element()
        };

        // Tapping the video is the quick way to hide the skeleton.
        let camera_shell = div()
            .w(px(CAMERA_VIEW_WIDTH))
            .h(px(camera_height))
            .overflow_hidden()
            .rounded_t_lg()
            .bg(gpui::rgb(0x000000))
            .cursor_pointer()
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, _: &MouseDownEvent, _, cx| {
                    this.overlay.skeleton = !this.overlay.skeleton;
                    cx.notify();
                }),
            )
            .child(frame_view);

        let toggles = h_flex()
            .gap_2()
            .child(self.toggle_button("toggle-skeleton", "骨架", OverlayLayer::Skeleton, cx))
            .child(self.toggle_button("toggle-trail", "轨迹", OverlayLayer::Trail, cx))
            .child(self.toggle_button("toggle-cursor", "光标", OverlayLayer::Cursor, cx));

        let mut info = v_flex()
            .gap_2()
            .p_3()
            .child(
                h_flex()
                    .justify_between()
                    .items_center()
                    .child(
                        div()
                            .text_sm()
                            .text_color(gpui::rgb(0xe2e8f0))
                            .child(self.tracking_status()),
                    )
                    .child(toggles),
            )
            .child(
                div()
                    .text_xs()
                    .text_color(gpui::rgb(0x8b95a5))
                    .overflow_hidden()
                    .text_ellipsis()
                    .whitespace_nowrap()
                    .child(self.camera_status()),
            );

        if let Some(err) = &self.camera_error {
            info = info.child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .p_3()
                    .rounded_lg()
                    .bg(gpui::rgba(0xef444433))
                    .border_1()
                    .border_color(gpui::rgba(0xef4444ff))
                    .child(div().text_base().child("⚠️"))
                    .child(
                        div()
                            .text_xs()
                            .text_color(gpui::rgb(0xfca5a5))
                            .child(err.clone()),
                    ),
            );
        }

        let card = v_flex()
            .w(px(CAMERA_VIEW_WIDTH))
            .rounded_lg()
            .overflow_hidden()
            .bg(gpui::rgb(0x0f1419))
            .child(camera_shell)
            .child(info);

        let theme = cx.theme();
        let (recognizer_icon, recognizer_text, recognizer_color) =
            if self.recognizer_handle.is_some() {
                ("●", "识别运行中", theme.success)
            } else {
                ("○", "识别未启动", theme.muted_foreground)
            };

        v_flex()
            .size_full()
            .gap_3()
            .p_4()
            .items_center()
            .bg(gpui::rgb(0x1a2332))
            .child(
                div()
                    .text_xs()
                    .text_color(recognizer_color)
                    .child(format!("{recognizer_icon} {recognizer_text}")),
            )
            .child(card)
            .into_any_element()
    }

    fn toggle_button(
        &self,
        id: &'static str,
        label: &'static str,
        layer: OverlayLayer,
        cx: &mut Context<'_, Self>,
    ) -> Button {
        let on = match layer {
            OverlayLayer::Skeleton => self.overlay.skeleton,
            OverlayLayer::Trail => self.overlay.trail,
            OverlayLayer::Cursor => self.overlay.cursor,
        };
        let button = Button::new(SharedString::from(id)).label(label).selected(on);
        let button = if on { button.primary() } else { button.outline() };
        button.on_click(cx.listener(move |this, _, _, cx| {
            let flag = match layer {
                OverlayLayer::Skeleton => &mut this.overlay.skeleton,
                OverlayLayer::Trail => &mut this.overlay.trail,
                OverlayLayer::Cursor => &mut this.overlay.cursor,
            };
            *flag = !*flag;
            cx.notify();
        }))
    }

    fn tracking_status(&self) -> String {
        let staleness = self
            .last_detection
            .map(|at| format!("{} ms 前", at.elapsed().as_millis()))
            .unwrap_or_else(|| "尚无检测".to_string());
        let hand = self
            .tracked
            .selected
            .and_then(|idx| self.hands_rx.hands().get(idx));
        format!(
            "{} · 检测 {staleness}",
            describe_tracking(&self.tracker, hand)
        )
    }

    fn camera_status(&self) -> String {
        match (&self.camera_stream, self.frame_size) {
            (Some(_), Some((w, h))) => format!("摄像头: {} {w}x{h}", self.camera_label),
            (Some(_), None) => format!("摄像头: {}，等待画面...", self.camera_label),
            (None, _) => format!("摄像头: {}", self.camera_label),
        }
    }
}

fn describe_tracking(tracker: &CursorTracker, hand: Option<&Hand>) -> String {
    let trail = tracker.trail();
    match (tracker.cursor(), hand) {
        (Some(cursor), Some(hand)) => format!(
            "{} · 关键点 {} · z={:.3} · 尺寸 {:.0}px · 轨迹 {}/{}",
            hand.handedness.label(),
            tracker.deriver().keypoint_index(),
            cursor.depth,
            cursor.depth_size,
            trail.len(),
            trail.capacity()
        ),
        _ => format!(
            "未跟踪到手 · 策略 {} · 轨迹 {}/{}",
            tracker.selector().policy().label(),
            trail.len(),
            trail.capacity()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        pipeline::ViewportMapper,
        types::{Handedness, Keypoint, Keypoint3},
    };

    fn left_hand(z: f32) -> Hand {
        Hand::new(vec![Keypoint::new(40.0, 30.0); 21], Handedness::Left)
            .with_keypoints_3d(vec![Keypoint3::new(0.0, 0.0, z); 21])
    }

    #[test]
    fn status_describes_tracked_cursor() {
        let config = Config::default();
        let mut tracker = CursorTracker::new(&config.tracking);
        let hands = vec![left_hand(-0.1)];
        let frame = tracker.update(&hands, &ViewportMapper::for_frame(100, 100, false));

        let text = describe_tracking(&tracker, frame.selected.map(|i| &hands[i]));
        assert_eq!(text, "左手 · 关键点 8 · z=-0.100 · 尺寸 50px · 轨迹 1/20");
    }

    #[test]
    fn status_reports_missing_hand() {
        let config = Config::default();
        let tracker = CursorTracker::new(&config.tracking);
        let text = describe_tracking(&tracker, None);
        assert_eq!(
            text,
            format!("未跟踪到手 · 策略 {} · 轨迹 0/20", config.tracking.hand.label())
        );
    }
}

use super::render_util::canvas_to_image;
use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, Context, Hsla, IntoElement, ObjectFit,
    ParentElement, SessionStatus, SharedString, Styled, StyledExt, StyledImage, Window, div,
    h_flex, img, px, v_flex,
};
use std::{sync::Arc, time::Instant};

const TEXT_PANEL_HEIGHT: f32 = 120.0;

impl AppView {
    pub(super) fn render_main(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        self.poll_source();

        if self.display.needs_redraw {
            self.canvas
                .render(self.session.layout(), self.display.output.as_ref());
            if let Some(image) = canvas_to_image(&self.canvas) {
                self.replace_latest_image(image, window, cx);
            }
            self.display.needs_redraw = false;
        }

        let success = cx.theme().success;
        let muted = cx.theme().muted_foreground;
        let foreground = cx.theme().foreground;

        let status = self.session.status();
        let status_color: Hsla = if status.is_error() {
            gpui::rgb(0xfca5a5).into()
        } else if matches!(status, SessionStatus::Running { .. }) {
            success
        } else {
            muted
        };
        let status_text = status.message();

        let keyboard = self.render_keyboard();

        let typed = self.session.text();
        let typed_view = if typed.is_empty() {
            div()
                .text_color(muted)
                .child("Point at a key to type...")
        } else {
            div()
                .text_color(foreground)
                .child(SharedString::from(typed.to_string()))
        };

        let border = if self.display.pulsing(Instant::now()) {
            gpui::rgb(0x10b981)
        } else {
            gpui::rgb(0x334155)
        };

        let export_text = self.display.export_text().unwrap_or_default();
        let hands_text = self.display.hand_captions().join("  ");
        let last_key_text = self.display.last_key_text().unwrap_or_default();

        let text_panel = v_flex()
            .w(px(self.canvas.width as f32))
            .h(px(TEXT_PANEL_HEIGHT))
            .p_3()
            .gap_1()
            .rounded_lg()
            .border_2()
            .border_color(border)
            .bg(gpui::rgb(0x0f1419))
            .overflow_hidden()
            .child(
                h_flex()
                    .justify_between()
                    .child(div().text_xs().text_color(muted).child("Typed text"))
                    .child(div().text_xs().text_color(muted).child(last_key_text)),
            )
            .child(div().text_lg().child(typed_view));

        let toggle_label = if self.source.is_some() {
            "Stop tracking"
        } else {
            "Start tracking"
        };

        let info_row = h_flex()
            .w(px(self.canvas.width as f32))
            .justify_between()
            .items_center()
            .gap_2()
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(
                        div()
                            .text_sm()
                            .text_color(status_color)
                            .child(status_text),
                    )
                    .child(div().text_xs().text_color(foreground).child(hands_text))
                    .child(
                        div()
                            .text_xs()
                            .text_color(muted)
                            .overflow_hidden()
                            .text_ellipsis()
                            .whitespace_nowrap()
                            .child(export_text),
                    ),
            )
            .child(
                Button::new(SharedString::from("tracking-toggle"))
                    .primary()
                    .label(toggle_label)
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.toggle_tracking();
                        cx.notify();
                    })),
            );

        v_flex()
            .size_full()
            .bg(gpui::rgb(0x1a2332))
            .p_4()
            .gap_3()
            .items_center()
            .child(keyboard)
            .child(info_row)
            .child(text_panel)
            .into_any_element()
    }

    /// The rasterized canvas with key captions laid over it at layout
    /// coordinates.
    fn render_keyboard(&self) -> AnyElement {
        let width = self.canvas.width as f32;
        let height = self.canvas.height as f32;

        let background: AnyElement = if let Some(image) = &self.latest_image {
            img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element()
        } else {
            div().size_full().bg(gpui::rgb(0x0f1419)).into_any_element()
        };

        let captions = self.session.layout().keys().iter().map(|key| {
            div()
                .absolute()
                .left(px(key.rect.x))
                .top(px(key.rect.y))
                .w(px(key.rect.width))
                .h(px(key.rect.height))
                .flex()
                .items_center()
                .justify_center()
                .text_lg()
                .font_semibold()
                .text_color(gpui::rgb(0xe2e8f0))
                .child(key.label.to_string())
        });

        div()
            .relative()
            .w(px(width))
            .h(px(height))
            .overflow_hidden()
            .rounded_lg()
            .child(background)
            .children(captions)
            .into_any_element()
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<super::RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // The sprite atlas keeps every uploaded frame until it is dropped here.
            cx.drop_image(old_image, Some(window));
        }
    }
}

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::TryRecvError;
use gpui::{
    AnyElement, App, AppContext, Context, Hsla, IntoElement, ObjectFit, ParentElement, Render,
    RenderImage, SharedString, Styled, StyledImage, TitlebarOptions, Window, WindowOptions, div,
    img, px,
};
use gpui_component::{
    ActiveTheme, Root, StyledExt,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::{
    config::AppConfig,
    keyboard::{
        FileExporter, FrameOutcome, FrameOutput, KeyboardLayout, MidlineAssigner, Session,
        session::{Emission, SessionStatus},
        text::ExportArtifact,
    },
    pipeline::{OverlayCanvas, SourceHandle, spawn_source},
    types::Surface,
};

mod main_view;
mod render_util;

const PULSE_DURATION: Duration = Duration::from_millis(150);

pub fn launch_ui(app: &mut App, config: AppConfig) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Air Keys".into()),
            appears_transparent: false,
            traffic_light_position: None,
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(config));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

/// What the window shows from the latest source events. Render state is
/// per frame: anything but a processed frame clears it.
#[derive(Default)]
struct FrameDisplay {
    output: Option<FrameOutput>,
    last_pulse: Option<Instant>,
    last_emission: Option<Emission>,
    last_export: Option<ExportArtifact>,
    needs_redraw: bool,
}

impl FrameDisplay {
    fn apply(&mut self, outcome: FrameOutcome, now: Instant) {
        match outcome {
            FrameOutcome::Processed(output) => {
                if output.emissions.iter().any(|e| e.haptic) {
                    self.last_pulse = Some(now);
                }
                if let Some(emission) = output.emissions.last() {
                    self.last_emission = Some(*emission);
                }
                if let Some(artifact) = output.exports.last() {
                    self.last_export = Some(artifact.clone());
                }
                self.output = Some(output);
            }
            FrameOutcome::Skipped
            | FrameOutcome::Fault(_)
            | FrameOutcome::Unavailable(_)
            | FrameOutcome::Stopped => {
                self.output = None;
            }
        }
        self.needs_redraw = true;
    }

    fn clear(&mut self) {
        self.output = None;
        self.needs_redraw = true;
    }

    fn pulsing(&self, now: Instant) -> bool {
        self.last_pulse
            .is_some_and(|at| now.saturating_duration_since(at) < PULSE_DURATION)
    }

    fn hand_captions(&self) -> Vec<String> {
        self.output
            .iter()
            .flat_map(|output| &output.cursors)
            .map(|cursor| format!("{} hand: {}", cursor.slot.label(), cursor.gesture.label()))
            .collect()
    }

    fn last_key_text(&self) -> Option<String> {
        self.last_emission
            .map(|e| format!("{} hand typed {}", e.slot.label(), e.label))
    }

    fn export_text(&self) -> Option<String> {
        self.last_export.as_ref().map(|artifact| {
            format!(
                "Last export: {} ({} bytes, {})",
                artifact.path.display(),
                artifact.bytes,
                artifact.mime
            )
        })
    }
}

struct AppView {
    config: AppConfig,
    session: Session,
    source: Option<SourceHandle>,
    canvas: OverlayCanvas,
    display: FrameDisplay,
    latest_image: Option<Arc<RenderImage>>,
}

impl AppView {
    fn new(config: AppConfig) -> Self {
        let (width, height) = config.canvas;
        let surface = Surface::sized(width as f32, height as f32);
        let session = Session::new(
            config.session.clone(),
            KeyboardLayout::qwerty(surface),
            Box::new(FileExporter::new(config.export_dir.clone())),
            Box::new(MidlineAssigner),
        );
        let source = spawn_source(config.source.build(&config.settings));
        log::info!("air keyboard started with {}", source.name());

        Self {
            canvas: OverlayCanvas::new(width, height),
            config,
            session,
            source: Some(source),
            display: FrameDisplay {
                needs_redraw: true,
                ..FrameDisplay::default()
            },
            latest_image: None,
        }
    }

    /// The keyboard is drawn at a fixed pixel size, so the configured canvas
    /// size is the surface box handed to every frame.
    fn surface(&self) -> Surface {
        Surface::sized(self.canvas.width as f32, self.canvas.height as f32)
    }

    fn poll_source(&mut self) {
        let Some(source) = self.source.as_ref() else {
            return;
        };

        let mut events = Vec::new();
        let mut disconnected = false;
        loop {
            match source.events().try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        for event in events {
            let outcome = self.session.handle_event(event, self.surface());
            self.display.apply(outcome, Instant::now());
        }

        if disconnected {
            if let Some(source) = self.source.take() {
                log::info!("{} closed its channel", source.name());
                source.stop();
            }
            if !matches!(
                self.session.status(),
                SessionStatus::Unavailable(_) | SessionStatus::Stopped
            ) {
                self.session.stop();
            }
            self.display.clear();
        }
    }

    fn toggle_tracking(&mut self) {
        if let Some(source) = self.source.take() {
            log::info!("stopping {}", source.name());
            source.stop();
            self.session.stop();
        } else {
            self.session.restart();
            let source = spawn_source(self.config.source.build(&self.config.settings));
            log::info!("restarted {}", source.name());
            self.source = Some(source);
        }
        self.display.clear();
    }
}

impl Render for AppView {
    fn render(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) -> impl IntoElement {
        // Landmark frames arrive off-thread; keep polling every frame.
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        self.render_main(window, cx)
    }
}

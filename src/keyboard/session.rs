use std::time::Duration;

use super::{
    emitter::{DEFAULT_DEBOUNCE, Emitter, EmitterPhase},
    layout::{DEFAULT_HIT_MARGIN, KeyLabel, KeyboardLayout},
    mapper::CoverMapping,
    text::{ExportArtifact, Exporter, KeyAction, TextBuffer},
};
use crate::{
    gesture::{Gesture, GestureClassifier},
    pipeline::source::{SourceError, SourceEvent},
    types::{HandLandmarks, HandSlot, LandmarkFrame, ScreenPoint, Surface},
};

#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub debounce: Duration,
    pub hit_margin: f32,
    pub hold_frames: u32,
    pub haptics: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            hit_margin: DEFAULT_HIT_MARGIN,
            hold_frames: 1,
            haptics: true,
        }
    }
}

/// Decides which slot a detected hand plays this frame.
pub trait SlotAssigner: Send {
    fn assign(&self, hand: &HandLandmarks) -> HandSlot;
}

/// Splits on the frame midline using the index fingertip. This is a
/// per-frame guess, not a tracked identity: a hand crossing the midline
/// changes slot, and two hands on the same half compete for one slot.
pub struct MidlineAssigner;

impl SlotAssigner for MidlineAssigner {
    fn assign(&self, hand: &HandLandmarks) -> HandSlot {
        if hand.index_tip().x < 0.5 {
            HandSlot::Left
        } else {
            HandSlot::Right
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyRenderState {
    #[default]
    None,
    Hovered,
    Glowing,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cursor {
    pub slot: HandSlot,
    pub point: ScreenPoint,
    pub gesture: Gesture,
    pub skeleton: Vec<ScreenPoint>,
    /// False when another hand already owned this slot in the frame.
    pub tracked: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Emission {
    pub slot: HandSlot,
    pub label: KeyLabel,
    pub haptic: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameOutput {
    pub key_states: Vec<KeyRenderState>,
    pub cursors: Vec<Cursor>,
    pub emissions: Vec<Emission>,
    pub exports: Vec<ExportArtifact>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    Processed(FrameOutput),
    /// Frame or surface size not known yet.
    Skipped,
    Fault(String),
    Unavailable(String),
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Waiting,
    Running { hands: usize },
    Fault(String),
    ExportFailed(String),
    Unavailable(String),
    Stopped,
}

impl SessionStatus {
    pub fn message(&self) -> String {
        match self {
            SessionStatus::Waiting => "Waiting for hand tracker...".to_string(),
            SessionStatus::Running { hands: 0 } => "Show a hand to the camera".to_string(),
            SessionStatus::Running { hands } => format!("Tracking {hands} hand(s)"),
            SessionStatus::Fault(msg) => format!("Skipped a frame: {msg}"),
            SessionStatus::ExportFailed(msg) => format!("Export failed: {msg}"),
            SessionStatus::Unavailable(msg) => format!("Hand tracking unavailable: {msg}"),
            SessionStatus::Stopped => "Tracking stopped".to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            SessionStatus::Fault(_) | SessionStatus::ExportFailed(_) | SessionStatus::Unavailable(_)
        )
    }
}

/// All mutable state of one typing session. Frames go through
/// [`Session::process_frame`] strictly one at a time.
pub struct Session {
    config: SessionConfig,
    layout: KeyboardLayout,
    classifier: GestureClassifier,
    emitter: Emitter,
    text: TextBuffer,
    exporter: Box<dyn Exporter>,
    assigner: Box<dyn SlotAssigner>,
    status: SessionStatus,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        layout: KeyboardLayout,
        exporter: Box<dyn Exporter>,
        assigner: Box<dyn SlotAssigner>,
    ) -> Self {
        Self {
            classifier: GestureClassifier::new(config.hold_frames),
            emitter: Emitter::new(config.debounce),
            config,
            layout,
            text: TextBuffer::new(),
            exporter,
            assigner,
            status: SessionStatus::Waiting,
        }
    }

    pub fn layout(&self) -> &KeyboardLayout {
        &self.layout
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn handle_event(&mut self, event: SourceEvent, surface: Surface) -> FrameOutcome {
        match event {
            SourceEvent::Frame(frame) => self.process_frame(&frame, surface),
            SourceEvent::Fault(err) => {
                log::warn!("skipping frame: {err}");
                self.status = SessionStatus::Fault(err.to_string());
                FrameOutcome::Fault(err.to_string())
            }
            SourceEvent::Unavailable(err) => {
                log::error!("landmark source unavailable: {err}");
                self.stop();
                let msg = match err {
                    SourceError::Unavailable(msg) => msg,
                    other => other.to_string(),
                };
                self.status = SessionStatus::Unavailable(msg.clone());
                FrameOutcome::Unavailable(msg)
            }
            SourceEvent::Stopped => {
                if !matches!(self.status, SessionStatus::Unavailable(_)) {
                    self.stop();
                }
                FrameOutcome::Stopped
            }
        }
    }

    /// Runs map → classify → hit-test → emit for one frame.
    pub fn process_frame(&mut self, frame: &LandmarkFrame, surface: Surface) -> FrameOutcome {
        let Some(mapping) = frame
            .frame_size
            .and_then(|size| CoverMapping::new(surface, size))
        else {
            return FrameOutcome::Skipped;
        };

        self.status = SessionStatus::Running {
            hands: frame.hands.len(),
        };
        let mut output = FrameOutput {
            key_states: vec![KeyRenderState::None; self.layout.keys().len()],
            ..FrameOutput::default()
        };

        let mut owners: [Option<usize>; 2] = [None, None];
        for (idx, hand) in frame.hands.iter().enumerate() {
            let slot = self.assigner.assign(hand);
            let owner = &mut owners[slot.index()];
            if owner.is_none() {
                *owner = Some(idx);
            } else {
                log::debug!("{} slot already taken, hand {idx} is display-only", slot.label());
            }
        }

        let mut gestures: [Gesture; 2] = [Gesture::default(); 2];
        for slot in HandSlot::ALL {
            let Some(hand) = owners[slot.index()].map(|idx| &frame.hands[idx]) else {
                self.emitter.clear(slot);
                self.classifier.release(slot);
                continue;
            };

            let gesture = self.classifier.classify(slot, hand);
            gestures[slot.index()] = gesture;
            let point = mapping.map_landmark(hand.index_tip());
            let hit = self.layout.hit_test(point, self.config.hit_margin);
            let label = hit.and_then(|idx| self.layout.key(idx)).map(|key| key.label);
            let decision = self.emitter.update(slot, gesture, label, frame.timestamp);

            if let Some(idx) = hit {
                let state = match decision.phase {
                    EmitterPhase::Emitted => KeyRenderState::Glowing,
                    EmitterPhase::Hovering => KeyRenderState::Hovered,
                    EmitterPhase::Idle => KeyRenderState::None,
                };
                output.key_states[idx] = output.key_states[idx].max(state);
            }

            if let Some(label) = decision.emit {
                output.emissions.push(Emission {
                    slot,
                    label,
                    haptic: self.config.haptics,
                });
                if let Some(artifact) = self.apply_key(label) {
                    output.exports.push(artifact);
                }
            }
        }

        for (idx, hand) in frame.hands.iter().enumerate() {
            let slot = self.assigner.assign(hand);
            let tracked = owners[slot.index()] == Some(idx);
            output.cursors.push(Cursor {
                slot,
                point: mapping.map_landmark(hand.index_tip()),
                gesture: if tracked {
                    gestures[slot.index()]
                } else {
                    crate::gesture::classify(hand)
                },
                skeleton: hand
                    .points()
                    .iter()
                    .map(|&lm| mapping.map_landmark(lm))
                    .collect(),
                tracked,
            });
        }

        FrameOutcome::Processed(output)
    }

    fn apply_key(&mut self, label: KeyLabel) -> Option<ExportArtifact> {
        match self.text.apply(label) {
            KeyAction::Edited | KeyAction::Cleared => None,
            KeyAction::Submit { contents } => match self.exporter.export(&contents) {
                Ok(artifact) => {
                    self.text.clear();
                    Some(artifact)
                }
                Err(err) => {
                    log::error!("failed to export typed text: {err:?}");
                    self.status = SessionStatus::ExportFailed(format!("{err:#}"));
                    None
                }
            },
        }
    }

    /// Tracking halted: nothing from before the stop may carry over.
    pub fn stop(&mut self) {
        self.emitter.reset();
        self.classifier.reset();
        self.status = SessionStatus::Stopped;
    }

    pub fn restart(&mut self) {
        self.emitter.reset();
        self.classifier.reset();
        self.status = SessionStatus::Waiting;
    }
}

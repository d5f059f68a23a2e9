use std::time::{Duration, Instant};

use super::layout::KeyLabel;
use crate::{gesture::Gesture, types::HandSlot};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmitterState {
    pub last_key: Option<KeyLabel>,
    pub last_emit: Option<Instant>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitterPhase {
    Idle,
    Hovering,
    Emitted,
}

/// What one slot did with its hit this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub phase: EmitterPhase,
    pub emit: Option<KeyLabel>,
}

impl Decision {
    fn idle() -> Self {
        Self {
            phase: EmitterPhase::Idle,
            emit: None,
        }
    }
}

/// Debounced tap detection, one [`EmitterState`] per hand slot.
pub struct Emitter {
    debounce: Duration,
    states: [EmitterState; 2],
}

impl Emitter {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            states: [EmitterState::default(); 2],
        }
    }

    pub fn update(
        &mut self,
        slot: HandSlot,
        gesture: Gesture,
        hit: Option<KeyLabel>,
        now: Instant,
    ) -> Decision {
        let Some(label) = hit else {
            self.clear(slot);
            return Decision::idle();
        };

        if !gesture.pointing {
            return Decision {
                phase: EmitterPhase::Hovering,
                emit: None,
            };
        }

        let state = &mut self.states[slot.index()];
        let fresh_key = state.last_key != Some(label);
        let window_elapsed = state
            .last_emit
            .map_or(true, |last| now.saturating_duration_since(last) > self.debounce);

        let emit = if fresh_key || window_elapsed {
            state.last_key = Some(label);
            state.last_emit = Some(now);
            log::debug!("{} hand emitted {label}", slot.label());
            Some(label)
        } else {
            None
        };

        Decision {
            phase: EmitterPhase::Emitted,
            emit,
        }
    }

    /// Drop the slot's memory so a returning hand starts fresh.
    pub fn clear(&mut self, slot: HandSlot) {
        self.states[slot.index()].last_key = None;
    }

    pub fn reset(&mut self) {
        self.states = [EmitterState::default(); 2];
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

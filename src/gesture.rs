use crate::types::{
    HandLandmarks, HandSlot,
    landmark::{
        INDEX_MCP, INDEX_PIP, INDEX_TIP, MIDDLE_PIP, MIDDLE_TIP, PINKY_PIP, PINKY_TIP, RING_PIP,
        RING_TIP,
    },
};

/// Pose flags for one hand in one frame. The two flags are computed
/// independently; a curled middle finger keeps `pointing` and `open` apart
/// in practice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Gesture {
    pub pointing: bool,
    pub open: bool,
}

impl Gesture {
    pub fn label(&self) -> &'static str {
        match (self.pointing, self.open) {
            (true, _) => "pointing",
            (false, true) => "open",
            (false, false) => "other",
        }
    }
}

/// Raw per-frame classification, no history involved.
///
/// Landmark y grows downwards, so "above" means a smaller y.
pub fn classify(hand: &HandLandmarks) -> Gesture {
    let y = |idx: usize| hand.point(idx).y;
    let index_base = y(INDEX_MCP);

    let pointing = y(INDEX_TIP) < index_base
        && y(MIDDLE_TIP) > index_base
        && y(RING_TIP) > index_base
        && y(PINKY_TIP) > index_base;

    let open = [
        (INDEX_TIP, INDEX_PIP),
        (MIDDLE_TIP, MIDDLE_PIP),
        (RING_TIP, RING_PIP),
        (PINKY_TIP, PINKY_PIP),
    ]
    .iter()
    .all(|&(tip, joint)| y(tip) < y(joint));

    Gesture { pointing, open }
}

/// Per-slot classifier with optional hysteresis on the pointing flag.
///
/// With `hold_frames == 1` the output is exactly [`classify`]. Larger values
/// require that many consecutive raw pointing frames before `pointing` is
/// reported, which filters single-frame landmark jitter.
pub struct GestureClassifier {
    hold_frames: u32,
    pointing_streak: [u32; 2],
}

impl GestureClassifier {
    pub fn new(hold_frames: u32) -> Self {
        Self {
            hold_frames: hold_frames.max(1),
            pointing_streak: [0; 2],
        }
    }

    pub fn classify(&mut self, slot: HandSlot, hand: &HandLandmarks) -> Gesture {
        let raw = classify(hand);
        let streak = &mut self.pointing_streak[slot.index()];
        if raw.pointing {
            *streak = streak.saturating_add(1);
        } else {
            *streak = 0;
        }

        Gesture {
            pointing: raw.pointing && *streak >= self.hold_frames,
            open: raw.open,
        }
    }

    /// Forget the history of a slot whose hand left the frame.
    pub fn release(&mut self, slot: HandSlot) {
        self.pointing_streak[slot.index()] = 0;
    }

    pub fn reset(&mut self) {
        self.pointing_streak = [0; 2];
    }
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(1)
    }
}


#[cfg(test)]
mod tests {
    use super::{fixtures::*, *};

    #[test]
    fn index_up_others_curled_is_pointing() {
        let gesture = classify(&pointing_hand(0.3, 0.4));
        assert!(gesture.pointing);
        assert!(!gesture.open);
        assert_eq!(gesture.label(), "pointing");
    }

    #[test]
    fn all_fingers_up_is_open() {
        let gesture = classify(&open_hand(0.3, 0.4));
        assert!(gesture.open);
        assert!(!gesture.pointing);
    }

    #[test]
    fn fist_is_neither() {
        let gesture = classify(&fist(0.5, 0.5));
        assert_eq!(gesture, Gesture::default());
        assert_eq!(gesture.label(), "other");
    }

    #[test]
    fn hold_frames_delays_pointing() {
        let mut classifier = GestureClassifier::new(3);
        let hand = pointing_hand(0.3, 0.4);
        assert!(!classifier.classify(HandSlot::Left, &hand).pointing);
        assert!(!classifier.classify(HandSlot::Left, &hand).pointing);
        assert!(classifier.classify(HandSlot::Left, &hand).pointing);

        classifier.release(HandSlot::Left);
        assert!(!classifier.classify(HandSlot::Left, &hand).pointing);
    }

    #[test]
    fn single_frame_hold_matches_raw_classification() {
        let mut classifier = GestureClassifier::default();
        let hand = pointing_hand(0.7, 0.2);
        assert_eq!(classifier.classify(HandSlot::Right, &hand), classify(&hand));
    }

    #[test]
    fn slots_keep_separate_streaks() {
        let mut classifier = GestureClassifier::new(2);
        let hand = pointing_hand(0.3, 0.4);
        classifier.classify(HandSlot::Left, &hand);
        assert!(!classifier.classify(HandSlot::Right, &hand).pointing);
        assert!(classifier.classify(HandSlot::Left, &hand).pointing);
    }
}

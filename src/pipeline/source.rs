use std::{
    mem,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{FrameSize, HandLandmarks, Landmark, LandmarkFrame};

const EVENT_QUEUE_DEPTH: usize = 2;
const SEND_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Frame(String),
    #[error("malformed landmark record: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("landmark source i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub enum SourceEvent {
    Frame(LandmarkFrame),
    /// One frame could not be produced; the source keeps running.
    Fault(SourceError),
    /// The source never started. No frames will follow.
    Unavailable(SourceError),
    Stopped,
}

/// Options handed to the perception backend at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceSettings {
    pub max_hands: usize,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub model_complexity: u8,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            max_hands: 2,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.5,
            model_complexity: 1,
        }
    }
}

/// Anything that can produce landmark frames on a worker thread.
pub trait LandmarkSource: Send + 'static {
    fn describe(&self) -> String;

    /// Produce frames until exhausted or `stop` is raised. Returning
    /// `Err(SourceError::Unavailable)` means no frame was ever produced.
    fn run(self: Box<Self>, events: &EventSink) -> Result<(), SourceError>;
}

type StopHook = Box<dyn FnOnce() + Send>;

/// Stop flag plus the callbacks that unblock a source stuck in a read.
#[derive(Default)]
struct StopSignal {
    raised: AtomicBool,
    hooks: Mutex<Vec<StopHook>>,
}

impl StopSignal {
    fn raised(&self) -> bool {
        self.raised.load(Ordering::Relaxed)
    }

    fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
        let hooks = match self.hooks.lock() {
            Ok(mut hooks) => mem::take(&mut *hooks),
            Err(poisoned) => mem::take(&mut *poisoned.into_inner()),
        };
        for hook in hooks {
            hook();
        }
    }

    fn register(&self, hook: StopHook) {
        if let Ok(mut hooks) = self.hooks.lock() {
            if !self.raised() {
                hooks.push(hook);
                return;
            }
        }
        hook();
    }
}

/// Sending half handed to a running source.
pub struct EventSink {
    tx: Sender<SourceEvent>,
    stop: Arc<StopSignal>,
}

impl EventSink {
    pub fn stopped(&self) -> bool {
        self.stop.raised()
    }

    /// Runs `hook` on the stopping thread when the source is told to stop,
    /// or right away if it already was. Sources blocked on I/O use this to
    /// close whatever they are reading from.
    pub fn on_stop(&self, hook: impl FnOnce() + Send + 'static) {
        self.stop.register(Box::new(hook));
    }

    /// Blocks until the consumer takes the event. Returns false once the
    /// source should wind down.
    pub fn deliver(&self, event: SourceEvent) -> bool {
        let mut event = event;
        loop {
            if self.stopped() {
                return false;
            }
            match self.tx.send_timeout(event, SEND_POLL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(back)) => event = back,
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    /// Latest-frame-wins delivery for live sources: a frame that finds the
    /// queue full is dropped instead of building a backlog.
    pub fn offer(&self, frame: LandmarkFrame) -> bool {
        if self.stopped() {
            return false;
        }
        match self.tx.try_send(SourceEvent::Frame(frame)) {
            Ok(()) => true,
            Err(err) => !err.is_disconnected(),
        }
    }
}

/// A running source thread and the receiving end of its events.
pub struct SourceHandle {
    name: String,
    events: Receiver<SourceEvent>,
    stop: Arc<StopSignal>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SourceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &Receiver<SourceEvent> {
        &self.events
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.raise();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn spawn_source(source: Box<dyn LandmarkSource>) -> SourceHandle {
    let (tx, events) = bounded(EVENT_QUEUE_DEPTH);
    let stop = Arc::new(StopSignal::default());
    let name = source.describe();
    let sink = EventSink {
        tx,
        stop: stop.clone(),
    };

    let thread_name = name.clone();
    let handle = thread::spawn(move || {
        log::info!("starting landmark source {thread_name}");
        match source.run(&sink) {
            Ok(()) => {
                log::info!("landmark source {thread_name} finished");
                sink.deliver(SourceEvent::Stopped);
            }
            Err(_) if sink.stopped() => {
                log::info!("landmark source {thread_name} stopped");
            }
            Err(err) => {
                log::error!("landmark source {thread_name} failed: {err}");
                let err = match err {
                    SourceError::Unavailable(_) => err,
                    other => SourceError::Unavailable(other.to_string()),
                };
                sink.deliver(SourceEvent::Unavailable(err));
            }
        }
    });

    SourceHandle {
        name,
        events,
        stop,
        handle: Some(handle),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WirePoint {
    x: f32,
    y: f32,
}

/// One JSON line from the tracker or a recording.
#[derive(Debug, Deserialize)]
pub(crate) struct WireFrame {
    #[serde(default)]
    pub t_ms: Option<u64>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    hands: Vec<Vec<WirePoint>>,
    #[serde(default)]
    error: Option<String>,
}

impl WireFrame {
    pub fn parse(line: &str) -> Result<Self, SourceError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Hands without exactly 21 points are dropped; extra hands beyond
    /// `max_hands` are ignored.
    pub fn into_frame(
        self,
        max_hands: usize,
        timestamp: Instant,
    ) -> Result<LandmarkFrame, SourceError> {
        if let Some(err) = self.error {
            return Err(SourceError::Frame(err));
        }

        let frame_size = match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(FrameSize::new(w, h)),
            _ => None,
        };

        let hands = self
            .hands
            .into_iter()
            .filter_map(|points| {
                let points: Vec<Landmark> =
                    points.iter().map(|p| Landmark::new(p.x, p.y)).collect();
                let hand = HandLandmarks::from_points(&points);
                if hand.is_none() {
                    log::warn!("dropping hand with {} landmarks", points.len());
                }
                hand
            })
            .take(max_hands)
            .collect();

        Ok(LandmarkFrame {
            frame_size,
            hands,
            timestamp,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn hand_json(x: f32, y: f32) -> String {
        let points: Vec<String> = (0..21)
            .map(|_| format!("{{\"x\":{x},\"y\":{y},\"z\":0.0}}"))
            .collect();
        format!("[{}]", points.join(","))
    }

    #[test]
    fn parses_tracker_line() {
        let line = format!(
            "{{\"width\":640,\"height\":480,\"hands\":[{},{}]}}",
            hand_json(0.25, 0.5),
            hand_json(0.75, 0.5)
        );
        let frame = WireFrame::parse(&line)
            .unwrap()
            .into_frame(2, Instant::now())
            .unwrap();
        assert_eq!(frame.frame_size, Some(FrameSize::new(640, 480)));
        assert_eq!(frame.hands.len(), 2);
        assert_eq!(frame.hands[1].index_tip(), Landmark::new(0.75, 0.5));
    }

    #[test]
    fn max_hands_limits_output() {
        let line = format!(
            "{{\"width\":640,\"height\":480,\"hands\":[{},{}]}}",
            hand_json(0.25, 0.5),
            hand_json(0.75, 0.5)
        );
        let frame = WireFrame::parse(&line)
            .unwrap()
            .into_frame(1, Instant::now())
            .unwrap();
        assert_eq!(frame.hands.len(), 1);
    }

    #[test]
    fn short_hands_are_dropped() {
        let line = r#"{"width":640,"height":480,"hands":[[{"x":0.1,"y":0.2}]]}"#;
        let frame = WireFrame::parse(line)
            .unwrap()
            .into_frame(2, Instant::now())
            .unwrap();
        assert!(frame.hands.is_empty());
    }

    #[test]
    fn missing_size_is_not_an_error() {
        let frame = WireFrame::parse(r#"{"hands":[]}"#)
            .unwrap()
            .into_frame(2, Instant::now())
            .unwrap();
        assert_eq!(frame.frame_size, None);
    }

    #[test]
    fn reported_error_becomes_frame_fault() {
        let err = WireFrame::parse(r#"{"error":"inference failed"}"#)
            .unwrap()
            .into_frame(2, Instant::now())
            .unwrap_err();
        assert!(matches!(err, SourceError::Frame(ref msg) if msg == "inference failed"));
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        assert!(matches!(
            WireFrame::parse("not json"),
            Err(SourceError::Protocol(_))
        ));
    }

    fn empty_frame(frame_size: Option<FrameSize>) -> LandmarkFrame {
        LandmarkFrame {
            frame_size,
            hands: Vec::new(),
            timestamp: Instant::now(),
        }
    }

    struct Scripted(Vec<LandmarkFrame>);

    impl LandmarkSource for Scripted {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        fn run(self: Box<Self>, events: &EventSink) -> Result<(), SourceError> {
            for frame in self.0 {
                if !events.deliver(SourceEvent::Frame(frame)) {
                    break;
                }
            }
            Ok(())
        }
    }

    struct Broken;

    impl LandmarkSource for Broken {
        fn describe(&self) -> String {
            "broken".to_string()
        }

        fn run(self: Box<Self>, _events: &EventSink) -> Result<(), SourceError> {
            Err(SourceError::Unavailable("permission denied".into()))
        }
    }

    #[test]
    fn spawned_source_delivers_frames_then_stops() {
        let frames = (0..3)
            .map(|_| empty_frame(Some(FrameSize::new(640, 480))))
            .collect();
        let handle = spawn_source(Box::new(Scripted(frames)));
        let received: Vec<_> = handle.events().iter().take(4).collect();
        assert!(matches!(received[0], SourceEvent::Frame(_)));
        assert!(matches!(received[2], SourceEvent::Frame(_)));
        assert!(matches!(received[3], SourceEvent::Stopped));
        handle.stop();
    }

    #[test]
    fn failing_source_reports_unavailable() {
        let handle = spawn_source(Box::new(Broken));
        let event = handle.events().recv().unwrap();
        assert!(matches!(
            event,
            SourceEvent::Unavailable(SourceError::Unavailable(ref msg)) if msg == "permission denied"
        ));
    }

    #[test]
    fn stopping_unblocks_a_waiting_source() {
        let frames = (0..10)
            .map(|_| empty_frame(None))
            .collect();
        let handle = spawn_source(Box::new(Scripted(frames)));
        // Nobody drains the queue; stop must still join.
        handle.stop();
    }

    struct Blocked(Arc<AtomicBool>);

    impl LandmarkSource for Blocked {
        fn describe(&self) -> String {
            "blocked".to_string()
        }

        fn run(self: Box<Self>, events: &EventSink) -> Result<(), SourceError> {
            let (release_tx, release_rx) = bounded::<()>(1);
            let hook_ran = self.0.clone();
            events.on_stop(move || {
                hook_ran.store(true, Ordering::SeqCst);
                let _ = release_tx.send(());
            });
            // Stands in for a read that only the hook can interrupt.
            let _ = release_rx.recv();
            Ok(())
        }
    }

    #[test]
    fn stop_hooks_unblock_the_source_before_joining() {
        let hook_ran = Arc::new(AtomicBool::new(false));
        let handle = spawn_source(Box::new(Blocked(hook_ran.clone())));
        thread::sleep(Duration::from_millis(50));
        handle.stop();
        assert!(hook_ran.load(Ordering::SeqCst));
    }

    #[test]
    fn hooks_registered_after_stop_run_immediately() {
        let signal = StopSignal::default();
        signal.raise();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        signal.register(Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
    }
}

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use super::source::{EventSink, LandmarkSource, SourceError, SourceEvent, WireFrame};

const PACE_STEP: Duration = Duration::from_millis(50);

/// Plays back a recorded session: one JSON frame per line, with `t_ms`
/// giving the frame's offset from the start of the recording.
///
/// Every frame is delivered (no dropping) and stamped with
/// `start + t_ms`, so debounce timing matches the recording even when the
/// consumer lags behind.
pub struct ReplaySource {
    path: PathBuf,
    max_hands: usize,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>, max_hands: usize) -> Self {
        Self {
            path: path.into(),
            max_hands,
        }
    }
}

impl LandmarkSource for ReplaySource {
    fn describe(&self) -> String {
        format!("replay {}", self.path.display())
    }

    fn run(self: Box<Self>, events: &EventSink) -> Result<(), SourceError> {
        let file = File::open(&self.path).map_err(|err| {
            SourceError::Unavailable(format!("cannot open {}: {err}", self.path.display()))
        })?;
        let reader = BufReader::new(file);
        let start = Instant::now();
        let mut last_offset = Duration::ZERO;

        for (line_no, line) in reader.split(b'\n').enumerate() {
            let line = line?;
            let parsed = match std::str::from_utf8(&line) {
                Ok(text) if text.trim().is_empty() => continue,
                Ok(text) => WireFrame::parse(text.trim()),
                Err(err) => Err(SourceError::Frame(format!("line is not UTF-8: {err}"))),
            };

            let event = match parsed {
                Ok(wire) => {
                    let offset = wire.t_ms.map(Duration::from_millis).unwrap_or(last_offset);
                    last_offset = offset;
                    while let Some(wait) = (start + offset).checked_duration_since(Instant::now()) {
                        if events.stopped() {
                            return Ok(());
                        }
                        thread::sleep(wait.min(PACE_STEP));
                    }
                    match wire.into_frame(self.max_hands, start + offset) {
                        Ok(frame) => SourceEvent::Frame(frame),
                        Err(err) => SourceEvent::Fault(err),
                    }
                }
                Err(err) => {
                    log::warn!("{}:{}: {err}", self.path.display(), line_no + 1);
                    SourceEvent::Fault(err)
                }
            };

            if !events.deliver(event) {
                break;
            }
        }

        Ok(())
    }
}

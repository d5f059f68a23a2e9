use std::{
    io::{BufRead, BufReader},
    process::{Child, Command, Stdio},
    sync::{Arc, Mutex},
    time::Instant,
};

use super::source::{EventSink, LandmarkSource, SourceError, SourceEvent, SourceSettings, WireFrame};

const READY_SIGNAL: &str = "READY";

/// Runs an external hand tracker (for example a MediaPipe script) and reads
/// one JSON frame per line from its stdout.
///
/// The process is started with the tracking options as flags:
/// `--max-hands`, `--min-detection-confidence`, `--min-tracking-confidence`
/// and `--model-complexity`. It must print `READY` once the camera and model
/// are up, then one line per processed frame.
pub struct TrackerProcess {
    program: String,
    args: Vec<String>,
    settings: SourceSettings,
}

impl TrackerProcess {
    pub fn new(program: impl Into<String>, args: Vec<String>, settings: SourceSettings) -> Self {
        Self {
            program: program.into(),
            args,
            settings,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--max-hands")
            .arg(self.settings.max_hands.to_string())
            .arg("--min-detection-confidence")
            .arg(self.settings.min_detection_confidence.to_string())
            .arg("--min-tracking-confidence")
            .arg(self.settings.min_tracking_confidence.to_string())
            .arg("--model-complexity")
            .arg(self.settings.model_complexity.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        command
    }
}

/// Shared with the stop hook so a stop can kill a child that is not
/// printing anything; the blocked read then sees EOF.
#[derive(Clone)]
struct SharedChild(Arc<Mutex<Child>>);

impl SharedChild {
    fn kill(&self) {
        if let Ok(mut child) = self.0.lock() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn exit_status(&self) -> Option<std::process::ExitStatus> {
        self.0.lock().ok()?.try_wait().ok().flatten()
    }
}

/// Kills the child when the reading loop ends for any reason.
struct ChildGuard(SharedChild);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.0.kill();
    }
}

/// Reads one `\n`-terminated line as raw bytes. `Ok(None)` at EOF.
fn read_raw_line(reader: &mut impl BufRead, buf: &mut Vec<u8>) -> Result<Option<()>, SourceError> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(()))
}

impl LandmarkSource for TrackerProcess {
    fn describe(&self) -> String {
        format!("tracker `{}`", self.program)
    }

    fn run(self: Box<Self>, events: &EventSink) -> Result<(), SourceError> {
        let mut child = self.command().spawn().map_err(|err| {
            SourceError::Unavailable(format!("failed to start {}: {err}", self.program))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Unavailable("tracker stdout not captured".to_string()))?;
        let child = SharedChild(Arc::new(Mutex::new(child)));
        let _guard = ChildGuard(child.clone());
        let killer = child.clone();
        events.on_stop(move || killer.kill());
        let mut reader = BufReader::new(stdout);

        let mut buf = Vec::new();
        read_raw_line(&mut reader, &mut buf)?;
        let first = String::from_utf8_lossy(&buf);
        if first.trim() != READY_SIGNAL {
            return Err(SourceError::Unavailable(format!(
                "tracker did not signal ready, got {:?}",
                first.trim()
            )));
        }
        log::info!("hand tracker {} ready", self.program);

        loop {
            if read_raw_line(&mut reader, &mut buf)?.is_none() {
                if !events.stopped() {
                    log::warn!(
                        "hand tracker closed its output (status {:?})",
                        child.exit_status()
                    );
                }
                return Ok(());
            }
            if events.stopped() {
                return Ok(());
            }

            let frame = match std::str::from_utf8(&buf) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => WireFrame::parse(line.trim())
                    .and_then(|wire| wire.into_frame(self.settings.max_hands, Instant::now())),
                Err(err) => Err(SourceError::Frame(format!("tracker line is not UTF-8: {err}"))),
            };
            let delivered = match frame {
                Ok(frame) => events.offer(frame),
                Err(err) => {
                    log::warn!("tracker frame failed: {err}");
                    events.deliver(SourceEvent::Fault(err))
                }
            };
            if !delivered {
                return Ok(());
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::source::{spawn_source, tests::hand_json};

    fn shell(script: String) -> TrackerProcess {
        // `sh -c script` ignores the trailing tracking flags as positional args.
        TrackerProcess::new(
            "sh",
            vec!["-c".to_string(), script, "tracker".to_string()],
            SourceSettings::default(),
        )
    }

    #[test]
    fn reads_frames_after_ready() {
        let frame = format!(
            "{{\"width\":640,\"height\":480,\"hands\":[{}]}}",
            hand_json(0.3, 0.4)
        );
        let script = format!("echo READY; echo '{frame}'; echo '{{\"error\":\"blurred\"}}'");
        let handle = spawn_source(Box::new(shell(script)));

        let events: Vec<_> = handle.events().iter().take(3).collect();
        match &events[0] {
            SourceEvent::Frame(frame) => assert_eq!(frame.hands.len(), 1),
            other => panic!("expected frame, got {other:?}"),
        }
        assert!(matches!(events[1], SourceEvent::Fault(SourceError::Frame(_))));
        assert!(matches!(events[2], SourceEvent::Stopped));
    }

    #[test]
    fn non_utf8_line_is_a_fault_and_reading_continues() {
        let frame = format!(
            "{{\"width\":640,\"height\":480,\"hands\":[{}]}}",
            hand_json(0.3, 0.4)
        );
        let script = format!("echo READY; printf '\\377\\n'; echo '{frame}'");
        let handle = spawn_source(Box::new(shell(script)));

        let events: Vec<_> = handle.events().iter().take(3).collect();
        assert!(matches!(events[0], SourceEvent::Fault(SourceError::Frame(_))));
        match &events[1] {
            SourceEvent::Frame(frame) => assert_eq!(frame.hands.len(), 1),
            other => panic!("expected frame, got {other:?}"),
        }
        assert!(matches!(events[2], SourceEvent::Stopped));
    }

    #[test]
    fn stop_kills_a_silent_tracker() {
        // `exec` so the killed child is the process holding the pipe.
        let handle = spawn_source(Box::new(shell("echo READY; exec sleep 6".to_string())));
        std::thread::sleep(Duration::from_millis(300));

        let started = Instant::now();
        handle.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn stop_before_ready_does_not_wait_for_the_tracker() {
        let handle = spawn_source(Box::new(shell("exec sleep 6".to_string())));
        std::thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        handle.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn missing_ready_is_unavailable() {
        let handle = spawn_source(Box::new(shell("echo 'no camera'".to_string())));
        let event = handle.events().recv().unwrap();
        assert!(matches!(event, SourceEvent::Unavailable(_)));
    }

    #[test]
    fn missing_program_is_unavailable() {
        let tracker = TrackerProcess::new(
            "/nonexistent/air-keys-tracker",
            Vec::new(),
            SourceSettings::default(),
        );
        let handle = spawn_source(Box::new(tracker));
        let event = handle.events().recv().unwrap();
        assert!(matches!(
            event,
            SourceEvent::Unavailable(SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn flags_carry_settings() {
        let tracker = TrackerProcess::new(
            "tracker",
            vec!["--camera".to_string(), "0".to_string()],
            SourceSettings {
                max_hands: 1,
                ..SourceSettings::default()
            },
        );
        let command = tracker.command();
        let args: Vec<_> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(&args[..4], &["--camera", "0", "--max-hands", "1"]);
        assert!(args.contains(&"--model-complexity".to_string()));
    }
}

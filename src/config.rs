use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow, bail};

use crate::{
    keyboard::SessionConfig,
    pipeline::{LandmarkSource, ReplaySource, SourceSettings, TrackerProcess},
};

const DEFAULT_TRACKER_PROGRAM: &str = "python3";
const DEFAULT_TRACKER_SCRIPT: &str = "hand_tracker.py";
const DEFAULT_EXPORT_DIR: &str = "exports";
const DEFAULT_CANVAS: (u32, u32) = (1280, 720);

#[derive(Clone, Debug, PartialEq)]
pub enum SourceKind {
    Tracker { program: String, args: Vec<String> },
    Replay { path: PathBuf },
}

impl SourceKind {
    /// Splits a command line on whitespace; no shell quoting is applied.
    pub fn tracker(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("tracker command is empty"))?;
        Ok(SourceKind::Tracker {
            program,
            args: parts.collect(),
        })
    }

    pub fn build(&self, settings: &SourceSettings) -> Box<dyn LandmarkSource> {
        match self {
            SourceKind::Tracker { program, args } => Box::new(TrackerProcess::new(
                program.clone(),
                args.clone(),
                settings.clone(),
            )),
            SourceKind::Replay { path } => {
                Box::new(ReplaySource::new(path.clone(), settings.max_hands))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub source: SourceKind,
    pub settings: SourceSettings,
    pub session: SessionConfig,
    pub export_dir: PathBuf,
    pub canvas: (u32, u32),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Tracker {
                program: DEFAULT_TRACKER_PROGRAM.to_string(),
                args: vec![DEFAULT_TRACKER_SCRIPT.to_string()],
            },
            settings: SourceSettings::default(),
            session: SessionConfig::default(),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            canvas: DEFAULT_CANVAS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(path) = lookup("AIR_KEYS_REPLAY").filter(|v| !v.trim().is_empty()) {
            config.source = SourceKind::Replay {
                path: PathBuf::from(path.trim()),
            };
        } else if let Some(command) = lookup("AIR_KEYS_TRACKER") {
            config.source =
                SourceKind::tracker(&command).context("invalid AIR_KEYS_TRACKER")?;
        }

        if let Some(max_hands) = parse_var::<usize, _>(&lookup, "AIR_KEYS_MAX_HANDS")? {
            if !(1..=2).contains(&max_hands) {
                bail!("AIR_KEYS_MAX_HANDS must be 1 or 2, got {max_hands}");
            }
            config.settings.max_hands = max_hands;
        }
        if let Some(value) = parse_var::<f32, _>(&lookup, "AIR_KEYS_DETECTION_CONFIDENCE")? {
            config.settings.min_detection_confidence =
                check_confidence("AIR_KEYS_DETECTION_CONFIDENCE", value)?;
        }
        if let Some(value) = parse_var::<f32, _>(&lookup, "AIR_KEYS_TRACKING_CONFIDENCE")? {
            config.settings.min_tracking_confidence =
                check_confidence("AIR_KEYS_TRACKING_CONFIDENCE", value)?;
        }
        if let Some(level) = parse_var::<u8, _>(&lookup, "AIR_KEYS_MODEL_COMPLEXITY")? {
            if level > 2 {
                bail!("AIR_KEYS_MODEL_COMPLEXITY must be 0, 1 or 2, got {level}");
            }
            config.settings.model_complexity = level;
        }

        if let Some(ms) = parse_var::<u64, _>(&lookup, "AIR_KEYS_DEBOUNCE_MS")? {
            config.session.debounce = Duration::from_millis(ms);
        }
        if let Some(margin) = parse_var::<f32, _>(&lookup, "AIR_KEYS_HIT_MARGIN")? {
            if !(margin >= 0.0 && margin.is_finite()) {
                bail!("AIR_KEYS_HIT_MARGIN must be a non-negative number, got {margin}");
            }
            config.session.hit_margin = margin;
        }
        if let Some(frames) = parse_var::<u32, _>(&lookup, "AIR_KEYS_HOLD_FRAMES")? {
            if frames == 0 {
                bail!("AIR_KEYS_HOLD_FRAMES must be at least 1");
            }
            config.session.hold_frames = frames;
        }
        if let Some(haptics) = parse_var::<bool, _>(&lookup, "AIR_KEYS_HAPTICS")? {
            config.session.haptics = haptics;
        }

        if let Some(dir) = lookup("AIR_KEYS_EXPORT_DIR").filter(|v| !v.trim().is_empty()) {
            config.export_dir = PathBuf::from(dir.trim());
        }
        if let Some(canvas) = lookup("AIR_KEYS_CANVAS") {
            config.canvas =
                parse_canvas(&canvas).with_context(|| format!("invalid AIR_KEYS_CANVAS {canvas:?}"))?;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid {key} value {raw:?}")),
    }
}

fn check_confidence(key: &str, value: f32) -> Result<f32> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        bail!("{key} must be in (0, 1], got {value}")
    }
}

fn parse_canvas(raw: &str) -> Result<(u32, u32)> {
    let (w, h) = raw
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("expected WIDTHxHEIGHT"))?;
    let width: u32 = w.trim().parse().context("bad width")?;
    let height: u32 = h.trim().parse().context("bad height")?;
    if width == 0 || height == 0 {
        bail!("canvas must not be empty");
    }
    Ok((width, height))
}

pub mod overlay;
pub mod replay;
pub mod source;
pub mod tracker;

// Re-exports for convenience
pub use overlay::OverlayCanvas;
pub use replay::ReplaySource;
pub use source::{LandmarkSource, SourceHandle, SourceSettings, spawn_source};
pub use tracker::TrackerProcess;

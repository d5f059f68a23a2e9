pub mod emitter;
pub mod layout;
pub mod mapper;
pub mod session;
pub mod text;

pub use layout::KeyboardLayout;
pub use session::{
    FrameOutcome, FrameOutput, KeyRenderState, MidlineAssigner, Session, SessionConfig,
};
pub use text::FileExporter;

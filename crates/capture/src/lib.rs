pub mod capture;
pub mod config;
pub mod events;
pub mod parts;
pub mod preview;
pub mod registry;
pub mod task_context;

pub use capture::CaptureSession;
pub use config::CaptureConfig;
pub use events::{
    AssistantTurnEvent, MessagePartEvent, PartToolStatus, SessionLifecycle, SessionUpdate,
    ToolEndEvent, ToolStartEvent, UserMessageEvent,
};

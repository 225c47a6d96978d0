pub mod attribute;
pub mod build;
pub mod export;
pub mod handoff;
pub mod lanes;
pub mod summary;
pub mod view;

mod mirror;

pub use build::build_timeline;
pub use export::{export_records, ExportFormat};
pub use handoff::{infer_handoffs, HandoffLink};
pub use lanes::pack_lanes;
pub use summary::{summarize, TraceSummary};
pub use view::{
    AgentActivityRow, CounterView, RootSessionView, SessionNode, TaskState, TaskView, Timeline,
    TracepointView,
};

//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services orchestrate between repositories and contain domain logic.

pub mod approval;
pub mod error_log;
pub mod orchestrator;
pub mod session;
pub mod stream;

// Re-export for convenience
pub use approval::{ApprovalResolution, ApprovalService};
pub use error_log::ErrorLogService;
pub use orchestrator::{DispatchPolicy, Orchestrator};
pub use session::SessionService;
pub use stream::StreamPublisher;

//! Data Transfer Objects for inter-service communication
//!
//! This module contains DTOs used between the orchestrator, its clients,
//! and the external agent runners. DTOs are lightweight request/response
//! shapes; the records they refer to live in `domain`.

pub mod agent;
pub mod approval;
pub mod error_log;
pub mod pipeline;
pub mod session;

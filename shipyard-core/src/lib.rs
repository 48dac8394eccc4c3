//! Shipyard Core
//!
//! Core types and pure logic for the Shipyard agent pipeline.
//!
//! This crate contains:
//! - Domain types: the pipeline record and its state machine, artifacts,
//!   approval gates, error logs, sessions
//! - Failure classification
//! - Stream events and their text event stream framing
//! - DTOs: Data transfer objects for inter-service communication

pub mod classify;
pub mod domain;
pub mod dto;
pub mod event;

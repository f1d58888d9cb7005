//! Application Layer - Ports and services.
//!
//! This layer defines the REST port implemented by the HTTP adapter and the
//! event types and bus through which the streaming side reports to callers.

/// Port interfaces for external systems.
pub mod ports;

/// Event bus and event types.
pub mod services;

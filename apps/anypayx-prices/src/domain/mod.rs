//! Domain Layer - Core pricing and wire types.
//!
//! Pure data types with serialization support and no I/O.

/// Prices, conversions and conversion requests.
pub mod pricing;

/// Streaming envelope and topic payloads.
pub mod streaming;

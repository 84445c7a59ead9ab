//! Data Transfer Objects for inter-service communication
//!
//! DTOs accepted by the conversion service over the wire.

pub mod pipeline;

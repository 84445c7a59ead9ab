//! Prism Core
//!
//! Core types shared by the Prism conversion service and its clients.
//!
//! This crate contains:
//! - Domain types: image geometry, thumbnails, run reports
//! - DTOs: the pipeline run request accepted by the conversion service
//! - Errors: request validation failures

pub mod domain;
pub mod dto;
pub mod error;

pub use error::{FieldError, ValidationError};

//! # moira-core
//!
//! Core types and utilities for working with the Moira directory service.
//!
//! This crate provides foundational types, error handling and wire constants
//! shared by Moira client integrations.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and the crate-wide result alias
//! - [`status`] - Protocol constants, request opcodes and server status codes
//! - [`types`] - List member references and member kinds
//! - [`args`] - Positional query argument builder
//! - [`row`] - Schema-driven decoding of query rows

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod args;
pub mod error;
pub mod row;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::{MemberKind, MemberRef};

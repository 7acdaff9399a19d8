//! Convenience builder for positional query arguments.
//!
//! Query arguments are plain strings whose meaning is fixed by their position.
//! This module converts typed values into their wire representation.

use std::fmt::Display;

use crate::types::MemberRef;

/// Builder for assembling positional query arguments.
#[derive(Debug, Default, Clone)]
pub struct QueryArgs {
    args: Vec<String>,
}

impl QueryArgs {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { args: Vec::new() }
    }

    /// Append a value using its display form.
    #[must_use]
    pub fn push<T>(mut self, value: T) -> Self
    where
        T: Display,
    {
        self.args.push(value.to_string());
        self
    }

    /// Append a boolean as `1` / `0`.
    #[must_use]
    pub fn push_bool(mut self, value: bool) -> Self {
        self.args.push(bool_to_wire(value).to_string());
        self
    }

    /// Append a member as its kind token followed by its name.
    #[must_use]
    pub fn push_member(mut self, member: &MemberRef) -> Self {
        self.args.extend(member.to_args());
        self
    }

    /// Return the collected arguments.
    #[must_use]
    pub fn into_args(self) -> Vec<String> {
        self.args
    }
}

/// Wire representation of a boolean value.
#[must_use]
pub const fn bool_to_wire(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

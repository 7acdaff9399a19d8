//! Core Moira domain types.
//!
//! A [`MemberRef`] names a principal that can appear on a list. Identity is the
//! `(kind, name)` pair; the optional tag is metadata carried alongside it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Kinds of principals that may appear on a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberKind {
    /// A user account
    User,
    /// A Kerberos principal
    Kerberos,
    /// A list, which may itself contain members
    List,
    /// A free-form string, usually an email address
    String,
    /// A machine
    Machine,
    /// The placeholder used for empty ACL slots
    None,
}

impl MemberKind {
    /// Returns the wire token for the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Kerberos => "KERBEROS",
            Self::List => "LIST",
            Self::String => "STRING",
            Self::Machine => "MACHINE",
            Self::None => "NONE",
        }
    }

    /// Returns all kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::User,
            Self::Kerberos,
            Self::List,
            Self::String,
            Self::Machine,
            Self::None,
        ]
    }

    /// Human-readable label for the kind.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Kerberos => "Kerberos principal",
            Self::List => "list",
            Self::String => "string/email address",
            Self::Machine => "machine",
            Self::None => "(none)",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::User(format!("invalid list member type: {s}")))
    }
}

/// Reference to a principal, keyed by kind and name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRef {
    kind: MemberKind,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
}

impl MemberRef {
    /// Creates an untagged member reference.
    #[must_use]
    pub fn new(kind: MemberKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            tag: None,
        }
    }

    /// Shorthand for a list reference.
    #[must_use]
    pub fn list(name: impl Into<String>) -> Self {
        Self::new(MemberKind::List, name)
    }

    /// Shorthand for a user reference.
    #[must_use]
    pub fn user(name: impl Into<String>) -> Self {
        Self::new(MemberKind::User, name)
    }

    /// Attaches a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Builds a member from a `type, name[, tag]` query row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::User`] if the row has the wrong arity or an unknown kind.
    pub fn from_row<S: AsRef<str>>(row: &[S]) -> Result<Self> {
        match row {
            [kind, name] => Ok(Self::new(kind.as_ref().parse()?, name.as_ref())),
            [kind, name, tag] => {
                Ok(Self::new(kind.as_ref().parse()?, name.as_ref()).with_tag(tag.as_ref()))
            }
            _ => Err(Error::User(format!(
                "list member row must have a type-name[-tag] format, got {} fields",
                row.len()
            ))),
        }
    }

    /// Kind of the referenced principal.
    #[must_use]
    pub const fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Name of the referenced principal.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag attached to the membership, if any.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Returns true for list references.
    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self.kind, MemberKind::List)
    }

    /// Kind token and name, as sent in positional query arguments.
    #[must_use]
    pub fn to_args(&self) -> [String; 2] {
        [self.kind.as_str().to_string(), self.name.clone()]
    }
}

impl PartialEq for MemberRef {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name
    }
}

impl Eq for MemberRef {}

impl Hash for MemberRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for MemberRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemberRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Parses the `kind:name` form (kind is case-insensitive).
impl FromStr for MemberRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| Error::User(format!("member `{s}` is not in kind:name form")))?;
        if name.is_empty() {
            return Err(Error::User(format!("member `{s}` has an empty name")));
        }
        Ok(Self::new(kind.parse()?, name))
    }
}

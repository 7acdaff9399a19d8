//! List (group) representations.

use moira_core::row::{FieldKind, RowSchema};
use moira_core::{MemberRef, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A list together with its explicit members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// List name.
    pub name: String,
    /// Members listed directly on the list.
    #[serde(default)]
    pub members: BTreeSet<MemberRef>,
}

impl Group {
    /// Creates a new builder with the required fields.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> GroupBuilder {
        GroupBuilder {
            name: name.into(),
            members: BTreeSet::new(),
        }
    }

    /// Returns the list as a member reference.
    #[must_use]
    pub fn as_member(&self) -> MemberRef {
        MemberRef::list(self.name.clone())
    }

    /// Returns the number of explicit members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Checks whether the given member is listed directly.
    #[must_use]
    pub fn has_member(&self, member: &MemberRef) -> bool {
        self.members.contains(member)
    }

    /// Names of the lists nested directly inside this one.
    pub fn nested_lists(&self) -> impl Iterator<Item = &str> + '_ {
        self.members
            .iter()
            .filter(|member| member.is_list())
            .map(MemberRef::name)
    }
}

/// Builder for [`Group`].
#[derive(Debug)]
pub struct GroupBuilder {
    name: String,
    members: BTreeSet<MemberRef>,
}

impl GroupBuilder {
    /// Adds a member.
    #[must_use]
    pub fn add_member(mut self, member: MemberRef) -> Self {
        self.members.insert(member);
        self
    }

    /// Adds multiple members.
    #[must_use]
    pub fn members<I>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = MemberRef>,
    {
        self.members.extend(members);
        self
    }

    /// Builds the [`Group`].
    #[must_use]
    pub fn build(self) -> Group {
        Group {
            name: self.name,
            members: self.members,
        }
    }
}

/// Field order of a `get_lists_of_member` row.
pub const LIST_SUMMARY_SCHEMA: RowSchema = RowSchema::new(&[
    ("name", FieldKind::Str),
    ("active", FieldKind::Bool),
    ("public", FieldKind::Bool),
    ("hidden", FieldKind::Bool),
    ("is_mailing", FieldKind::Bool),
    ("is_afsgroup", FieldKind::Bool),
]);

/// Summary of a list a member belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSummary {
    /// List name
    pub name: String,
    /// Whether the list is active
    pub active: bool,
    /// Whether anyone may add or remove themselves
    pub public: bool,
    /// Whether the list is hidden
    pub hidden: bool,
    /// Whether the list is a mailing list
    pub is_mailing: bool,
    /// Whether the list is an AFS group
    pub is_afsgroup: bool,
}

impl ListSummary {
    /// Decodes a `get_lists_of_member` row.
    ///
    /// # Errors
    ///
    /// Returns [`moira_core::Error::User`] if the row does not match
    /// [`LIST_SUMMARY_SCHEMA`].
    pub fn from_row<S: AsRef<str>>(row: &[S]) -> Result<Self> {
        let decoded = LIST_SUMMARY_SCHEMA.decode(row)?;
        Ok(Self {
            name: decoded.str("name")?.to_string(),
            active: decoded.bool("active")?,
            public: decoded.bool("public")?,
            hidden: decoded.bool("hidden")?,
            is_mailing: decoded.bool("is_mailing")?,
            is_afsgroup: decoded.bool("is_afsgroup")?,
        })
    }
}

//! Recursive list expansion.
//!
//! The membership graph is kept as a flat name-keyed index rather than a
//! graph of owned nodes. A list name is expanded at most once, which also
//! breaks cycles.

use std::collections::{BTreeMap, BTreeSet};

use moira_core::args::QueryArgs;
use moira_core::status::{
    DEFAULT_KERBEROS_REALM, DEFAULT_QUERY_VERSION, MAX_LIST_DEPTH, MR_NO_MATCH,
};
use moira_core::{Error, MemberKind, MemberRef};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::group::{Group, ListSummary};
use crate::query::{probe, QueryExecutor};
use crate::Result;

/// Explicit members of a list.
pub const MEMBERS_QUERY: &str = "get_members_of_list";
/// Explicit members of a list, with tags.
pub const TAGGED_MEMBERS_QUERY: &str = "get_tagged_members_of_list";
/// Server-side recursive expansion.
pub const END_MEMBERS_QUERY: &str = "get_end_members_of_list";
/// Lists a member belongs to.
pub const LISTS_OF_MEMBER_QUERY: &str = "get_lists_of_member";
/// Number of explicit members of a list.
pub const COUNT_MEMBERS_QUERY: &str = "count_members_of_list";
/// Objects whose access control names a member.
pub const ACE_USE_QUERY: &str = "get_ace_use";
/// User account lookup by login name.
pub const USER_BY_LOGIN_QUERY: &str = "get_user_account_by_login";
/// List attributes by name.
pub const LIST_INFO_QUERY: &str = "get_list_info";

/// How a list should be expanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandOptions {
    server_side: bool,
    include_lists: bool,
    tags: bool,
}

impl ExpandOptions {
    /// Client-side expansion of leaf members only, without tags.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            server_side: false,
            include_lists: false,
            tags: false,
        }
    }

    /// Delegates the expansion to the server.
    #[must_use]
    pub const fn server_side(mut self, server_side: bool) -> Self {
        self.server_side = server_side;
        self
    }

    /// Keeps nested lists in the resulting member set.
    #[must_use]
    pub const fn include_lists(mut self, include_lists: bool) -> Self {
        self.include_lists = include_lists;
        self
    }

    /// Retrieves membership tags.
    #[must_use]
    pub const fn tags(mut self, tags: bool) -> Self {
        self.tags = tags;
        self
    }
}

/// Outcome of a list expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionResult {
    /// Resolved members (nested lists only when requested).
    pub members: BTreeSet<MemberRef>,
    /// Lists whose membership could not be read for access reasons.
    pub denied: BTreeSet<String>,
    /// Explicit members of every list visited; `None` for denied lists.
    /// Empty for server-side expansion.
    pub known: BTreeMap<String, Option<BTreeSet<MemberRef>>>,
}

/// An object whose access control names a member, as returned by
/// [`ACE_USE_QUERY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnedObject {
    /// Object type token, e.g. `LIST`, `FILESYS` or `MACHINE`.
    pub object_type: String,
    /// Object name.
    pub name: String,
}

impl OwnedObject {
    fn from_row<S: AsRef<str>>(row: &[S]) -> Result<Self> {
        match row {
            [object_type, name] => Ok(Self {
                object_type: object_type.as_ref().to_string(),
                name: name.as_ref().to_string(),
            }),
            _ => Err(Error::User(format!(
                "owned object row must have a type-name format, got {} fields",
                row.len()
            ))),
        }
    }
}

/// Resolves list membership over a [`QueryExecutor`].
pub struct MembershipResolver<'a, Q: QueryExecutor + ?Sized> {
    executor: &'a mut Q,
    version: Option<u32>,
    max_depth: usize,
}

impl<'a, Q: QueryExecutor + ?Sized> MembershipResolver<'a, Q> {
    /// Creates a resolver with the default query version and depth ceiling.
    pub fn new(executor: &'a mut Q) -> Self {
        Self {
            executor,
            version: Some(DEFAULT_QUERY_VERSION),
            max_depth: MAX_LIST_DEPTH,
        }
    }

    /// Creates a resolver using the configured query version and depth ceiling.
    pub fn with_config(executor: &'a mut Q, config: &ClientConfig) -> Self {
        Self {
            executor,
            version: Some(config.query_version()),
            max_depth: config.max_depth(),
        }
    }

    /// Overrides the query version sent with every query.
    #[must_use]
    pub fn with_version(mut self, version: Option<u32>) -> Self {
        self.version = version;
        self
    }

    /// Overrides the number of expansion waves allowed.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the members listed directly on `group`.
    ///
    /// # Errors
    ///
    /// Propagates server errors, and returns [`Error::User`] for rows that are
    /// not `type, name[, tag]` tuples.
    pub async fn explicit_members(&mut self, group: &str, tags: bool) -> Result<BTreeSet<MemberRef>> {
        let query = if tags { TAGGED_MEMBERS_QUERY } else { MEMBERS_QUERY };
        self.members_via(query, group).await
    }

    /// Loads a list and its explicit members.
    ///
    /// # Errors
    ///
    /// See [`Self::explicit_members`].
    pub async fn load_group(&mut self, name: &str, tags: bool) -> Result<Group> {
        let members = self.explicit_members(name, tags).await?;
        Ok(Group::builder(name).members(members).build())
    }

    /// Expands `group` recursively.
    ///
    /// Client-side expansion skips nested lists the caller may not read and
    /// reports them in [`ExpansionResult::denied`]; a denial on `group` itself
    /// is returned as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::User`] if server-side expansion is combined with tags
    /// or the depth ceiling is exceeded, and propagates every server error
    /// other than a permission denial on a nested list.
    pub async fn expand(&mut self, group: &str, options: ExpandOptions) -> Result<ExpansionResult> {
        if options.server_side {
            return self.expand_on_server(group, options).await;
        }

        let root = self.explicit_members(group, options.tags).await?;
        let mut members = root.clone();
        let mut known = BTreeMap::new();
        known.insert(group.to_string(), Some(root.clone()));
        let mut denied = BTreeSet::new();

        let mut frontier = root;
        let mut depth = 0;
        loop {
            let to_expand: BTreeSet<String> = frontier
                .iter()
                .filter(|member| member.is_list() && !known.contains_key(member.name()))
                .map(|member| member.name().to_string())
                .collect();
            if to_expand.is_empty() {
                break;
            }

            depth += 1;
            if depth > self.max_depth {
                return Err(Error::User(format!(
                    "list expansion depth limit ({}) exceeded",
                    self.max_depth
                )));
            }

            let mut discovered = BTreeSet::new();
            for name in to_expand {
                match self.explicit_members(&name, options.tags).await {
                    Ok(found) => {
                        discovered.extend(found.iter().cloned());
                        known.insert(name, Some(found));
                    }
                    Err(err) if err.is_permission_denied() => {
                        warn!(list = %name, "skipping list with inaccessible membership");
                        denied.insert(name.clone());
                        known.insert(name, None);
                    }
                    Err(err) => return Err(err),
                }
            }

            members.extend(discovered.iter().cloned());
            frontier = discovered;
        }

        if !options.include_lists {
            members.retain(|member| !member.is_list());
        }

        debug!(
            list = group,
            members = members.len(),
            lists = known.len(),
            denied = denied.len(),
            depth,
            "expanded list"
        );
        Ok(ExpansionResult {
            members,
            denied,
            known,
        })
    }

    async fn expand_on_server(&mut self, group: &str, options: ExpandOptions) -> Result<ExpansionResult> {
        if options.tags {
            return Err(Error::User(
                "server-side expansion does not support member tag retrieval".to_string(),
            ));
        }

        let mut members = self.members_via(END_MEMBERS_QUERY, group).await?;
        if !options.include_lists {
            members.retain(|member| !member.is_list());
        }
        Ok(ExpansionResult {
            members,
            ..ExpansionResult::default()
        })
    }

    /// Lists `member` appears on, directly or (when `recursive`) through
    /// nested lists.
    ///
    /// # Errors
    ///
    /// Propagates server errors; rows that do not match the list summary
    /// layout are an [`Error::User`].
    pub async fn memberships_of(&mut self, member: &MemberRef, recursive: bool) -> Result<Vec<ListSummary>> {
        let args = member_args(member, recursive);
        let rows = self
            .executor
            .query(LISTS_OF_MEMBER_QUERY, &args, self.version)
            .await?;
        rows.iter().map(|row| ListSummary::from_row(row)).collect()
    }

    /// Objects whose access control names `member`, directly or (when
    /// `recursive`) through lists `member` belongs to.
    ///
    /// # Errors
    ///
    /// Propagates server errors; rows that are not `type, name` pairs are an
    /// [`Error::User`].
    pub async fn owned_objects(&mut self, member: &MemberRef, recursive: bool) -> Result<Vec<OwnedObject>> {
        let args = member_args(member, recursive);
        let rows = self
            .executor
            .query(ACE_USE_QUERY, &args, self.version)
            .await?;
        rows.iter().map(|row| OwnedObject::from_row(row)).collect()
    }

    /// Checks that a user or list named by `member` exists. Other kinds are
    /// not looked up and always count as existing.
    ///
    /// # Errors
    ///
    /// Transport and framing errors propagate; server statuses other than
    /// "no match" count as existing.
    pub async fn exists(&mut self, member: &MemberRef) -> Result<bool> {
        let query = match member.kind() {
            MemberKind::User => USER_BY_LOGIN_QUERY,
            MemberKind::List => LIST_INFO_QUERY,
            _ => return Ok(true),
        };
        let status = probe(&mut *self.executor, query, &[member.name().to_string()], self.version).await?;
        let exists = status != MR_NO_MATCH;
        debug!(kind = member.kind().label(), name = member.name(), exists, "looked up member");
        Ok(exists)
    }

    /// Works out which member a bare name refers to.
    ///
    /// Tried in order: an explicit `kind:name`, an existing user with a
    /// login-shaped name, an existing list, a `user/instance` principal in
    /// the default realm, and a `user/instance@host` principal. Returns
    /// `None` if nothing fits.
    ///
    /// # Errors
    ///
    /// Propagates errors from the existence checks.
    pub async fn resolve_name(&mut self, name: &str) -> Result<Option<MemberRef>> {
        if let Ok(member) = name.parse::<MemberRef>() {
            if member.kind() != MemberKind::None {
                return Ok(Some(member));
            }
        }

        if is_login(name) {
            let user = MemberRef::user(name);
            if self.exists(&user).await? {
                return Ok(Some(user));
            }
        }

        if !name.is_empty() && !name.chars().any(|c| c.is_ascii_uppercase() || c == '@' || c == ':') {
            let list = MemberRef::list(name);
            if self.exists(&list).await? {
                return Ok(Some(list));
            }
        }

        if let Some((user, instance)) = name.split_once('/') {
            if is_login(user) && is_word(instance) {
                return Ok(Some(MemberRef::new(
                    MemberKind::Kerberos,
                    format!("{name}@{DEFAULT_KERBEROS_REALM}"),
                )));
            }
        }

        if let Some((principal, host)) = name.split_once('@') {
            let principal_ok = principal.split_once('/').is_some_and(|(user, instance)| {
                is_word(&user.to_ascii_lowercase()) && is_word(&instance.to_ascii_lowercase())
            });
            let host_ok = !host.is_empty()
                && host
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
            if principal_ok && host_ok {
                return Ok(Some(MemberRef::new(
                    MemberKind::Kerberos,
                    format!("{principal}@{}", host.to_ascii_uppercase()),
                )));
            }
        }

        Ok(None)
    }

    /// Number of explicit members of `group`.
    ///
    /// # Errors
    ///
    /// Propagates server errors; a malformed count is an [`Error::Protocol`].
    pub async fn count_members(&mut self, group: &str) -> Result<usize> {
        let rows = self
            .executor
            .query(COUNT_MEMBERS_QUERY, &[group.to_string()], self.version)
            .await?;
        rows.first()
            .and_then(|row| row.first())
            .and_then(|count| count.trim().parse().ok())
            .ok_or_else(|| Error::Protocol(format!("malformed member count for list `{group}`")))
    }

    async fn members_via(&mut self, query: &str, group: &str) -> Result<BTreeSet<MemberRef>> {
        let rows = self
            .executor
            .query(query, &[group.to_string()], self.version)
            .await?;
        rows.iter().map(|row| MemberRef::from_row(row)).collect()
    }
}

/// Kind and name arguments for member lookups; recursive lookups prefix the
/// kind token with `R`.
fn member_args(member: &MemberRef, recursive: bool) -> Vec<String> {
    if recursive {
        QueryArgs::new()
            .push(format!("R{}", member.kind()))
            .push(member.name())
            .into_args()
    } else {
        QueryArgs::new().push_member(member).into_args()
    }
}

/// Lowercase letters, digits and underscores only.
fn is_word(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Shape of a login name: a word of 3 to 8 characters.
fn is_login(s: &str) -> bool {
    (3..=8).contains(&s.len()) && is_word(s)
}

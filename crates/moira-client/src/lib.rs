//! Client for the Moira directory service.
//!
//! This crate speaks the Moira wire protocol over TCP, negotiates query
//! versions and authentication, and resolves list membership on top of
//! the named query interface.
//!
//! ```no_run
//! use moira_client::{ClientConfig, Connection, ExpandOptions, MembershipResolver};
//!
//! # async fn run() -> moira_client::Result<()> {
//! let config = ClientConfig::new("moira.example.edu")?;
//! let mut connection = Connection::open(&config).await?;
//! let expansion = MembershipResolver::with_config(&mut connection, &config)
//!     .expand("staff", ExpandOptions::new())
//!     .await?;
//! println!("{} members", expansion.members.len());
//! connection.close().await
//! # }
//! ```

#![deny(missing_docs)]

mod config;
mod connection;
mod group;
pub mod packet;
mod query;
mod resolver;
mod tracer;

#[cfg(test)]
mod test_peer;

pub use config::{ClientConfig, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_MAX_PATHWAYS};
pub use connection::{AuthToken, Connection};
pub use group::{Group, GroupBuilder, ListSummary, LIST_SUMMARY_SCHEMA};
pub use moira_core::{Error, MemberKind, MemberRef};
pub use packet::Packet;
pub use query::{probe, QueryExecutor, Row};
pub use resolver::{
    ExpandOptions, ExpansionResult, MembershipResolver, OwnedObject, ACE_USE_QUERY,
    COUNT_MEMBERS_QUERY, END_MEMBERS_QUERY, LISTS_OF_MEMBER_QUERY, LIST_INFO_QUERY, MEMBERS_QUERY,
    TAGGED_MEMBERS_QUERY, USER_BY_LOGIN_QUERY,
};
pub use tracer::{MembershipTracer, Pathway};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = moira_core::Result<T>;

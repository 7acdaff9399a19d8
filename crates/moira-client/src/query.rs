//! Named query execution.

use async_trait::async_trait;
use moira_core::status::{Opcode, MR_MORE_DATA, MR_SUCCESS};
use moira_core::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::connection::Connection;
use crate::Result;

/// One result row: the fields of a single "more data" packet.
pub type Row = Vec<String>;

/// Executes named queries. Implemented by [`Connection`]; the membership
/// engine only depends on this seam.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryExecutor: Send {
    /// Runs `name` with positional `args`, optionally switching the query
    /// version first, and returns the rows in the order they were received.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] with the terminal status if it is not
    /// success; transport and framing errors propagate unchanged.
    async fn query(&mut self, name: &str, args: &[String], version: Option<u32>)
        -> Result<Vec<Row>>;
}

#[async_trait]
impl<S> QueryExecutor for Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn query(
        &mut self,
        name: &str,
        args: &[String],
        version: Option<u32>,
    ) -> Result<Vec<Row>> {
        if let Some(version) = version {
            self.set_version(version).await?;
        }

        let mut request = Vec::with_capacity(args.len() + 1);
        request.push(name);
        request.extend(args.iter().map(String::as_str));
        self.send_packet(Opcode::Query.code(), &request).await?;

        let mut rows = Vec::new();
        loop {
            let response = self.recv_packet().await?;
            match response.status {
                MR_MORE_DATA => rows.push(response.string_fields()),
                MR_SUCCESS => break,
                status => {
                    debug!(query = name, status, "query failed");
                    return Err(Error::server(status));
                }
            }
        }

        debug!(query = name, rows = rows.len(), "query complete");
        Ok(rows)
    }
}

/// Runs a query and reports its terminal server status instead of failing on
/// it. Returns [`MR_SUCCESS`] when the query succeeds.
///
/// # Errors
///
/// Transport and framing errors still propagate.
pub async fn probe<Q>(executor: &mut Q, name: &str, args: &[String], version: Option<u32>) -> Result<i32>
where
    Q: QueryExecutor + ?Sized,
{
    match executor.query(name, args, version).await {
        Ok(_) => Ok(MR_SUCCESS),
        Err(Error::Server { code, .. }) => Ok(code),
        Err(err) => Err(err),
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Runs a query and reports its terminal status instead of failing on it.
    ///
    /// See [`probe`].
    ///
    /// # Errors
    ///
    /// Transport and framing errors still propagate.
    pub async fn probe(&mut self, name: &str, args: &[String], version: Option<u32>) -> Result<i32> {
        probe(self, name, args, version).await
    }
}

//! Session bootstrap and packet transport.
//!
//! A [`Connection`] is strictly request/response: every request must have its
//! full response consumed before the next one is sent. It holds no internal
//! locking, so sharing one between tasks requires external serialization.

use std::fmt;

use moira_core::status::{
    Opcode, MR_MORE_DATA, MR_SUCCESS, MR_VERSION_LOW, SESSION_CHALLENGE, SESSION_RESPONSE,
};
use moira_core::Error;
use secrecy::{ExposeSecret, SecretSlice};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::packet::{self, Packet, HEADER_LEN, MAX_PACKET_LEN};
use crate::Result;

/// Opaque, pre-built authentication token from an external credential source.
pub struct AuthToken(SecretSlice<u8>);

impl AuthToken {
    /// Wraps raw token bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(SecretSlice::from(bytes.into()))
    }

    fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

/// An established session with a Moira server.
pub struct Connection<S = TcpStream> {
    stream: S,
    version: Option<u32>,
    authenticated: bool,
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("version", &self.version)
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}

impl Connection<TcpStream> {
    /// Connects to the configured server, performs the session handshake and
    /// negotiates the configured query version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the TCP connect does not finish in time,
    /// [`Error::Connection`] on transport or handshake failure, and
    /// [`Error::Unavailable`] if the server posts an outage notice.
    pub async fn open(config: &ClientConfig) -> Result<Self> {
        let address = config.address();
        let stream = timeout(config.connection_timeout(), TcpStream::connect(&address))
            .await
            .map_err(|_| Error::Timeout(format!("connecting to {address} timed out")))?
            .map_err(|err| Error::Connection(format!("failed to connect to {address}: {err}")))?;
        info!(%address, "connected to Moira server");

        let mut connection = Self::establish(stream).await?;
        connection.set_version(config.query_version()).await?;
        Ok(connection)
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Runs the challenge/response exchange and the outage check over an
    /// already-open byte stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the server's reply to the challenge is
    /// not the expected byte sequence, [`Error::Unavailable`] if an outage
    /// notice is posted, and [`Error::Protocol`] for any other outage status.
    pub async fn establish(stream: S) -> Result<Self> {
        let mut connection = Self {
            stream,
            version: None,
            authenticated: false,
        };
        connection.challenge().await?;
        connection.check_outage().await?;
        Ok(connection)
    }

    async fn challenge(&mut self) -> Result<()> {
        self.write_all(SESSION_CHALLENGE).await?;
        let mut response = vec![0u8; SESSION_RESPONSE.len()];
        self.read_exact(&mut response).await?;
        if response != SESSION_RESPONSE {
            return Err(Error::Connection(
                "server failed to return the correct response to connection initiation"
                    .to_string(),
            ));
        }
        Ok(())
    }

    async fn check_outage(&mut self) -> Result<()> {
        self.send_packet::<&str>(Opcode::Motd.code(), &[]).await?;
        let mut response = self.recv_packet().await?;
        if response.status == MR_SUCCESS {
            return Ok(());
        }
        if response.status != MR_MORE_DATA {
            return Err(unexpected_outage_status(response.status));
        }

        let mut notice = String::new();
        while response.status == MR_MORE_DATA {
            if let Some(fragment) = response.string_fields().first() {
                notice.push_str(fragment);
            }
            response = self.recv_packet().await?;
        }
        if response.status != MR_SUCCESS {
            return Err(unexpected_outage_status(response.status));
        }

        warn!(%notice, "Moira server posted an outage notice");
        Err(Error::Unavailable(format!(
            "Moira server is currently unavailable: {notice}"
        )))
    }

    /// Negotiates the query version, skipping the round trip when `version`
    /// is already active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for any status other than success or
    /// "version too low".
    pub async fn set_version(&mut self, version: u32) -> Result<()> {
        if self.version == Some(version) {
            return Ok(());
        }

        self.send_packet(Opcode::SetVersion.code(), &[version.to_string()])
            .await?;
        let response = self.recv_packet().await?;
        match response.status {
            MR_SUCCESS => {}
            MR_VERSION_LOW => warn!(version, "server reports client query version as too low"),
            status => {
                return Err(Error::Protocol(format!(
                    "server rejected query version {version} with status {status}"
                )))
            }
        }

        info!(version, "query version set");
        self.version = Some(version);
        Ok(())
    }

    /// Authenticates the session with a pre-built token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] carrying the server status if the server
    /// does not answer with success.
    pub async fn authenticate(&mut self, token: &AuthToken, client_identity: &str) -> Result<()> {
        self.send_packet(
            Opcode::Krb5Auth.code(),
            &[token.expose(), client_identity.as_bytes()],
        )
        .await?;
        let response = self.recv_packet().await?;
        if response.status != MR_SUCCESS {
            return Err(Error::Protocol(format!(
                "authentication rejected with status {}: {}",
                response.status,
                Error::server(response.status)
            )));
        }

        info!(client = client_identity, "authenticated to Moira server");
        self.authenticated = true;
        Ok(())
    }

    /// Sends one request frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the write fails.
    pub async fn send_packet<F>(&mut self, opcode: i32, fields: &[F]) -> Result<()>
    where
        F: AsRef<[u8]> + Sync,
    {
        let frame = packet::encode(opcode, fields)?;
        debug!(opcode, fields = fields.len(), length = frame.len(), "sending packet");
        self.write_all(&frame).await
    }

    /// Receives one complete response frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the stream ends before the frame is
    /// complete or declares a length below the header size, and
    /// [`Error::Protocol`] if the frame does not decode.
    pub async fn recv_packet(&mut self) -> Result<Packet> {
        let mut prefix = [0u8; 4];
        self.read_exact(&mut prefix).await?;
        let length = u32::from_be_bytes(prefix) as usize;
        if length < HEADER_LEN {
            return Err(Error::Connection(format!(
                "invalid packet length {length} specified"
            )));
        }
        if length > MAX_PACKET_LEN {
            return Err(Error::Protocol(format!(
                "packet length {length} exceeds the {MAX_PACKET_LEN} byte limit"
            )));
        }

        let mut frame = vec![0u8; length];
        frame[..4].copy_from_slice(&prefix);
        self.read_exact(&mut frame[4..]).await?;

        let packet = packet::decode(&frame)?;
        debug!(
            status = packet.status,
            fields = packet.fields.len(),
            length,
            "received packet"
        );
        Ok(packet)
    }

    /// Shuts the stream down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the shutdown fails.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.stream.read_exact(buf).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::Connection(
                "connection was closed while more data was expected".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }
}

fn unexpected_outage_status(status: i32) -> Error {
    Error::Protocol(format!("unexpected outage check status {status}"))
}

impl<S> Connection<S> {
    /// Currently negotiated query version.
    #[must_use]
    pub const fn negotiated_version(&self) -> Option<u32> {
        self.version
    }

    /// Whether the session has authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

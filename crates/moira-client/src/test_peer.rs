//! Scripted in-memory server used by unit tests.

use moira_core::status::{MR_SUCCESS, SESSION_CHALLENGE, SESSION_RESPONSE};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use crate::connection::Connection;
use crate::packet::{self, Packet};

/// A response frame: status and fields.
pub(crate) type Reply = (i32, Vec<String>);

pub(crate) fn reply(status: i32, fields: &[&str]) -> Reply {
    (status, fields.iter().map(|f| (*f).to_string()).collect())
}

pub(crate) async fn read_frame(stream: &mut DuplexStream) -> Option<Packet> {
    let mut prefix = [0u8; 4];
    stream.read_exact(&mut prefix).await.ok()?;
    let length = u32::from_be_bytes(prefix) as usize;
    let mut frame = vec![0u8; length];
    frame[..4].copy_from_slice(&prefix);
    stream.read_exact(&mut frame[4..]).await.ok()?;
    Some(packet::decode(&frame).expect("client sent a malformed frame"))
}

pub(crate) async fn write_replies(stream: &mut DuplexStream, replies: &[Reply]) {
    for (status, fields) in replies {
        let frame = packet::encode(*status, fields).unwrap();
        stream.write_all(&frame).await.unwrap();
    }
}

/// Spawns a peer that answers the challenge, then answers every request with
/// the frames produced by `handler`. The outage check is answered with a bare
/// success unless the handler says otherwise. The task resolves to every
/// request it saw once the client hangs up.
pub(crate) fn spawn_peer<H>(mut handler: H) -> (DuplexStream, JoinHandle<Vec<Packet>>)
where
    H: FnMut(&Packet) -> Vec<Reply> + Send + 'static,
{
    let (client, mut server) = duplex(64 * 1024);
    let task = tokio::spawn(async move {
        let mut challenge = vec![0u8; SESSION_CHALLENGE.len()];
        server.read_exact(&mut challenge).await.unwrap();
        assert_eq!(challenge, SESSION_CHALLENGE);
        server.write_all(SESSION_RESPONSE).await.unwrap();

        let mut seen = Vec::new();
        while let Some(request) = read_frame(&mut server).await {
            let replies = handler(&request);
            write_replies(&mut server, &replies).await;
            seen.push(request);
        }
        seen
    });
    (client, task)
}

/// Handler that answers every request with a bare success.
pub(crate) fn always_ok(_: &Packet) -> Vec<Reply> {
    vec![reply(MR_SUCCESS, &[])]
}

/// Establishes a connection against a peer driven by `handler`.
pub(crate) async fn connect<H>(handler: H) -> (Connection<DuplexStream>, JoinHandle<Vec<Packet>>)
where
    H: FnMut(&Packet) -> Vec<Reply> + Send + 'static,
{
    let (stream, task) = spawn_peer(handler);
    let connection = Connection::establish(stream).await.unwrap();
    (connection, task)
}

//! In-process fake of a Moira server holding a small list graph.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use moira_client::packet::{self, Packet};
use moira_core::status::{
    Opcode, MR_ARGS, MR_MORE_DATA, MR_NO_MATCH, MR_PERM, MR_SUCCESS, SESSION_CHALLENGE,
    SESSION_RESPONSE,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Directory contents served by [`FakeMoira`].
#[derive(Debug, Clone, Default)]
pub struct FakeMoira {
    lists: HashMap<String, Vec<(String, String)>>,
    forbidden: HashSet<String>,
    outage: Vec<String>,
}

impl FakeMoira {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a list with `(kind, name)` members.
    pub fn list(mut self, name: &str, members: &[(&str, &str)]) -> Self {
        self.lists.insert(
            name.to_string(),
            members
                .iter()
                .map(|(kind, member)| ((*kind).to_string(), (*member).to_string()))
                .collect(),
        );
        self
    }

    /// Makes `name` answer membership queries with a permission error.
    pub fn forbid(mut self, name: &str) -> Self {
        self.forbidden.insert(name.to_string());
        self
    }

    /// Posts an outage notice split into `fragments`.
    pub fn outage(mut self, fragments: &[&str]) -> Self {
        self.outage = fragments.iter().map(|f| (*f).to_string()).collect();
        self
    }

    /// Serves one client over a TCP listener on localhost.
    pub async fn listen(self) -> (u16, JoinHandle<Vec<Packet>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            self.serve(stream).await
        });
        (port, task)
    }

    /// Serves one client over `stream` until it hangs up, returning every
    /// request received after the handshake.
    pub async fn serve<S>(&self, mut stream: S) -> Vec<Packet>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut challenge = vec![0u8; SESSION_CHALLENGE.len()];
        stream.read_exact(&mut challenge).await.unwrap();
        assert_eq!(challenge, SESSION_CHALLENGE);
        stream.write_all(SESSION_RESPONSE).await.unwrap();

        let mut seen = Vec::new();
        while let Some(request) = read_frame(&mut stream).await {
            for (status, fields) in self.respond(&request) {
                let frame = packet::encode(status, &fields).unwrap();
                stream.write_all(&frame).await.unwrap();
            }
            seen.push(request);
        }
        seen
    }

    fn respond(&self, request: &Packet) -> Vec<(i32, Vec<String>)> {
        let fields = request.string_fields();
        match request.status {
            code if code == Opcode::Motd.code() => {
                let mut replies: Vec<_> = self
                    .outage
                    .iter()
                    .map(|fragment| (MR_MORE_DATA, vec![fragment.clone()]))
                    .collect();
                replies.push((MR_SUCCESS, Vec::new()));
                replies
            }
            code if code == Opcode::Query.code() => self.query(&fields),
            _ => vec![(MR_SUCCESS, Vec::new())],
        }
    }

    fn query(&self, fields: &[String]) -> Vec<(i32, Vec<String>)> {
        let [name, list] = fields else {
            return vec![(MR_ARGS, Vec::new())];
        };
        if self.forbidden.contains(list) {
            return vec![(MR_PERM, Vec::new())];
        }
        let Some(members) = self.lists.get(list) else {
            return vec![(MR_NO_MATCH, Vec::new())];
        };

        let mut replies: Vec<_> = match name.as_str() {
            "get_members_of_list" => members
                .iter()
                .map(|(kind, member)| (MR_MORE_DATA, vec![kind.clone(), member.clone()]))
                .collect(),
            "count_members_of_list" => vec![(MR_MORE_DATA, vec![members.len().to_string()])],
            "get_list_info" => vec![(MR_MORE_DATA, vec![list.clone()])],
            _ => return vec![(MR_NO_MATCH, Vec::new())],
        };
        replies.push((MR_SUCCESS, Vec::new()));
        replies
    }
}

async fn read_frame<S>(stream: &mut S) -> Option<Packet>
where
    S: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    stream.read_exact(&mut prefix).await.ok()?;
    let length = u32::from_be_bytes(prefix) as usize;
    let mut frame = vec![0u8; length];
    frame[..4].copy_from_slice(&prefix);
    stream.read_exact(&mut frame[4..]).await.ok()?;
    Some(packet::decode(&frame).unwrap())
}

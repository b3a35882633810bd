//! Per-client connection: framed read/dispatch loop plus a single writer task.
//!
//! Reader: opcode byte -> route lookup -> read the rest of the fixed frame ->
//! decode + handle. Writer: drains the session's outbound queue onto the
//! socket, so all writes to one connection are serialized no matter how many
//! tasks are sending to it.

use std::io;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::handshake;
use super::play;
use super::protocol::{
    ClientIdentification, CodecError, CustomBlockSupportLevel, ExtEntry, ExtInfo, Message, Packet,
    PlayerTeleport, SetBlockClient,
};
use super::session::Session;
use crate::server::Server;

/// A peer that does not accept a frame within this long is dropped.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest client → server frame (identification).
const MAX_INBOUND_FRAME: usize = ClientIdentification::SIZE;

// ── Inbound routing ─────────────────────────────────────────────────────

/// A client → server packet and the handler it is routed to.
trait Inbound: Packet {
    fn handle(self, session: &Arc<Session>);
}

impl Inbound for ClientIdentification {
    fn handle(self, session: &Arc<Session>) {
        handshake::handle_identification(session, self);
    }
}

impl Inbound for ExtInfo {
    fn handle(self, session: &Arc<Session>) {
        handshake::handle_ext_info(session, self);
    }
}

impl Inbound for ExtEntry {
    fn handle(self, session: &Arc<Session>) {
        handshake::handle_ext_entry(session, self);
    }
}

impl Inbound for CustomBlockSupportLevel {
    fn handle(self, session: &Arc<Session>) {
        handshake::handle_custom_block_support_level(session, self);
    }
}

impl Inbound for SetBlockClient {
    fn handle(self, session: &Arc<Session>) {
        play::handle_set_block(session, self);
    }
}

impl Inbound for PlayerTeleport {
    fn handle(self, session: &Arc<Session>) {
        play::handle_player_teleport(session, self);
    }
}

impl Inbound for Message {
    fn handle(self, session: &Arc<Session>) {
        play::handle_message(session, self);
    }
}

type Dispatch = fn(&Arc<Session>, &[u8]) -> Result<(), CodecError>;

#[derive(Clone, Copy)]
struct Route {
    size: usize,
    dispatch: Dispatch,
}

fn dispatch<P: Inbound>(session: &Arc<Session>, frame: &[u8]) -> Result<(), CodecError> {
    P::decode(frame).map(|packet| packet.handle(session))
}

fn register<P: Inbound>(table: &mut [Option<Route>; 256]) {
    table[P::OPCODE as usize] = Some(Route {
        size: P::SIZE,
        dispatch: dispatch::<P>,
    });
}

/// Opcode → (frame size, decode + handle).
static ROUTES: LazyLock<[Option<Route>; 256]> = LazyLock::new(|| {
    let mut table = [None; 256];
    register::<ClientIdentification>(&mut table);
    register::<SetBlockClient>(&mut table);
    register::<PlayerTeleport>(&mut table);
    register::<Message>(&mut table);
    register::<ExtInfo>(&mut table);
    register::<ExtEntry>(&mut table);
    register::<CustomBlockSupportLevel>(&mut table);
    table
});

// ── Connection lifecycle ────────────────────────────────────────────────

/// Serve one client until it disconnects.
pub async fn handle(stream: TcpStream, server: Arc<Server>) -> Result<()> {
    let addr = stream.peer_addr()?;
    stream.set_nodelay(true)?;
    let (mut read, write) = stream.into_split();

    let (tx, rx) = mpsc::channel(server.config.outbound_queue);
    let session = Session::new(server, addr, tx);
    let writer = tokio::spawn(write_loop(write, rx, Arc::clone(&session)));

    let result = read_loop(&mut read, &session).await;
    session.disconnect();
    let _ = writer.await;
    result
}

async fn read_loop<R>(read: &mut R, session: &Arc<Session>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; MAX_INBOUND_FRAME];
    loop {
        let opcode = tokio::select! {
            _ = session.closed().cancelled() => return Ok(()),
            result = read.read_u8() => match result {
                Ok(op) => op,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e).context("reading opcode"),
            },
        };

        let Some(route) = ROUTES[opcode as usize] else {
            // Without a known size the rest of the stream cannot be framed.
            tracing::warn!("{} sent unknown opcode 0x{:02x}", session, opcode);
            session.kick("Unknown packet!");
            return Err(CodecError::UnknownOpcode(opcode).into());
        };

        buf[0] = opcode;
        let frame = &mut buf[..route.size];
        tokio::select! {
            _ = session.closed().cancelled() => return Ok(()),
            result = read.read_exact(&mut frame[1..]) => match result {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e).context("reading frame body"),
            },
        }

        session.server().metrics.packet_received();
        (route.dispatch)(session, frame)?;
    }
}

async fn write_loop<W>(mut write: W, mut rx: mpsc::Receiver<Bytes>, session: Arc<Session>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        match tokio::time::timeout(WRITE_TIMEOUT, write.write_all(&frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!("Write to {} failed: {}", session, e);
                break;
            }
            Err(_) => {
                tracing::warn!("Write to {} timed out", session);
                break;
            }
        }
    }
    session.disconnect();
    let _ = write.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{frame_size, opcode};

    #[test]
    fn routes_cover_exactly_the_client_packets() {
        let routed: Vec<u8> = (0..=255u8)
            .filter(|op| ROUTES[*op as usize].is_some())
            .collect();
        assert_eq!(
            routed,
            vec![
                opcode::IDENTIFICATION,
                opcode::SET_BLOCK_CLIENT,
                opcode::PLAYER_TELEPORT,
                opcode::MESSAGE,
                opcode::EXT_INFO,
                opcode::EXT_ENTRY,
                opcode::CUSTOM_BLOCK_SUPPORT_LEVEL,
            ]
        );
    }

    #[test]
    fn route_sizes_agree_with_the_codec_table() {
        for op in 0..=255u8 {
            if let Some(route) = ROUTES[op as usize] {
                assert_eq!(Some(route.size), frame_size(op), "opcode 0x{:02x}", op);
                assert!(route.size <= MAX_INBOUND_FRAME);
            }
        }
    }
}

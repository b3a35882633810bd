//! End-to-end handshake tests over loopback TCP.
//!
//! Each test starts a real listener on an ephemeral port with a small flat
//! main level and drives it with raw protocol frames.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use classic_server::config::ServerConfig;
use classic_server::extensions::{CUSTOM_BLOCKS, SUPPORTED};
use classic_server::level::Level;
use classic_server::net::listener;
use classic_server::net::protocol::{
    frame_size, opcode, ClientIdentification, CustomBlockSupportLevel, Disconnect, ExtEntry,
    ExtInfo, Message, Packet, ServerIdentification, SpawnPlayer, CPE_CLIENT_TYPE,
    PROTOCOL_VERSION, SELF_ID,
};
use classic_server::server::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

async fn start(config: ServerConfig) -> (Arc<Server>, SocketAddr) {
    let server = Server::new(config);
    server.set_main_level(Arc::new(Level::flat("main", 16, 16, 16)));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener::serve(listener, Arc::clone(&server)));
    (server, addr)
}

async fn send<P: Packet>(stream: &mut TcpStream, packet: &P) {
    stream.write_all(&packet.encode()).await.unwrap();
}

async fn identify(stream: &mut TcpStream, name: &str, version: u8, client_type: u8) {
    send(
        stream,
        &ClientIdentification {
            protocol_version: version,
            name: name.to_string(),
            verification_key: "-".to_string(),
            client_type,
        },
    )
    .await;
}

/// Next whole frame, or `None` once the server closed the connection.
async fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    tokio::time::timeout(READ_TIMEOUT, async {
        let op = stream.read_u8().await.ok()?;
        let size = frame_size(op).expect("server sent a frame of unknown size");
        let mut frame = vec![0u8; size];
        frame[0] = op;
        stream.read_exact(&mut frame[1..]).await.ok()?;
        Some(frame)
    })
    .await
    .expect("timed out waiting for a frame")
}

/// Skip frames until one with `op` arrives.
async fn read_until(stream: &mut TcpStream, op: u8) -> Vec<u8> {
    loop {
        let frame = read_frame(stream)
            .await
            .unwrap_or_else(|| panic!("connection closed before opcode 0x{:02x}", op));
        if frame[0] == op {
            return frame;
        }
    }
}

async fn expect_kick(stream: &mut TcpStream) -> String {
    let frame = read_until(stream, opcode::DISCONNECT).await;
    let reason = Disconnect::decode(&frame).unwrap().reason;
    assert!(read_frame(stream).await.is_none(), "connection stayed open after kick");
    reason
}

#[tokio::test]
async fn vanilla_client_logs_in_and_receives_the_level() {
    let (server, addr) = start(ServerConfig {
        name: "Test Server".into(),
        motd: "hello".into(),
        ..Default::default()
    })
    .await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    identify(&mut client, "Alice", PROTOCOL_VERSION, 0).await;

    let ident = ServerIdentification::decode(&read_frame(&mut client).await.unwrap()).unwrap();
    assert_eq!(ident.protocol_version, PROTOCOL_VERSION);
    assert_eq!(ident.name, "Test Server");
    assert_eq!(ident.motd, "hello");

    let joined = Message::decode(&read_until(&mut client, opcode::MESSAGE).await).unwrap();
    assert_eq!(joined.text, "&eAlice has joined the game!");

    read_until(&mut client, opcode::LEVEL_INITIALIZE).await;
    let finalize = read_until(&mut client, opcode::LEVEL_FINALIZE).await;
    assert_eq!(&finalize[1..], &[0, 16, 0, 16, 0, 16]);

    let me = SpawnPlayer::decode(&read_until(&mut client, opcode::SPAWN_PLAYER).await).unwrap();
    assert_eq!(me.id, SELF_ID);
    assert_eq!(me.name, "Alice");

    assert_eq!(server.admission.count(), 1);
    assert!(server.find_session("alice").is_some());
}

#[tokio::test]
async fn extension_client_with_no_extensions_logs_in() {
    let (_server, addr) = start(ServerConfig::default()).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    identify(&mut client, "Bob", PROTOCOL_VERSION, CPE_CLIENT_TYPE).await;

    let info = ExtInfo::decode(&read_frame(&mut client).await.unwrap()).unwrap();
    assert_eq!(info.extension_count as usize, SUPPORTED.len());
    for ext in SUPPORTED {
        let entry = ExtEntry::decode(&read_frame(&mut client).await.unwrap()).unwrap();
        assert_eq!(entry.name, ext.name);
        assert_eq!(entry.version, ext.version);
    }

    send(
        &mut client,
        &ExtInfo {
            software: "test client".into(),
            extension_count: 0,
        },
    )
    .await;

    let frame = read_frame(&mut client).await.unwrap();
    assert_eq!(frame[0], opcode::IDENTIFICATION);
    read_until(&mut client, opcode::LEVEL_FINALIZE).await;
}

#[tokio::test]
async fn custom_blocks_defers_the_level_until_the_client_replies() {
    let (_server, addr) = start(ServerConfig::default()).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    identify(&mut client, "Carol", PROTOCOL_VERSION, CPE_CLIENT_TYPE).await;
    read_until(&mut client, opcode::EXT_INFO).await;

    send(
        &mut client,
        &ExtInfo {
            software: "test client".into(),
            extension_count: 1,
        },
    )
    .await;
    send(
        &mut client,
        &ExtEntry {
            name: CUSTOM_BLOCKS.into(),
            version: 1,
        },
    )
    .await;

    let support = read_until(&mut client, opcode::CUSTOM_BLOCK_SUPPORT_LEVEL).await;
    assert_eq!(CustomBlockSupportLevel::decode(&support).unwrap().level, 1);
    read_until(&mut client, opcode::IDENTIFICATION).await;
    let joined = Message::decode(&read_until(&mut client, opcode::MESSAGE).await).unwrap();
    assert!(joined.text.contains("Carol has joined"));

    // Nothing level-related until the reply.
    let early = tokio::time::timeout(Duration::from_millis(200), client.read_u8()).await;
    assert!(early.is_err(), "level sent before CustomBlockSupportLevel reply");

    send(&mut client, &CustomBlockSupportLevel { level: 1 }).await;
    read_until(&mut client, opcode::LEVEL_INITIALIZE).await;
    read_until(&mut client, opcode::LEVEL_FINALIZE).await;
}

#[tokio::test]
async fn full_server_rejects_the_next_login() {
    let (server, addr) = start(ServerConfig {
        max_players: 1,
        ..Default::default()
    })
    .await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    identify(&mut first, "First", PROTOCOL_VERSION, 0).await;
    read_until(&mut first, opcode::IDENTIFICATION).await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    identify(&mut second, "Second", PROTOCOL_VERSION, 0).await;
    assert_eq!(expect_kick(&mut second).await, "Server full!");
    assert_eq!(server.admission.count(), 1);
}

#[tokio::test]
async fn wrong_version_is_kicked() {
    let (server, addr) = start(ServerConfig::default()).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    identify(&mut client, "Dave", 6, 0).await;
    assert_eq!(expect_kick(&mut client).await, "Wrong version!");
    assert_eq!(server.admission.count(), 0);
}

#[tokio::test]
async fn invalid_name_is_kicked() {
    let (_server, addr) = start(ServerConfig::default()).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    identify(&mut client, "no spaces!", PROTOCOL_VERSION, 0).await;
    assert_eq!(expect_kick(&mut client).await, "Invalid name!");
}

#[tokio::test]
async fn duplicate_name_is_kicked() {
    let (_server, addr) = start(ServerConfig::default()).await;
    let mut first = TcpStream::connect(addr).await.unwrap();
    identify(&mut first, "Erin", PROTOCOL_VERSION, 0).await;
    read_until(&mut first, opcode::LEVEL_FINALIZE).await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    identify(&mut second, "erin", PROTOCOL_VERSION, 0).await;
    assert_eq!(expect_kick(&mut second).await, "Already logged in!");
}

#[tokio::test]
async fn unknown_opcode_terminates_the_connection() {
    let (_server, addr) = start(ServerConfig::default()).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&[0x50]).await.unwrap();
    assert_eq!(expect_kick(&mut client).await, "Unknown packet!");
}

#[tokio::test]
async fn closing_the_socket_frees_the_slot() {
    let (server, addr) = start(ServerConfig::default()).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    identify(&mut client, "Frank", PROTOCOL_VERSION, 0).await;
    read_until(&mut client, opcode::LEVEL_FINALIZE).await;
    assert_eq!(server.admission.count(), 1);
    drop(client);

    tokio::time::timeout(READ_TIMEOUT, async {
        while server.admission.count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("slot was never released");
    assert!(server.find_session("frank").is_none());
    assert!(server.find_entity("frank").is_none());
}

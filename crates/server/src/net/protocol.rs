//! Classic protocol v7 + CPE wire codec.
//!
//! Every message is one opcode byte followed by a fixed-size body. Multi-byte
//! numbers are big-endian, strings are 64 bytes of ASCII padded with spaces.
//! There is no length prefix, so an opcode missing from [`frame_size`] leaves
//! the stream unframeable.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use classic_engine::world::block::BlockId;
use classic_engine::world::position::Location;
use thiserror::Error;

pub const PROTOCOL_VERSION: u8 = 0x07;
/// Client-type byte in the identification packet announcing CPE support.
pub const CPE_CLIENT_TYPE: u8 = 0x42;
pub const USER_TYPE_NORMAL: u8 = 0x00;
pub const USER_TYPE_OP: u8 = 0x64;
/// Wire id meaning "the receiving client's own entity".
pub const SELF_ID: u8 = 0xff;
pub const STRING_LEN: usize = 64;
pub const CHUNK_LEN: usize = 1024;

/// Set-block modes sent by the client.
pub const MODE_DESTROY: u8 = 0x00;
pub const MODE_CREATE: u8 = 0x01;

pub mod opcode {
    pub const IDENTIFICATION: u8 = 0x00;
    pub const PING: u8 = 0x01;
    pub const LEVEL_INITIALIZE: u8 = 0x02;
    pub const LEVEL_DATA_CHUNK: u8 = 0x03;
    pub const LEVEL_FINALIZE: u8 = 0x04;
    pub const SET_BLOCK_CLIENT: u8 = 0x05;
    pub const SET_BLOCK: u8 = 0x06;
    pub const SPAWN_PLAYER: u8 = 0x07;
    pub const PLAYER_TELEPORT: u8 = 0x08;
    pub const POSITION_ORIENTATION_UPDATE: u8 = 0x09;
    pub const POSITION_UPDATE: u8 = 0x0a;
    pub const ORIENTATION_UPDATE: u8 = 0x0b;
    pub const DESPAWN_PLAYER: u8 = 0x0c;
    pub const MESSAGE: u8 = 0x0d;
    pub const DISCONNECT: u8 = 0x0e;
    pub const UPDATE_USER_TYPE: u8 = 0x0f;
    pub const EXT_INFO: u8 = 0x10;
    pub const EXT_ENTRY: u8 = 0x11;
    pub const SET_CLICK_DISTANCE: u8 = 0x12;
    pub const CUSTOM_BLOCK_SUPPORT_LEVEL: u8 = 0x13;
    pub const EXT_ADD_PLAYER_NAME: u8 = 0x16;
    pub const EXT_REMOVE_PLAYER_NAME: u8 = 0x18;
    pub const CHANGE_MODEL: u8 = 0x1d;
    pub const ENV_SET_MAP_APPEARANCE: u8 = 0x1e;
    pub const ENV_SET_WEATHER_TYPE: u8 = 0x1f;
    pub const EXT_ADD_ENTITY2: u8 = 0x21;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("opcode 0x{opcode:02x}: expected a {expected}-byte frame, got {actual}")]
    FrameSize {
        opcode: u8,
        expected: usize,
        actual: usize,
    },
    #[error("expected opcode 0x{expected:02x}, got 0x{actual:02x}")]
    WrongOpcode { expected: u8, actual: u8 },
}

/// A fixed-layout protocol message.
pub trait Packet: Sized {
    const OPCODE: u8;
    /// Full frame size, opcode byte included.
    const SIZE: usize;

    fn write_body(&self, buf: &mut BytesMut);

    /// Read the body. The caller guarantees exactly `SIZE - 1` bytes.
    fn read_body(buf: &mut &[u8]) -> Self;

    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u8(Self::OPCODE);
        self.write_body(&mut buf);
        debug_assert_eq!(buf.len(), Self::SIZE, "opcode 0x{:02x}", Self::OPCODE);
        buf.freeze()
    }

    fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        if frame.len() != Self::SIZE {
            return Err(CodecError::FrameSize {
                opcode: frame.first().copied().unwrap_or(Self::OPCODE),
                expected: Self::SIZE,
                actual: frame.len(),
            });
        }
        if frame[0] != Self::OPCODE {
            return Err(CodecError::WrongOpcode {
                expected: Self::OPCODE,
                actual: frame[0],
            });
        }
        let mut body = &frame[1..];
        Ok(Self::read_body(&mut body))
    }
}

/// Opcode → full frame size for every message this codec knows.
const FRAME_SIZES: &[(u8, usize)] = &[
    (ClientIdentification::OPCODE, ClientIdentification::SIZE),
    (Ping::OPCODE, Ping::SIZE),
    (LevelInitialize::OPCODE, LevelInitialize::SIZE),
    (LevelDataChunk::OPCODE, LevelDataChunk::SIZE),
    (LevelFinalize::OPCODE, LevelFinalize::SIZE),
    (SetBlockClient::OPCODE, SetBlockClient::SIZE),
    (SetBlock::OPCODE, SetBlock::SIZE),
    (SpawnPlayer::OPCODE, SpawnPlayer::SIZE),
    (PlayerTeleport::OPCODE, PlayerTeleport::SIZE),
    (PositionOrientationUpdate::OPCODE, PositionOrientationUpdate::SIZE),
    (PositionUpdate::OPCODE, PositionUpdate::SIZE),
    (OrientationUpdate::OPCODE, OrientationUpdate::SIZE),
    (DespawnPlayer::OPCODE, DespawnPlayer::SIZE),
    (Message::OPCODE, Message::SIZE),
    (Disconnect::OPCODE, Disconnect::SIZE),
    (UpdateUserType::OPCODE, UpdateUserType::SIZE),
    (ExtInfo::OPCODE, ExtInfo::SIZE),
    (ExtEntry::OPCODE, ExtEntry::SIZE),
    (SetClickDistance::OPCODE, SetClickDistance::SIZE),
    (CustomBlockSupportLevel::OPCODE, CustomBlockSupportLevel::SIZE),
    (ExtAddPlayerName::OPCODE, ExtAddPlayerName::SIZE),
    (ExtRemovePlayerName::OPCODE, ExtRemovePlayerName::SIZE),
    (ChangeModel::OPCODE, ChangeModel::SIZE),
    (EnvSetMapAppearance::OPCODE, EnvSetMapAppearance::SIZE),
    (EnvSetWeatherType::OPCODE, EnvSetWeatherType::SIZE),
    (ExtAddEntity2::OPCODE, ExtAddEntity2::SIZE),
];

/// Full frame size for an opcode, or `None` if the opcode is unknown.
pub fn frame_size(opcode: u8) -> Option<usize> {
    FRAME_SIZES
        .iter()
        .find(|(op, _)| *op == opcode)
        .map(|(_, size)| *size)
}

// ── Field helpers ───────────────────────────────────────────────────────

/// Write a fixed-width string: truncated to 64 bytes, padded with spaces.
/// Non-ASCII characters become `?`.
pub fn put_string(buf: &mut BytesMut, s: &str) {
    let mut written = 0;
    for c in s.chars().take(STRING_LEN) {
        buf.put_u8(if c.is_ascii() { c as u8 } else { b'?' });
        written += 1;
    }
    buf.put_bytes(b' ', STRING_LEN - written);
}

/// Read a fixed-width string and trim trailing spaces.
pub fn get_string(buf: &mut &[u8]) -> String {
    let mut raw = [0u8; STRING_LEN];
    buf.copy_to_slice(&mut raw);
    let end = raw.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    raw[..end].iter().map(|&b| b as char).collect()
}

/// World units → 1/32 fixed point (saturating).
pub fn to_fixed(value: f64) -> i16 {
    (value * 32.0) as i16
}

pub fn from_fixed(value: i16) -> f64 {
    value as f64 / 32.0
}

/// Degrees → byte fraction of a full turn.
pub fn to_angle(degrees: f64) -> u8 {
    ((degrees * 256.0 / 360.0) as i64).rem_euclid(256) as u8
}

pub fn from_angle(angle: u8) -> f64 {
    angle as f64 * 360.0 / 256.0
}

/// Per-axis displacement → signed 1/32 delta.
pub fn to_delta(delta: f64) -> i8 {
    (delta * 32.0) as i8
}

/// An absolute pose as transmitted: fixed-point position plus angle bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WirePose {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub yaw: u8,
    pub pitch: u8,
}

impl WirePose {
    pub fn from_location(location: &Location) -> Self {
        Self {
            x: to_fixed(location.x),
            y: to_fixed(location.y),
            z: to_fixed(location.z),
            yaw: to_angle(location.yaw),
            pitch: to_angle(location.pitch),
        }
    }

    pub fn to_location(self) -> Location {
        Location::new(
            from_fixed(self.x),
            from_fixed(self.y),
            from_fixed(self.z),
            from_angle(self.yaw),
            from_angle(self.pitch),
        )
    }

    fn write(&self, buf: &mut BytesMut) {
        buf.put_i16(self.x);
        buf.put_i16(self.y);
        buf.put_i16(self.z);
        buf.put_u8(self.yaw);
        buf.put_u8(self.pitch);
    }

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            x: buf.get_i16(),
            y: buf.get_i16(),
            z: buf.get_i16(),
            yaw: buf.get_u8(),
            pitch: buf.get_u8(),
        }
    }
}

// ── Handshake ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentification {
    pub protocol_version: u8,
    pub name: String,
    pub verification_key: String,
    pub client_type: u8,
}

impl Packet for ClientIdentification {
    const OPCODE: u8 = opcode::IDENTIFICATION;
    const SIZE: usize = 131;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.protocol_version);
        put_string(buf, &self.name);
        put_string(buf, &self.verification_key);
        buf.put_u8(self.client_type);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            protocol_version: buf.get_u8(),
            name: get_string(buf),
            verification_key: get_string(buf),
            client_type: buf.get_u8(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentification {
    pub protocol_version: u8,
    pub name: String,
    pub motd: String,
    pub user_type: u8,
}

impl Packet for ServerIdentification {
    const OPCODE: u8 = opcode::IDENTIFICATION;
    const SIZE: usize = 131;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.protocol_version);
        put_string(buf, &self.name);
        put_string(buf, &self.motd);
        buf.put_u8(self.user_type);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            protocol_version: buf.get_u8(),
            name: get_string(buf),
            motd: get_string(buf),
            user_type: buf.get_u8(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ping;

impl Packet for Ping {
    const OPCODE: u8 = opcode::PING;
    const SIZE: usize = 1;

    fn write_body(&self, _buf: &mut BytesMut) {}

    fn read_body(_buf: &mut &[u8]) -> Self {
        Ping
    }
}

// ── Level transfer ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelInitialize;

impl Packet for LevelInitialize {
    const OPCODE: u8 = opcode::LEVEL_INITIALIZE;
    const SIZE: usize = 1;

    fn write_body(&self, _buf: &mut BytesMut) {}

    fn read_body(_buf: &mut &[u8]) -> Self {
        LevelInitialize
    }
}

/// One slice of the gzip-compressed level. `data` holds at most 1024 bytes
/// and is zero-padded on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelDataChunk {
    pub data: Bytes,
    pub percent: u8,
}

impl Packet for LevelDataChunk {
    const OPCODE: u8 = opcode::LEVEL_DATA_CHUNK;
    const SIZE: usize = 1 + 2 + CHUNK_LEN + 1;

    fn write_body(&self, buf: &mut BytesMut) {
        let len = self.data.len().min(CHUNK_LEN);
        buf.put_i16(len as i16);
        buf.put_slice(&self.data[..len]);
        buf.put_bytes(0, CHUNK_LEN - len);
        buf.put_u8(self.percent);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        let len = (buf.get_i16().max(0) as usize).min(CHUNK_LEN);
        let mut raw = [0u8; CHUNK_LEN];
        buf.copy_to_slice(&mut raw);
        Self {
            data: Bytes::copy_from_slice(&raw[..len]),
            percent: buf.get_u8(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelFinalize {
    pub width: i16,
    pub height: i16,
    pub depth: i16,
}

impl Packet for LevelFinalize {
    const OPCODE: u8 = opcode::LEVEL_FINALIZE;
    const SIZE: usize = 7;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_i16(self.width);
        buf.put_i16(self.height);
        buf.put_i16(self.depth);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            width: buf.get_i16(),
            height: buf.get_i16(),
            depth: buf.get_i16(),
        }
    }
}

// ── Blocks ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetBlockClient {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub mode: u8,
    pub block: BlockId,
}

impl Packet for SetBlockClient {
    const OPCODE: u8 = opcode::SET_BLOCK_CLIENT;
    const SIZE: usize = 9;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_i16(self.x);
        buf.put_i16(self.y);
        buf.put_i16(self.z);
        buf.put_u8(self.mode);
        buf.put_u8(self.block.0);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            x: buf.get_i16(),
            y: buf.get_i16(),
            z: buf.get_i16(),
            mode: buf.get_u8(),
            block: BlockId(buf.get_u8()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetBlock {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub block: BlockId,
}

impl Packet for SetBlock {
    const OPCODE: u8 = opcode::SET_BLOCK;
    const SIZE: usize = 8;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_i16(self.x);
        buf.put_i16(self.y);
        buf.put_i16(self.z);
        buf.put_u8(self.block.0);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            x: buf.get_i16(),
            y: buf.get_i16(),
            z: buf.get_i16(),
            block: BlockId(buf.get_u8()),
        }
    }
}

// ── Entities ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnPlayer {
    pub id: u8,
    pub name: String,
    pub pose: WirePose,
}

impl Packet for SpawnPlayer {
    const OPCODE: u8 = opcode::SPAWN_PLAYER;
    const SIZE: usize = 74;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.id);
        put_string(buf, &self.name);
        self.pose.write(buf);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            id: buf.get_u8(),
            name: get_string(buf),
            pose: WirePose::read(buf),
        }
    }
}

/// Absolute pose. Client → server it always carries [`SELF_ID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerTeleport {
    pub id: u8,
    pub pose: WirePose,
}

impl Packet for PlayerTeleport {
    const OPCODE: u8 = opcode::PLAYER_TELEPORT;
    const SIZE: usize = 10;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.id);
        self.pose.write(buf);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            id: buf.get_u8(),
            pose: WirePose::read(buf),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOrientationUpdate {
    pub id: u8,
    pub dx: i8,
    pub dy: i8,
    pub dz: i8,
    pub yaw: u8,
    pub pitch: u8,
}

impl Packet for PositionOrientationUpdate {
    const OPCODE: u8 = opcode::POSITION_ORIENTATION_UPDATE;
    const SIZE: usize = 7;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.id);
        buf.put_i8(self.dx);
        buf.put_i8(self.dy);
        buf.put_i8(self.dz);
        buf.put_u8(self.yaw);
        buf.put_u8(self.pitch);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            id: buf.get_u8(),
            dx: buf.get_i8(),
            dy: buf.get_i8(),
            dz: buf.get_i8(),
            yaw: buf.get_u8(),
            pitch: buf.get_u8(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionUpdate {
    pub id: u8,
    pub dx: i8,
    pub dy: i8,
    pub dz: i8,
}

impl Packet for PositionUpdate {
    const OPCODE: u8 = opcode::POSITION_UPDATE;
    const SIZE: usize = 5;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.id);
        buf.put_i8(self.dx);
        buf.put_i8(self.dy);
        buf.put_i8(self.dz);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            id: buf.get_u8(),
            dx: buf.get_i8(),
            dy: buf.get_i8(),
            dz: buf.get_i8(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationUpdate {
    pub id: u8,
    pub yaw: u8,
    pub pitch: u8,
}

impl Packet for OrientationUpdate {
    const OPCODE: u8 = opcode::ORIENTATION_UPDATE;
    const SIZE: usize = 4;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.id);
        buf.put_u8(self.yaw);
        buf.put_u8(self.pitch);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            id: buf.get_u8(),
            yaw: buf.get_u8(),
            pitch: buf.get_u8(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DespawnPlayer {
    pub id: u8,
}

impl Packet for DespawnPlayer {
    const OPCODE: u8 = opcode::DESPAWN_PLAYER;
    const SIZE: usize = 2;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.id);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self { id: buf.get_u8() }
    }
}

// ── Chat & control ──────────────────────────────────────────────────────

/// Chat line. Client → server a non-zero `id` means "more parts follow" when
/// LongerMessages is negotiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u8,
    pub text: String,
}

impl Packet for Message {
    const OPCODE: u8 = opcode::MESSAGE;
    const SIZE: usize = 66;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.id);
        put_string(buf, &self.text);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            id: buf.get_u8(),
            text: get_string(buf),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub reason: String,
}

impl Packet for Disconnect {
    const OPCODE: u8 = opcode::DISCONNECT;
    const SIZE: usize = 65;

    fn write_body(&self, buf: &mut BytesMut) {
        put_string(buf, &self.reason);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            reason: get_string(buf),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateUserType {
    pub user_type: u8,
}

impl Packet for UpdateUserType {
    const OPCODE: u8 = opcode::UPDATE_USER_TYPE;
    const SIZE: usize = 2;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.user_type);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            user_type: buf.get_u8(),
        }
    }
}

// ── Extension negotiation ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtInfo {
    pub software: String,
    pub extension_count: i16,
}

impl Packet for ExtInfo {
    const OPCODE: u8 = opcode::EXT_INFO;
    const SIZE: usize = 67;

    fn write_body(&self, buf: &mut BytesMut) {
        put_string(buf, &self.software);
        buf.put_i16(self.extension_count);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            software: get_string(buf),
            extension_count: buf.get_i16(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtEntry {
    pub name: String,
    pub version: i32,
}

impl Packet for ExtEntry {
    const OPCODE: u8 = opcode::EXT_ENTRY;
    const SIZE: usize = 69;

    fn write_body(&self, buf: &mut BytesMut) {
        put_string(buf, &self.name);
        buf.put_i32(self.version);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            name: get_string(buf),
            version: buf.get_i32(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetClickDistance {
    pub distance: i16,
}

impl Packet for SetClickDistance {
    const OPCODE: u8 = opcode::SET_CLICK_DISTANCE;
    const SIZE: usize = 3;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_i16(self.distance);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            distance: buf.get_i16(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomBlockSupportLevel {
    pub level: u8,
}

impl Packet for CustomBlockSupportLevel {
    const OPCODE: u8 = opcode::CUSTOM_BLOCK_SUPPORT_LEVEL;
    const SIZE: usize = 2;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.level);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            level: buf.get_u8(),
        }
    }
}

// ── CPE entity / environment messages ───────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtAddPlayerName {
    pub id: i16,
    pub player_name: String,
    pub list_name: String,
    pub group_name: String,
    pub group_rank: u8,
}

impl Packet for ExtAddPlayerName {
    const OPCODE: u8 = opcode::EXT_ADD_PLAYER_NAME;
    const SIZE: usize = 196;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_i16(self.id);
        put_string(buf, &self.player_name);
        put_string(buf, &self.list_name);
        put_string(buf, &self.group_name);
        buf.put_u8(self.group_rank);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            id: buf.get_i16(),
            player_name: get_string(buf),
            list_name: get_string(buf),
            group_name: get_string(buf),
            group_rank: buf.get_u8(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtRemovePlayerName {
    pub id: i16,
}

impl Packet for ExtRemovePlayerName {
    const OPCODE: u8 = opcode::EXT_REMOVE_PLAYER_NAME;
    const SIZE: usize = 3;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_i16(self.id);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self { id: buf.get_i16() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeModel {
    pub id: u8,
    pub model: String,
}

impl Packet for ChangeModel {
    const OPCODE: u8 = opcode::CHANGE_MODEL;
    const SIZE: usize = 66;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.id);
        put_string(buf, &self.model);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            id: buf.get_u8(),
            model: get_string(buf),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSetMapAppearance {
    pub texture_url: String,
    pub side_block: BlockId,
    pub edge_block: BlockId,
    pub side_level: i16,
    pub cloud_level: i16,
    pub max_view_distance: i16,
}

impl Packet for EnvSetMapAppearance {
    const OPCODE: u8 = opcode::ENV_SET_MAP_APPEARANCE;
    const SIZE: usize = 73;

    fn write_body(&self, buf: &mut BytesMut) {
        put_string(buf, &self.texture_url);
        buf.put_u8(self.side_block.0);
        buf.put_u8(self.edge_block.0);
        buf.put_i16(self.side_level);
        buf.put_i16(self.cloud_level);
        buf.put_i16(self.max_view_distance);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            texture_url: get_string(buf),
            side_block: BlockId(buf.get_u8()),
            edge_block: BlockId(buf.get_u8()),
            side_level: buf.get_i16(),
            cloud_level: buf.get_i16(),
            max_view_distance: buf.get_i16(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvSetWeatherType {
    pub weather: u8,
}

impl Packet for EnvSetWeatherType {
    const OPCODE: u8 = opcode::ENV_SET_WEATHER_TYPE;
    const SIZE: usize = 2;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.weather);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            weather: buf.get_u8(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtAddEntity2 {
    pub id: u8,
    pub display_name: String,
    pub skin_name: String,
    pub pose: WirePose,
}

impl Packet for ExtAddEntity2 {
    const OPCODE: u8 = opcode::EXT_ADD_ENTITY2;
    const SIZE: usize = 138;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.id);
        put_string(buf, &self.display_name);
        put_string(buf, &self.skin_name);
        self.pose.write(buf);
    }

    fn read_body(buf: &mut &[u8]) -> Self {
        Self {
            id: buf.get_u8(),
            display_name: get_string(buf),
            skin_name: get_string(buf),
            pose: WirePose::read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_opcode_has_no_size() {
        assert_eq!(frame_size(0x14), None);
        assert_eq!(frame_size(0xff), None);
    }

    #[test]
    fn inbound_sizes_match_classic_table() {
        assert_eq!(frame_size(opcode::IDENTIFICATION), Some(131));
        assert_eq!(frame_size(opcode::SET_BLOCK_CLIENT), Some(9));
        assert_eq!(frame_size(opcode::PLAYER_TELEPORT), Some(10));
        assert_eq!(frame_size(opcode::MESSAGE), Some(66));
        assert_eq!(frame_size(opcode::EXT_INFO), Some(67));
        assert_eq!(frame_size(opcode::EXT_ENTRY), Some(69));
        assert_eq!(frame_size(opcode::CUSTOM_BLOCK_SUPPORT_LEVEL), Some(2));
    }

    #[test]
    fn strings_are_space_padded_and_trimmed() {
        let frame = Disconnect {
            reason: "Server full!".into(),
        }
        .encode();
        assert_eq!(frame.len(), Disconnect::SIZE);
        assert_eq!(&frame[1..13], b"Server full!");
        assert!(frame[13..].iter().all(|&b| b == b' '));
        assert_eq!(Disconnect::decode(&frame).unwrap().reason, "Server full!");
    }

    #[test]
    fn long_strings_are_truncated() {
        let text = "x".repeat(100);
        let frame = Message { id: 0, text }.encode();
        assert_eq!(Message::decode(&frame).unwrap().text.len(), STRING_LEN);
    }

    #[test]
    fn identification_decodes_from_raw_bytes() {
        let mut raw = vec![opcode::IDENTIFICATION, PROTOCOL_VERSION];
        let mut name = b"Alice".to_vec();
        name.resize(STRING_LEN, b' ');
        raw.extend_from_slice(&name);
        raw.extend_from_slice(&[b' '; STRING_LEN]);
        raw.push(CPE_CLIENT_TYPE);

        let packet = ClientIdentification::decode(&raw).unwrap();
        assert_eq!(packet.protocol_version, 7);
        assert_eq!(packet.name, "Alice");
        assert_eq!(packet.verification_key, "");
        assert_eq!(packet.client_type, CPE_CLIENT_TYPE);
    }

    #[test]
    fn numbers_are_big_endian() {
        let frame = LevelFinalize {
            width: 256,
            height: 64,
            depth: 1,
        }
        .encode();
        assert_eq!(&frame[..], &[0x04, 0x01, 0x00, 0x00, 0x40, 0x00, 0x01]);
    }

    #[test]
    fn decode_rejects_wrong_size_and_opcode() {
        assert_eq!(
            Ping::decode(&[0x01, 0x00]),
            Err(CodecError::FrameSize {
                opcode: 0x01,
                expected: 1,
                actual: 2
            })
        );
        assert_eq!(
            Ping::decode(&[0x02]),
            Err(CodecError::WrongOpcode {
                expected: 0x01,
                actual: 0x02
            })
        );
    }

    #[test]
    fn level_chunk_is_zero_padded() {
        let frame = LevelDataChunk {
            data: Bytes::from_static(&[9, 9, 9]),
            percent: 50,
        }
        .encode();
        assert_eq!(frame.len(), 1028);
        assert_eq!(&frame[1..3], &[0, 3]);
        assert!(frame[6..1027].iter().all(|&b| b == 0));
        let decoded = LevelDataChunk::decode(&frame).unwrap();
        assert_eq!(&decoded.data[..], &[9, 9, 9]);
        assert_eq!(decoded.percent, 50);
    }

    #[test]
    fn fixed_point_and_angles() {
        assert_eq!(to_fixed(1.5), 48);
        assert_eq!(from_fixed(48), 1.5);
        assert_eq!(to_angle(90.0), 64);
        assert_eq!(to_angle(-90.0), 192);
        assert_eq!(to_angle(360.0), 0);
        assert_eq!(from_angle(128), 180.0);
        assert_eq!(to_delta(-0.5), -16);

        let location = Location::new(10.0, 20.5, 3.25, 180.0, 45.0);
        assert_eq!(WirePose::from_location(&location).to_location(), location);
    }
}

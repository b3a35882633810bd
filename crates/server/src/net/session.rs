//! Per-connection session state and the outbound send path.
//!
//! A session is shared as `Arc<Session>` between its reader task, its writer
//! task, its keep-alive task and every other session that fans packets out to
//! it. Sending never blocks: frames go into a bounded queue drained by the
//! connection's single writer task, and a full queue drops the peer.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};

use bytes::Bytes;
use classic_engine::world::block::BlockId;
use classic_engine::world::position::BlockPos;
use classic_engine::world::{Appearance, Weather};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::block;
use crate::chat;
use crate::entity::{Entity, DEFAULT_MODEL};
use crate::extensions::{
    ExtensionSet, CHANGE_MODEL, CLICK_DISTANCE, ENV_MAP_APPEARANCE, ENV_WEATHER_TYPE,
    EXT_PLAYER_LIST,
};
use crate::level::Level;
use crate::net::protocol::{
    self, ChangeModel, DespawnPlayer, Disconnect, EnvSetMapAppearance, EnvSetWeatherType,
    ExtAddEntity2, ExtAddPlayerName, ExtRemovePlayerName, Message, Packet, PlayerTeleport,
    SetBlock, SetClickDistance, SpawnPlayer, UpdateUserType, WirePose, SELF_ID,
    USER_TYPE_NORMAL, USER_TYPE_OP,
};
use crate::permissions::Permissions;
use crate::server::Server;
use crate::transfer;

/// Lifecycle of a connection. `Disconnected` is terminal and reachable from
/// every other state; all other moves go forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Connected, waiting for the identification packet.
    Identifying = 0,
    /// Extension info sent, collecting the client's extension entries.
    Negotiating = 1,
    /// Admission and registration in progress.
    LoggingIn = 2,
    LoggedIn = 3,
    Disconnected = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Identifying,
            1 => SessionState::Negotiating,
            2 => SessionState::LoggingIn,
            3 => SessionState::LoggedIn,
            _ => SessionState::Disconnected,
        }
    }
}

/// Handshake bookkeeping touched only by the reader task.
#[derive(Debug, Default)]
pub(crate) struct Handshake {
    /// Extension entries still expected; `None` until ExtInfo arrives.
    pub remaining_extensions: Option<i16>,
    /// Joining the main level waits for the CustomBlocks reply.
    pub join_pending: bool,
}

pub struct Session {
    id: u64,
    addr: SocketAddr,
    me: Weak<Session>,
    server: Arc<Server>,
    state: AtomicU8,
    outbound: Mutex<Option<mpsc::Sender<Bytes>>>,
    closed: CancellationToken,
    name: OnceLock<String>,
    entity: OnceLock<Arc<Entity>>,
    pub(crate) handshake: Mutex<Handshake>,
    pub(crate) chat_buffer: Mutex<String>,
    extensions: RwLock<ExtensionSet>,
    custom_block_level: AtomicU8,
    /// f64 bits.
    click_distance: AtomicU64,
    operator: AtomicBool,
    permissions: RwLock<Permissions>,
}

impl Session {
    /// Create a session whose frames are delivered to `outbound`.
    pub fn new(server: Arc<Server>, addr: SocketAddr, outbound: mpsc::Sender<Bytes>) -> Arc<Self> {
        let click_distance = server.config.click_distance;
        Arc::new_cyclic(|me| Self {
            id: server.next_session_id(),
            addr,
            me: me.clone(),
            server,
            state: AtomicU8::new(SessionState::Identifying as u8),
            outbound: Mutex::new(Some(outbound)),
            closed: CancellationToken::new(),
            name: OnceLock::new(),
            entity: OnceLock::new(),
            handshake: Mutex::new(Handshake::default()),
            chat_buffer: Mutex::new(String::new()),
            extensions: RwLock::new(ExtensionSet::default()),
            custom_block_level: AtomicU8::new(0),
            click_distance: AtomicU64::new(click_distance.to_bits()),
            operator: AtomicBool::new(false),
            permissions: RwLock::new(Permissions::default()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    /// Claimed name, empty until identification succeeds.
    pub fn name(&self) -> &str {
        self.name.get().map(String::as_str).unwrap_or("")
    }

    /// Cancelled on disconnect; stops the reader and keep-alive tasks.
    pub fn closed(&self) -> &CancellationToken {
        &self.closed
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == SessionState::LoggedIn
    }

    pub fn is_connected(&self) -> bool {
        self.state() != SessionState::Disconnected
    }

    /// Atomically move `from → to`. Fails if another task got there first.
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record the identity accepted by the handshake. Only the first call wins.
    pub(crate) fn identify(&self, name: String, operator: bool, permissions: Permissions) -> bool {
        if self.name.set(name).is_err() {
            return false;
        }
        self.operator.store(operator, Ordering::Release);
        *self.permissions.write().expect("session permissions poisoned") = permissions;
        true
    }

    pub(crate) fn attach_entity(&self, entity: Arc<Entity>) {
        let _ = self.entity.set(entity);
    }

    pub fn entity(&self) -> Option<&Arc<Entity>> {
        self.entity.get()
    }

    pub fn entity_id(&self) -> Option<u8> {
        self.entity.get().and_then(|e| e.id())
    }

    /// Tear the session down. Safe from any task; only the first call acts.
    pub fn disconnect(&self) {
        let previous = SessionState::from_u8(
            self.state
                .swap(SessionState::Disconnected as u8, Ordering::AcqRel),
        );
        if previous == SessionState::Disconnected {
            return;
        }

        self.closed.cancel();
        // Dropping the sender lets the writer flush what is queued, then close.
        self.outbound
            .lock()
            .expect("session outbound poisoned")
            .take();

        let Some(me) = self.me.upgrade() else {
            return;
        };

        if previous == SessionState::LoggedIn {
            self.server.events.player_quit(&me);
            if let Some(entity) = self.entity() {
                entity.teleport_level(None);
            }
            self.server
                .broadcast_message(&format!("{}{} has left the game!", chat::YELLOW, self.name()));
            self.unregister();
            self.server.admission.release();
            self.server.metrics.player_left();
        }

        self.server.events.client_disconnect(&me);
        tracing::info!("{} disconnected", self);
    }

    /// Remove every trace of this session from levels and directories.
    /// Idempotent; also used when a login races with a disconnect.
    pub(crate) fn unregister(&self) {
        let Some(me) = self.me.upgrade() else {
            return;
        };
        if let Some(entity) = self.entity() {
            entity.teleport_level(None);
        }
        self.server.remove_session(&me);
        if let Some(entity) = self.entity() {
            self.server.remove_entity(entity);
        }
    }

    /// Send a Disconnect packet with `reason`, then disconnect.
    pub fn kick(&self, reason: &str) {
        if !self.is_connected() {
            return;
        }
        tracing::info!("Kicking {}: {}", self, reason);
        self.server.metrics.kicked();
        self.send_packet(&Disconnect {
            reason: reason.to_string(),
        });
        self.disconnect();
    }

    // ── Send path ────────────────────────────────────────────────────────

    pub fn send_packet<P: Packet>(&self, packet: &P) {
        self.send_frame(packet.encode());
    }

    /// Queue an encoded frame. Never blocks; a full or closed queue
    /// disconnects this session.
    pub fn send_frame(&self, frame: Bytes) {
        let len = frame.len();
        let result = {
            let outbound = self.outbound.lock().expect("session outbound poisoned");
            match outbound.as_ref() {
                Some(tx) => tx.try_send(frame),
                None => return,
            }
        };
        match result {
            Ok(()) => self.server.metrics.packet_sent(len),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Outbound queue full for {}, dropping connection", self);
                self.server.metrics.slow_peer_dropped();
                self.disconnect();
            }
            Err(TrySendError::Closed(_)) => self.disconnect(),
        }
    }

    /// Chat text, one packet per line, long lines wrapped.
    pub fn send_message(&self, text: &str) {
        for line in chat::wrap(text) {
            self.send_packet(&Message { id: 0, text: line });
        }
    }

    /// Id to put on the wire for `entity`: [`SELF_ID`] when it is our own.
    fn wire_id(&self, entity: &Entity) -> Option<u8> {
        let id = entity.id()?;
        Some(if Some(id) == self.entity_id() { SELF_ID } else { id })
    }

    /// Block as this client can display it.
    pub fn convert_block(&self, block: BlockId) -> BlockId {
        if block <= block::max_for_level(self.custom_block_level()) {
            block
        } else {
            block::fallback(block)
        }
    }

    pub fn send_spawn(&self, entity: &Entity) {
        if !self.is_logged_in() {
            return;
        }
        let Some(id) = self.wire_id(entity) else {
            return;
        };
        let meta = entity.meta();
        let pose = WirePose::from_location(&entity.location());
        if self.has_extension(EXT_PLAYER_LIST) {
            self.send_packet(&ExtAddEntity2 {
                id,
                display_name: meta.display_name,
                skin_name: meta.skin_name,
                pose,
            });
        } else {
            self.send_packet(&SpawnPlayer {
                id,
                name: meta.display_name,
                pose,
            });
        }
        if meta.model != DEFAULT_MODEL {
            self.send_change_model(entity);
        }
    }

    pub fn send_despawn(&self, entity: &Entity) {
        if !self.is_logged_in() {
            return;
        }
        if let Some(id) = self.wire_id(entity) {
            self.send_packet(&DespawnPlayer { id });
        }
    }

    /// Absolute pose of `entity`.
    pub fn send_teleport(&self, entity: &Entity) {
        if !self.is_logged_in() {
            return;
        }
        if let Some(id) = self.wire_id(entity) {
            self.send_packet(&PlayerTeleport {
                id,
                pose: WirePose::from_location(&entity.location()),
            });
        }
    }

    pub fn send_block_change(&self, pos: BlockPos, block: BlockId) {
        self.send_packet(&SetBlock {
            x: pos.x as i16,
            y: pos.y as i16,
            z: pos.z as i16,
            block: self.convert_block(block),
        });
    }

    pub fn send_level(&self, level: &Level) {
        if self.is_logged_in() {
            transfer::send_level(self, level);
        }
    }

    pub fn send_add_player_list(&self, entity: &Entity) {
        if !self.is_logged_in() || !self.has_extension(EXT_PLAYER_LIST) {
            return;
        }
        let Some(id) = self.wire_id(entity) else {
            return;
        };
        let meta = entity.meta();
        self.send_packet(&ExtAddPlayerName {
            id: id as i16,
            player_name: entity.name().to_string(),
            list_name: meta.list_name,
            group_name: meta.group_name,
            group_rank: meta.group_rank,
        });
    }

    pub fn send_remove_player_list(&self, entity: &Entity) {
        if !self.is_logged_in() || !self.has_extension(EXT_PLAYER_LIST) {
            return;
        }
        if let Some(id) = self.wire_id(entity) {
            self.send_packet(&ExtRemovePlayerName { id: id as i16 });
        }
    }

    pub fn send_change_model(&self, entity: &Entity) {
        if !self.is_logged_in() || !self.has_extension(CHANGE_MODEL) {
            return;
        }
        if let Some(id) = self.wire_id(entity) {
            self.send_packet(&ChangeModel {
                id,
                model: entity.meta().model,
            });
        }
    }

    pub fn send_appearance(&self, appearance: &Appearance) {
        if !self.is_logged_in() || !self.has_extension(ENV_MAP_APPEARANCE) {
            return;
        }
        self.send_packet(&EnvSetMapAppearance {
            texture_url: appearance.texture_url.clone(),
            side_block: self.convert_block(appearance.side_block),
            edge_block: self.convert_block(appearance.edge_block),
            side_level: appearance.side_level,
            cloud_level: appearance.cloud_level,
            max_view_distance: appearance.max_view_distance,
        });
    }

    pub fn send_weather(&self, weather: Weather) {
        if !self.is_logged_in() || !self.has_extension(ENV_WEATHER_TYPE) {
            return;
        }
        self.send_packet(&EnvSetWeatherType {
            weather: weather as u8,
        });
    }

    // ── Capabilities ─────────────────────────────────────────────────────

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions
            .read()
            .expect("session extensions poisoned")
            .has(name)
    }

    /// Record a client extension proposal; unsupported ones are ignored.
    pub(crate) fn accept_extension(&self, name: &str, version: i32) -> bool {
        self.extensions
            .write()
            .expect("session extensions poisoned")
            .accept(name, version)
    }

    pub fn custom_block_level(&self) -> u8 {
        self.custom_block_level.load(Ordering::Acquire)
    }

    pub(crate) fn set_custom_block_level(&self, level: u8) {
        self.custom_block_level.store(level, Ordering::Release);
    }

    pub fn click_distance(&self) -> f64 {
        f64::from_bits(self.click_distance.load(Ordering::Acquire))
    }

    pub fn set_click_distance(&self, distance: f64) {
        self.click_distance
            .store(distance.to_bits(), Ordering::Release);
        if self.is_logged_in() && self.has_extension(CLICK_DISTANCE) {
            self.send_packet(&SetClickDistance {
                distance: protocol::to_fixed(distance),
            });
        }
    }

    pub fn is_operator(&self) -> bool {
        self.operator.load(Ordering::Acquire)
    }

    pub fn set_operator(&self, operator: bool) {
        let was = self.operator.swap(operator, Ordering::AcqRel);
        if was != operator && self.is_logged_in() {
            self.send_packet(&UpdateUserType {
                user_type: user_type(operator),
            });
        }
    }

    pub fn has_permission(&self, path: &str) -> bool {
        self.permissions
            .read()
            .expect("session permissions poisoned")
            .has(path)
    }

    pub fn grant_permission(&self, template: &str) {
        self.permissions
            .write()
            .expect("session permissions poisoned")
            .grant(template);
    }

    pub fn revoke_permission(&self, template: &str) {
        self.permissions
            .write()
            .expect("session permissions poisoned")
            .revoke(template);
    }

    /// Operators and holders of `build.restricted` bypass the build rules.
    pub fn may_build_restricted(&self) -> bool {
        self.is_operator() || self.has_permission("build.restricted")
    }
}

pub fn user_type(operator: bool) -> u8 {
    if operator { USER_TYPE_OP } else { USER_TYPE_NORMAL }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.get() {
            Some(name) => write!(f, "{} ({})", name, self.addr),
            None => write!(f, "{}", self.addr),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("name", &self.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

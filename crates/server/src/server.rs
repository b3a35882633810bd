//! Shared server context: configuration, directories, admission, events.
//!
//! Everything here is reached through `Arc<Server>` from every session task.
//! Directories are `DashMap`s keyed by lowercased name; callers always take
//! a snapshot (`sessions()`, `entities()`) before fanning out so no shard lock
//! is held while packets are queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::admission::Admission;
use crate::config::ServerConfig;
use crate::dashboard::Metrics;
use crate::entity::Entity;
use crate::events::EventBus;
use crate::level::Level;
use crate::net::protocol::SELF_ID;
use crate::net::session::Session;

const SALT_LEN: usize = 16;

/// Handler for chat lines starting with `/`. Receives the text after the slash.
pub trait CommandExecutor: Send + Sync + 'static {
    fn execute(&self, session: &Arc<Session>, command: &str);
}

/// Used until a real command layer is installed.
pub struct UnknownCommand;

impl CommandExecutor for UnknownCommand {
    fn execute(&self, session: &Arc<Session>, _command: &str) {
        session.send_message("Unknown command!");
    }
}

pub struct Server {
    pub config: ServerConfig,
    salt: String,
    pub admission: Admission,
    pub events: EventBus,
    pub metrics: Metrics,
    sessions: DashMap<String, Arc<Session>>,
    entities: DashMap<String, Arc<Entity>>,
    /// `true` = id in use. Index 255 is the self sentinel and never handed out.
    entity_ids: Mutex<[bool; SELF_ID as usize]>,
    levels: DashMap<String, Arc<Level>>,
    main_level: RwLock<Option<Arc<Level>>>,
    commands: RwLock<Arc<dyn CommandExecutor>>,
    next_session_id: AtomicU64,
}

impl Server {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let salt = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SALT_LEN)
            .map(char::from)
            .collect();
        let admission = Admission::new(config.max_players);
        Arc::new(Self {
            config,
            salt,
            admission,
            events: EventBus::new(),
            metrics: Metrics::new(),
            sessions: DashMap::new(),
            entities: DashMap::new(),
            entity_ids: Mutex::new([false; SELF_ID as usize]),
            levels: DashMap::new(),
            main_level: RwLock::new(None),
            commands: RwLock::new(Arc::new(UnknownCommand)),
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Per-process salt for name verification keys.
    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    // ── Sessions ─────────────────────────────────────────────────────────

    /// Register a logged-in session. Fails if the name is already taken.
    pub fn add_session(&self, session: &Arc<Session>) -> bool {
        let key = session.name().to_ascii_lowercase();
        match self.sessions.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(session));
                true
            }
        }
    }

    /// Remove `session` if it is the one registered under its name.
    pub fn remove_session(&self, session: &Arc<Session>) {
        let key = session.name().to_ascii_lowercase();
        self.sessions
            .remove_if(&key, |_, registered| Arc::ptr_eq(registered, session));
    }

    pub fn find_session(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions
            .get(&name.to_ascii_lowercase())
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn for_each_session(&self, mut f: impl FnMut(&Arc<Session>)) {
        for session in self.sessions() {
            f(&session);
        }
    }

    /// Send a chat line to every logged-in session.
    pub fn broadcast_message(&self, message: &str) {
        tracing::info!("[chat] {}", message);
        self.for_each_session(|session| session.send_message(message));
    }

    // ── Entities ─────────────────────────────────────────────────────────

    /// Assign the lowest free id and register the entity by name.
    /// Fails when all 255 ids are taken or the name is already registered.
    pub fn add_entity(&self, entity: &Arc<Entity>) -> bool {
        let key = entity.name().to_ascii_lowercase();
        let Entry::Vacant(slot) = self.entities.entry(key) else {
            return false;
        };
        let id = {
            let mut ids = self.entity_ids.lock().expect("entity ids poisoned");
            let Some(free) = ids.iter().position(|used| !used) else {
                return false;
            };
            ids[free] = true;
            free as u8
        };
        entity.assign_id(id);
        slot.insert(Arc::clone(entity));

        for session in self.sessions() {
            session.send_add_player_list(entity);
        }
        if let Some(owner) = entity.session() {
            for other in self.entities() {
                if !Arc::ptr_eq(&other, entity) {
                    owner.send_add_player_list(&other);
                }
            }
        }
        true
    }

    /// Unregister `entity` and free its id. No-op for unregistered entities.
    pub fn remove_entity(&self, entity: &Arc<Entity>) {
        let key = entity.name().to_ascii_lowercase();
        let removed = self
            .entities
            .remove_if(&key, |_, registered| Arc::ptr_eq(registered, entity));
        if removed.is_none() {
            return;
        }
        if let Some(id) = entity.id() {
            self.entity_ids.lock().expect("entity ids poisoned")[id as usize] = false;
        }
        for session in self.sessions() {
            session.send_remove_player_list(entity);
        }
    }

    pub fn find_entity(&self, name: &str) -> Option<Arc<Entity>> {
        self.entities
            .get(&name.to_ascii_lowercase())
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn entities(&self) -> Vec<Arc<Entity>> {
        self.entities
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    // ── Levels ───────────────────────────────────────────────────────────

    pub fn add_level(&self, level: Arc<Level>) {
        self.levels.insert(level.name().to_string(), level);
    }

    pub fn find_level(&self, name: &str) -> Option<Arc<Level>> {
        self.levels.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn levels(&self) -> Vec<Arc<Level>> {
        self.levels
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn main_level(&self) -> Option<Arc<Level>> {
        self.main_level.read().expect("main level poisoned").clone()
    }

    /// Make `level` the default level new players join. Registers it too.
    pub fn set_main_level(&self, level: Arc<Level>) {
        self.add_level(Arc::clone(&level));
        *self.main_level.write().expect("main level poisoned") = Some(level);
    }

    // ── Commands ─────────────────────────────────────────────────────────

    pub fn set_command_executor(&self, executor: Arc<dyn CommandExecutor>) {
        *self.commands.write().expect("command executor poisoned") = executor;
    }

    pub fn execute_command(&self, session: &Arc<Session>, command: &str) {
        let executor = Arc::clone(&*self.commands.read().expect("command executor poisoned"));
        tracing::info!("{} issued command /{}", session.name(), command);
        executor.execute(session, command);
    }
}

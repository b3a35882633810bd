//! Positioned actors and their visibility to sessions.
//!
//! An entity may be owned by a session (a player) or stand alone. It lives in
//! at most one level at a time. `location` is written by whoever moves the
//! entity; `last` is the pose most recently broadcast and is only advanced by
//! [`Entity::update`] after the delta packet has gone out.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use classic_engine::world::position::Location;

use crate::events::Outcome;
use crate::level::Level;
use crate::net::protocol::SELF_ID;
use crate::net::session::Session;
use crate::server::Server;
use crate::sync;

pub const DEFAULT_MODEL: &str = "humanoid";

/// Display attributes shown to other players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    pub display_name: String,
    pub skin_name: String,
    pub model: String,
    pub list_name: String,
    pub group_name: String,
    pub group_rank: u8,
}

impl EntityMeta {
    fn for_name(name: &str) -> Self {
        Self {
            display_name: name.to_string(),
            skin_name: name.to_string(),
            model: DEFAULT_MODEL.to_string(),
            list_name: name.to_string(),
            group_name: "Players".to_string(),
            group_rank: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Pose {
    location: Location,
    last: Location,
    /// Bumped whenever `last` is reset outside of [`Entity::update`].
    generation: u64,
}

impl Pose {
    fn reset(&mut self, location: Location, last: Location) {
        self.location = location;
        self.last = last;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Record `now` as broadcast unless a reset happened since `generation`.
    fn commit(&mut self, generation: u64, now: Location) {
        if self.generation == generation {
            self.last = now;
        }
    }
}

pub struct Entity {
    /// [`SELF_ID`] until the server assigns a real id.
    id: AtomicU8,
    name: String,
    session: Option<Weak<Session>>,
    server: Arc<Server>,
    meta: RwLock<EntityMeta>,
    pose: Mutex<Pose>,
    level: RwLock<Option<Arc<Level>>>,
}

impl Entity {
    pub fn new(
        name: impl Into<String>,
        session: Option<Weak<Session>>,
        server: Arc<Server>,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            id: AtomicU8::new(SELF_ID),
            meta: RwLock::new(EntityMeta::for_name(&name)),
            name,
            session,
            server,
            pose: Mutex::new(Pose::default()),
            level: RwLock::new(None),
        })
    }

    pub fn id(&self) -> Option<u8> {
        match self.id.load(Ordering::Acquire) {
            SELF_ID => None,
            id => Some(id),
        }
    }

    pub(crate) fn assign_id(&self, id: u8) {
        self.id.store(id, Ordering::Release);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning session while it is still alive.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_owned_by(&self, session: &Arc<Session>) -> bool {
        self.session
            .as_ref()
            .is_some_and(|owner| std::ptr::eq(owner.as_ptr(), Arc::as_ptr(session)))
    }

    pub fn meta(&self) -> EntityMeta {
        self.meta.read().expect("entity meta poisoned").clone()
    }

    pub fn level(&self) -> Option<Arc<Level>> {
        self.level.read().expect("entity level poisoned").clone()
    }

    pub fn location(&self) -> Location {
        self.pose.lock().expect("entity pose poisoned").location
    }

    /// Pose most recently broadcast to other sessions.
    pub fn last_location(&self) -> Location {
        self.pose.lock().expect("entity pose poisoned").last
    }

    /// Overwrite the pose without events or packets. Peers pick the change up
    /// on the next [`Entity::update`].
    pub fn set_location(&self, location: Location) {
        self.pose.lock().expect("entity pose poisoned").location = location;
    }

    /// Move after consulting move listeners. Returns `false` on veto.
    pub fn move_to(self: &Arc<Self>, location: Location) -> bool {
        let from = self.location();
        if let Outcome::Veto(reason) = self.server.events.entity_move(self, from, location) {
            tracing::debug!("Move of {} vetoed: {}", self.name, reason);
            return false;
        }
        self.set_location(location);
        true
    }

    /// Application-driven relocation. Only the owning connection is told
    /// directly; everyone else sees it through the next tick.
    pub fn teleport(self: &Arc<Self>, location: Location) -> bool {
        if !self.move_to(location) {
            return false;
        }
        if let Some(session) = self.session() {
            session.send_teleport(self);
        }
        true
    }

    // ── Synchronization ──────────────────────────────────────────────────

    /// Broadcast the cheapest packet describing movement since the last
    /// broadcast to every other session in the level.
    pub fn update(self: &Arc<Self>) {
        let (Some(level), Some(id)) = (self.level(), self.id()) else {
            return;
        };
        let (packet, generation, now) = {
            let pose = self.pose.lock().expect("entity pose poisoned");
            match sync::classify(id, &pose.last, &pose.location) {
                Some(packet) => (packet, pose.generation, pose.location),
                None => return,
            }
        };

        for session in level.sessions() {
            if self.is_owned_by(&session) {
                continue;
            }
            session.send_frame(packet.encode_for(id, session.entity_id()));
        }

        self.pose
            .lock()
            .expect("entity pose poisoned")
            .commit(generation, now);
    }

    /// Show this entity to every session in `level`; the owner additionally
    /// receives the level itself and every entity already present.
    fn spawn(self: &Arc<Self>, level: &Arc<Level>) {
        level.add_entity(self);
        let owner = self.session();

        for session in level.sessions() {
            if owner.as_ref().is_some_and(|o| Arc::ptr_eq(o, &session)) {
                continue;
            }
            session.send_spawn(self);
        }

        if let Some(owner) = owner {
            owner.send_level(level);
            for other in level.entities() {
                owner.send_spawn(&other);
            }
        }
    }

    /// Mirror of [`Entity::spawn`].
    fn despawn(self: &Arc<Self>, level: &Arc<Level>) {
        level.remove_entity(self);

        for session in level.sessions() {
            session.send_despawn(self);
        }

        if let Some(owner) = self.session().filter(|s| s.is_connected()) {
            owner.send_despawn(self);
            for other in level.entities() {
                owner.send_despawn(&other);
            }
        }
    }

    /// Move into `target` (or out of every level with `None`). Joining resets
    /// both the pose and the last broadcast pose to the level spawn.
    pub fn teleport_level(self: &Arc<Self>, target: Option<Arc<Level>>) {
        let previous = {
            let mut current = self.level.write().expect("entity level poisoned");
            match (current.as_ref(), target.as_ref()) {
                (None, None) => return,
                (Some(a), Some(b)) if Arc::ptr_eq(a, b) => return,
                _ => current.take(),
            }
        };

        if let Some(old) = &previous {
            self.despawn(old);
        }

        if let Some(new) = &target {
            let spawn = new.world().spawn();
            {
                let mut pose = self.pose.lock().expect("entity pose poisoned");
                pose.reset(spawn, spawn);
            }
            *self.level.write().expect("entity level poisoned") = Some(Arc::clone(new));
            self.spawn(new);
        }

        tracing::debug!(
            "{} moved from level {:?} to {:?}",
            self.name,
            previous.as_ref().map(|l| l.name().to_string()),
            target.as_ref().map(|l| l.name().to_string()),
        );
        self.server
            .events
            .level_change(self, previous.as_ref(), target.as_ref());
    }

    /// Put the entity back at its level's spawn and re-announce it.
    pub fn respawn(self: &Arc<Self>) {
        let Some(level) = self.level() else {
            return;
        };
        self.despawn(&level);
        {
            let mut pose = self.pose.lock().expect("entity pose poisoned");
            pose.reset(level.world().spawn(), Location::default());
        }
        self.spawn(&level);
    }

    // ── Presentation ─────────────────────────────────────────────────────

    pub fn set_model(self: &Arc<Self>, model: impl Into<String>) {
        let model = model.into();
        {
            let mut meta = self.meta.write().expect("entity meta poisoned");
            if meta.model == model {
                return;
            }
            meta.model = model;
        }
        if let Some(level) = self.level() {
            for session in level.sessions() {
                session.send_change_model(self);
            }
        }
    }

    pub fn set_list(self: &Arc<Self>, list_name: &str, group_name: &str, group_rank: u8) {
        {
            let mut meta = self.meta.write().expect("entity meta poisoned");
            meta.list_name = list_name.to_string();
            meta.group_name = group_name.to_string();
            meta.group_rank = group_rank;
        }
        if self.id().is_none() {
            return;
        }
        for session in self.server.sessions() {
            session.send_add_player_list(self);
        }
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id())
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

//! Gameplay events raised to external listeners.
//!
//! Hooks run synchronously on the task that triggered them, before the change
//! is committed. Cancellable hooks return an [`Outcome`]; the first listener
//! to veto wins and later listeners are not consulted. Listeners observe and
//! decide, they never mutate session or entity state themselves.

use std::sync::{Arc, RwLock};

use classic_engine::world::block::BlockId;
use classic_engine::world::position::{BlockPos, Location};

use crate::entity::Entity;
use crate::level::Level;
use crate::net::session::Session;

/// Result of a cancellable hook.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    Proceed,
    /// Cancel the action. For joins the reason is shown to the client.
    Veto(String),
}

impl Outcome {
    pub fn is_veto(&self) -> bool {
        matches!(self, Outcome::Veto(_))
    }
}

/// Observer of gameplay events. Every hook defaults to a no-op / proceed.
pub trait EventListener: Send + Sync + 'static {
    fn on_player_join(&self, _session: &Arc<Session>) -> Outcome {
        Outcome::Proceed
    }

    fn on_player_quit(&self, _session: &Arc<Session>) {}

    /// Fires for every connection that goes away, logged in or not.
    fn on_client_disconnect(&self, _session: &Arc<Session>) {}

    fn on_entity_move(&self, _entity: &Arc<Entity>, _from: Location, _to: Location) -> Outcome {
        Outcome::Proceed
    }

    fn on_level_change(
        &self,
        _entity: &Arc<Entity>,
        _from: Option<&Arc<Level>>,
        _to: Option<&Arc<Level>>,
    ) {
    }

    fn on_block_break(&self, _session: &Arc<Session>, _pos: BlockPos, _block: BlockId) -> Outcome {
        Outcome::Proceed
    }

    fn on_block_place(&self, _session: &Arc<Session>, _pos: BlockPos, _block: BlockId) -> Outcome {
        Outcome::Proceed
    }
}

/// Registered listeners, notified in registration order.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .write()
            .expect("event bus poisoned")
            .push(listener);
    }

    /// Clone the listener list so hooks run without the lock held; a hook may
    /// register further listeners or trigger nested events.
    fn listeners(&self) -> Vec<Arc<dyn EventListener>> {
        self.listeners.read().expect("event bus poisoned").clone()
    }

    fn first_veto(&self, hook: impl Fn(&dyn EventListener) -> Outcome) -> Outcome {
        for listener in self.listeners() {
            let outcome = hook(listener.as_ref());
            if outcome.is_veto() {
                return outcome;
            }
        }
        Outcome::Proceed
    }

    pub fn player_join(&self, session: &Arc<Session>) -> Outcome {
        self.first_veto(|l| l.on_player_join(session))
    }

    pub fn player_quit(&self, session: &Arc<Session>) {
        for listener in self.listeners() {
            listener.on_player_quit(session);
        }
    }

    pub fn client_disconnect(&self, session: &Arc<Session>) {
        for listener in self.listeners() {
            listener.on_client_disconnect(session);
        }
    }

    pub fn entity_move(&self, entity: &Arc<Entity>, from: Location, to: Location) -> Outcome {
        self.first_veto(|l| l.on_entity_move(entity, from, to))
    }

    pub fn level_change(
        &self,
        entity: &Arc<Entity>,
        from: Option<&Arc<Level>>,
        to: Option<&Arc<Level>>,
    ) {
        for listener in self.listeners() {
            listener.on_level_change(entity, from, to);
        }
    }

    pub fn block_break(&self, session: &Arc<Session>, pos: BlockPos, block: BlockId) -> Outcome {
        self.first_veto(|l| l.on_block_break(session, pos, block))
    }

    pub fn block_place(&self, session: &Arc<Session>, pos: BlockPos, block: BlockId) -> Outcome {
        self.first_veto(|l| l.on_block_place(session, pos, block))
    }
}

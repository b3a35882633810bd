//! Identification, extension negotiation and login.
//!
//! ```text
//! Identifying ──(no CPE)──────────────────────────┐
//!     │                                           ▼
//!     └─(CPE)─► Negotiating ──(remaining == 0)─► LoggingIn ─► LoggedIn
//! ```
//! Any state may drop to `Disconnected`.

use std::sync::Arc;
use std::time::Duration;

use md5::{Digest, Md5};

use crate::block::CUSTOM_BLOCK_SUPPORT_LEVEL;
use crate::chat;
use crate::entity::Entity;
use crate::events::Outcome;
use crate::extensions::{self, CUSTOM_BLOCKS};
use crate::net::protocol::{
    ClientIdentification, CustomBlockSupportLevel, ExtEntry, ExtInfo, Ping, ServerIdentification,
    CPE_CLIENT_TYPE, PROTOCOL_VERSION,
};
use crate::net::session::{user_type, Session, SessionState};
use crate::permissions::Permissions;

/// Software name reported in our ExtInfo.
pub const SOFTWARE: &str = concat!("classic-server ", env!("CARGO_PKG_VERSION"));

/// Hex md5 of `salt ‖ name`, the key a name-verifying client must present.
pub fn verification_key(salt: &str, name: &str) -> String {
    let digest = Md5::digest(format!("{}{}", salt, name).as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn handle_identification(session: &Arc<Session>, packet: ClientIdentification) {
    if session.state() != SessionState::Identifying {
        tracing::debug!("Ignoring repeated identification from {}", session);
        return;
    }
    let server = session.server();

    if packet.protocol_version != PROTOCOL_VERSION {
        session.kick("Wrong version!");
        return;
    }

    let name = packet.name;
    if !chat::is_valid_name(&name) {
        session.kick("Invalid name!");
        return;
    }

    if server.config.verify_names
        && !verification_key(server.salt(), &name).eq_ignore_ascii_case(&packet.verification_key)
    {
        session.kick("Login failed!");
        return;
    }

    if server.find_entity(&name).is_some() || server.find_session(&name).is_some() {
        session.kick("Already logged in!");
        return;
    }

    let operator = server.config.is_operator(&name);
    let mut permissions = Permissions::new(server.config.default_permissions.iter().cloned());
    if operator {
        for template in &server.config.operator_permissions {
            permissions.grant(template.clone());
        }
    }
    session.identify(name, operator, permissions);

    if packet.client_type == CPE_CLIENT_TYPE {
        if !session.transition(SessionState::Identifying, SessionState::Negotiating) {
            return;
        }
        tracing::debug!("{} supports extensions, negotiating", session);
        session.send_packet(&ExtInfo {
            software: SOFTWARE.to_string(),
            extension_count: extensions::SUPPORTED.len() as i16,
        });
        for ext in extensions::SUPPORTED {
            session.send_packet(&ExtEntry {
                name: ext.name.to_string(),
                version: ext.version,
            });
        }
    } else {
        login(session);
    }
}

pub fn handle_ext_info(session: &Arc<Session>, packet: ExtInfo) {
    if session.state() != SessionState::Negotiating {
        return;
    }
    tracing::debug!(
        "{} runs {} with {} extensions",
        session,
        packet.software,
        packet.extension_count
    );
    let remaining = packet.extension_count.max(0);
    session
        .handshake
        .lock()
        .expect("session handshake poisoned")
        .remaining_extensions = Some(remaining);
    if remaining == 0 {
        login(session);
    }
}

pub fn handle_ext_entry(session: &Arc<Session>, packet: ExtEntry) {
    if session.state() != SessionState::Negotiating {
        return;
    }
    if session.accept_extension(&packet.name, packet.version) {
        tracing::debug!("{} negotiated {} v{}", session, packet.name, packet.version);
    }

    let done = {
        let mut handshake = session.handshake.lock().expect("session handshake poisoned");
        match handshake.remaining_extensions.as_mut() {
            Some(remaining) => {
                *remaining -= 1;
                *remaining <= 0
            }
            None => false,
        }
    };
    if done {
        login(session);
    }
}

pub fn handle_custom_block_support_level(session: &Arc<Session>, packet: CustomBlockSupportLevel) {
    if packet.level <= CUSTOM_BLOCK_SUPPORT_LEVEL {
        session.set_custom_block_level(packet.level);
    }

    let join = {
        let mut handshake = session.handshake.lock().expect("session handshake poisoned");
        std::mem::take(&mut handshake.join_pending)
    };
    if join && session.is_logged_in() {
        join_main_level(session);
    }
}

/// Admit, announce and register the session. Owns the admission slot until
/// the state reaches `LoggedIn`; after that `disconnect` releases it.
pub fn login(session: &Arc<Session>) {
    let entered = session.transition(SessionState::Identifying, SessionState::LoggingIn)
        || session.transition(SessionState::Negotiating, SessionState::LoggingIn);
    if !entered {
        return;
    }
    let server = Arc::clone(session.server());

    if !server.admission.try_admit() {
        session.kick("Server full!");
        return;
    }

    let wants_custom_blocks = session.has_extension(CUSTOM_BLOCKS);
    if wants_custom_blocks {
        session.send_packet(&CustomBlockSupportLevel {
            level: CUSTOM_BLOCK_SUPPORT_LEVEL,
        });
    }

    session.send_packet(&ServerIdentification {
        protocol_version: PROTOCOL_VERSION,
        name: server.config.name.clone(),
        motd: server.config.motd.clone(),
        user_type: user_type(session.is_operator()),
    });

    let entity = Entity::new(session.name(), Some(Arc::downgrade(session)), Arc::clone(&server));
    session.attach_entity(Arc::clone(&entity));

    if let Outcome::Veto(reason) = server.events.player_join(session) {
        server.admission.release();
        session.kick(&reason);
        return;
    }

    // Registered before LoggedIn: a lost same-name race must not run the
    // logged-in teardown.
    if !server.add_session(session) {
        server.admission.release();
        session.kick("Already logged in!");
        return;
    }

    if !session.transition(SessionState::LoggingIn, SessionState::LoggedIn) {
        server.admission.release();
        session.unregister();
        return;
    }
    server.metrics.player_joined();
    tracing::info!("{} logged in ({}/{})", session, server.admission.count(), server.admission.max());
    server.broadcast_message(&format!("{}{} has joined the game!", chat::YELLOW, session.name()));

    if !server.add_entity(&entity) {
        session.kick("Server full!");
        return;
    }

    if wants_custom_blocks {
        session
            .handshake
            .lock()
            .expect("session handshake poisoned")
            .join_pending = true;
    } else {
        join_main_level(session);
    }

    spawn_keepalive(session, server.config.keepalive_interval());

    // A disconnect that ran before registration finished left these behind.
    if !session.is_logged_in() {
        session.unregister();
    }
}

fn join_main_level(session: &Arc<Session>) {
    if let (Some(entity), Some(level)) = (session.entity(), session.server().main_level()) {
        entity.teleport_level(Some(level));
    }
}

/// Ping the client every `period` until the session closes.
fn spawn_keepalive(session: &Arc<Session>, period: Duration) {
    let session = Arc::clone(session);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // first tick is immediate, skip it
        loop {
            tokio::select! {
                _ = session.closed().cancelled() => break,
                _ = interval.tick() => session.send_packet(&Ping),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{Disconnect, Message, Packet};
    use bytes::Bytes;
    use tokio::sync::mpsc;

    #[test]
    fn verification_key_is_lowercase_hex_md5() {
        // md5("abc")
        assert_eq!(verification_key("a", "bc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(verification_key("", "").len(), 32);
    }

    fn connect(server: &Arc<crate::server::Server>) -> (Arc<Session>, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(256);
        let session = Session::new(Arc::clone(server), "127.0.0.1:1".parse().unwrap(), tx);
        (session, rx)
    }

    fn frames(rx: &mut mpsc::Receiver<Bytes>) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(frame);
        }
        out
    }

    #[tokio::test]
    async fn losing_the_name_race_leaves_the_winner_alone() {
        let server = crate::server::Server::new(crate::config::ServerConfig::default());
        server.set_main_level(Arc::new(crate::level::Level::flat("main", 8, 8, 8)));

        let (alice, mut rx_alice) = connect(&server);
        handle_identification(
            &alice,
            ClientIdentification {
                protocol_version: PROTOCOL_VERSION,
                name: "Alice".into(),
                verification_key: String::new(),
                client_type: 0,
            },
        );
        assert!(alice.is_logged_in());
        frames(&mut rx_alice);

        // Passed the duplicate check before Alice registered.
        let (late, mut rx_late) = connect(&server);
        assert!(late.identify("alice".into(), false, Permissions::default()));
        login(&late);

        let kicked: Vec<String> = frames(&mut rx_late)
            .iter()
            .filter(|f| f[0] == Disconnect::OPCODE)
            .map(|f| Disconnect::decode(f).unwrap().reason)
            .collect();
        assert_eq!(kicked, vec!["Already logged in!".to_string()]);
        assert_eq!(late.state(), SessionState::Disconnected);

        let told: Vec<String> = frames(&mut rx_alice)
            .iter()
            .filter(|f| f[0] == Message::OPCODE)
            .map(|f| Message::decode(f).unwrap().text)
            .collect();
        assert!(told.iter().all(|text| !text.contains("has left the game")));

        assert!(alice.is_logged_in());
        assert_eq!(server.admission.count(), 1);
        let registered = server.find_session("ALICE").unwrap();
        assert!(Arc::ptr_eq(&registered, &alice));
        assert!(server.find_entity("alice").is_some_and(|e| Arc::ptr_eq(&e, alice.entity().unwrap())));
    }
}

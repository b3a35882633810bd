//! Live status dashboard.
//!
//! Design contract with the session tasks:
//!   • Metrics: atomic fetch_add, never blocks.
//!   • Status documents are built on the dashboard's own tasks from directory
//!     snapshots; the web server never holds a lock a session needs.

pub mod metrics;
pub mod server;

use serde::Serialize;

use crate::server::Server;
pub use metrics::{Metrics, MetricsSnapshot};

#[derive(Clone, Debug, Serialize)]
pub struct PlayerStatus {
    pub name: String,
    pub id: Option<u8>,
    pub level: Option<String>,
    pub operator: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct LevelStatus {
    pub name: String,
    pub size: [usize; 3],
    pub entities: usize,
    pub dirty: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct StatusDocument {
    pub name: String,
    pub motd: String,
    pub online: usize,
    pub max: usize,
    pub players: Vec<PlayerStatus>,
    pub levels: Vec<LevelStatus>,
    pub metrics: MetricsSnapshot,
}

/// Snapshot the server into a serializable status document.
pub fn status(server: &Server) -> StatusDocument {
    let mut players: Vec<PlayerStatus> = server
        .sessions()
        .iter()
        .map(|session| {
            let entity = session.entity();
            PlayerStatus {
                name: session.name().to_string(),
                id: entity.and_then(|e| e.id()),
                level: entity.and_then(|e| e.level()).map(|l| l.name().to_string()),
                operator: session.is_operator(),
            }
        })
        .collect();
    players.sort_by(|a, b| a.name.cmp(&b.name));

    let mut levels: Vec<LevelStatus> = server
        .levels()
        .iter()
        .map(|level| {
            let world = level.world();
            LevelStatus {
                name: level.name().to_string(),
                size: [world.width(), world.height(), world.depth()],
                entities: level.entity_count(),
                dirty: world.is_dirty(),
            }
        })
        .collect();
    levels.sort_by(|a, b| a.name.cmp(&b.name));

    StatusDocument {
        name: server.config.name.clone(),
        motd: server.config.motd.clone(),
        online: server.admission.count(),
        max: server.admission.max(),
        players,
        levels,
        metrics: server.metrics.snapshot(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::level::Level;
    use std::sync::Arc;

    #[test]
    fn status_lists_levels_and_capacity() {
        let server = Server::new(ServerConfig {
            name: "Test".into(),
            max_players: 8,
            ..Default::default()
        });
        server.set_main_level(Arc::new(Level::flat("main", 8, 8, 8)));

        let doc = status(&server);
        assert_eq!(doc.name, "Test");
        assert_eq!((doc.online, doc.max), (0, 8));
        assert_eq!(doc.levels.len(), 1);
        assert_eq!(doc.levels[0].size, [8, 8, 8]);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["levels"][0]["name"], "main");
    }
}

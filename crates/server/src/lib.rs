pub mod admission;
pub mod block;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod entity;
pub mod events;
pub mod extensions;
pub mod level;
pub mod net;
pub mod permissions;
pub mod persistence;
pub mod server;
pub mod sync;
pub mod tick;
pub mod transfer;

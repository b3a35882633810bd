pub mod connection;
pub mod handshake;
pub mod listener;
pub mod play;
pub mod protocol;
pub mod session;

pub mod connection;
pub mod events;
pub mod fanout;
pub mod handler;
pub mod media;
pub mod presence;
pub mod registry;
pub mod rooms;
pub mod server;
pub mod session;
pub mod teardown;

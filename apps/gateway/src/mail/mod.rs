pub mod scheduler;
pub mod transport;

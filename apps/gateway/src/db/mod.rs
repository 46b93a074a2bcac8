pub mod memory;
pub mod peers;
pub mod pg;
pub mod pool;
pub mod schema;
pub mod store;

/// 存储实现

// Postgres 存储
pub mod postgres;

// 内存存储
pub mod memory;

pub use memory::MemoryStore;
pub use postgres::PgStore;

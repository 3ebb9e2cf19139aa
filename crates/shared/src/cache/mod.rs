mod memory_store;
mod redis_store;

pub use self::memory_store::InMemoryCounterStore;
pub use self::redis_store::RedisCounterStore;

mod counter_store;

pub use self::counter_store::{CounterStoreTrait, DynCounterStore};

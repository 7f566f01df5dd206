//! Process-wide caches.
//!
//! All caches are keyed by type or operation identity, populated on first
//! use and never evicted; their size is bounded by the number of distinct
//! API surfaces in the process.

mod factory;
mod map;

pub use factory::FactoryCache;
pub use map::CopyOnWriteMap;

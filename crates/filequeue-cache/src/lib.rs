//! # filequeue-cache
//!
//! Bounded read-through cache for job records, built on
//! [moka](https://crates.io/crates/moka) with the LRU eviction policy.
//!
//! The cache is best-effort: a miss always falls through to durable
//! storage, and entries are never revalidated against it.

pub mod store;

pub use store::JobCache;

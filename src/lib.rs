//! Resilient event loading.
//!
//! Events are fetched from a remote API; every successful fetch is written
//! to a local cache, and recoverable remote failures are answered from that
//! cache. Rejected credentials are never papered over with cached data.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod loader;
pub mod logging;
pub mod transport;

pub use client::EventClient;
pub use error::{LoadError, LoadResult, MapError, RecoverableError, StoreError};
pub use event::{EntityMapper, Event, EventMapper, Player};
pub use loader::{Loaded, Loader, Source};

//! Event entities and their JSON mapping.

mod mapper;
mod types;

pub use mapper::{EntityMapper, EventMapper};
pub use types::{Event, Player};

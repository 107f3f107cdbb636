//! Narration queue: items, their lifecycle, and the shared store.

mod item;
mod store;

pub use item::{reduce, ItemEvent, ItemId, ItemStatus, NewItem, QueueItem, StatusKind};
pub use store::{QueueStore, StatusCounts};

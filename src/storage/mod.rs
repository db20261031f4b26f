//! Queue storage: the per-queue message store and the registry of live queues.

pub mod memory;
pub mod registry;

pub use memory::{AttributeSelection, DueOutcome, MessageState, QueueData, StoredMessage};
pub use registry::{CreateOutcome, QueueHandle, QueueRegistry};

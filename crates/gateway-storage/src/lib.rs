//! The storage coordinator (C4): the orchestration layer that pairs
//! `gateway-blob` (C2) writes with `gateway-metastore` (C3) rows under the
//! object's advisory lock, enforces MIME/size limits, and emits lifecycle
//! events.

pub mod coordinator;
pub mod events;
pub mod limits;

pub use coordinator::{PutObjectRequest, StorageCoordinator};
pub use events::{ChannelEventSink, EventSink, LifecycleEvent, NoopEventSink};

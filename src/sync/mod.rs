//! Note synchronization (local store <-> remote service)
//!
//! Last-writer-wins by `updated_at`: a remote note replaces the local copy
//! only when it is strictly newer, and local writes are pushed to the remote
//! fire-and-forget.
//!
//! # Feature Flags
//!
//! `HttpRemoteClient` requires the `http` feature. The engine itself works
//! with any [`RemoteClient`].

mod engine;
mod handle;
mod remote;

pub use engine::SyncEngine;
pub use handle::{PollOutcome, PollStats, SyncedNote};
#[cfg(feature = "http")]
pub use remote::HttpRemoteClient;
pub use remote::RemoteClient;

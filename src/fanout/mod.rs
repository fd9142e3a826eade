//! Connection registry and broadcast fanout
//!
//! The registry is a thin view over a [`ConnectionStore`](crate::state::ConnectionStore);
//! the engine takes an immutable snapshot of it, pushes one serialized payload to
//! every peer concurrently through a [`PushTransport`], and prunes the peers the
//! transport reports as gone once all attempts have completed.

pub mod engine;
pub mod registry;
pub mod report;
pub mod transport;

pub use engine::FanoutEngine;
pub use registry::{ConnectionRegistry, RegistrySnapshot};
pub use report::{DeliveryOutcome, DeliveryReport};
pub use transport::{PushError, PushTransport};

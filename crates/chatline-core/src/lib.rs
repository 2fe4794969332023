//! Chatline fan-out core.
//!
//! Pure, synchronous state for real-time delivery: which connections are
//! live, which conversation rooms they follow, and how a published payload is
//! spread across a room's members. Nothing in this crate performs I/O or
//! depends on an async runtime.
//!
//! # Architecture
//!
//! ```text
//!   register / join / leave / publish / unregister
//!                      │
//!                      ▼
//!               ┌─────────────┐        ┌──────────────┐
//!               │  HubState   │───────>│ RoomRegistry │
//!               └─────────────┘        └──────────────┘
//!                      │ try_enqueue (never blocks)
//!                      ▼
//!          FrameSink (one bounded queue per connection)
//! ```
//!
//! [`HubState`] is the single authority over membership. The runtime wraps it
//! in one lock that is held only for the duration of a state mutation, so
//! membership changes and fan-out are totally ordered. Outbound queues are
//! abstracted behind [`FrameSink`]: a sink either accepts a frame or reports
//! why it cannot, and a connection whose sink refuses a frame is unregistered
//! on the spot.
//!
//! # Components
//!
//! - [`HubState`]: connection set, identity index, fan-out and statistics
//! - [`RoomRegistry`]: room membership kept in lock-step in both directions
//! - [`ControlFrame`]: inbound `join_chat` / `leave_chat` vocabulary
//! - [`OutboundFrame`]: opaque payload plus per-room sequence number
//! - [`ConnectionState`]: per-connection lifecycle
//! - [`SequenceTracker`]: gap detection on the receiving side

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod control;
pub mod error;
pub mod frame;
pub mod hub;
pub mod ids;
pub mod registry;
pub mod sequence;
pub mod sink;
pub mod stats;

pub use config::HubConfig;
pub use connection::ConnectionState;
pub use control::ControlFrame;
pub use error::{ControlFrameError, EnqueueError, HubError};
pub use frame::{FrameScope, OutboundFrame};
pub use hub::{Departure, HubState, JoinOutcome, LeaveOutcome};
pub use ids::{ConnectionId, Identity, RoomId};
pub use registry::RoomRegistry;
pub use sequence::{Observation, SequenceTracker};
pub use sink::FrameSink;
pub use stats::HubStats;

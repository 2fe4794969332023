//! Test harness for the Chatline fan-out core.
//!
//! In-memory implementations of the core's seams plus the tooling used by
//! property, model-based and fuzz tests.
//!
//! # Memory Sinks
//!
//! [`MemorySink`] is a bounded outbound queue that never touches a runtime.
//! Its [`SinkTap`] stays with the test so frames can be drained and the
//! closed flag inspected after the hub has taken ownership of the sink.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the hub.
//! Operations are applied to both the model and the real `HubState`, and
//! their observable states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks structural properties of a [`HubSnapshot`]
//! that must hold after every operation. Use [`InvariantRegistry::standard()`]
//! for the membership invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_sink;

pub use invariants::{
    HubSnapshot, IdentityIndexConsistent, Invariant, InvariantRegistry, InvariantResult,
    MembersAreRegistered, MembershipLockstep, NoEmptyRooms, Violation,
};
pub use model::{
    ModelConnId, ModelFrame, ModelHub, ModelIdentity, ModelRoomId, ObservableState, Operation,
    OperationOutcome, SmallMessage,
};
pub use sim_sink::{MemorySink, SinkTap};

//! Reference model for model-based testing.
//!
//! [`ModelHub`] is a deliberately naive implementation of the hub built from
//! ordered maps and linear scans. Random [`Operation`] sequences are applied
//! to it and to the real `HubState`; any divergence in results or in
//! [`ObservableState`] is a bug in one of them.

mod hub;
mod operation;

pub use hub::{ConnectionView, ModelFrame, ModelHub, ObservableState, OperationOutcome};
pub use operation::{ModelConnId, ModelIdentity, ModelRoomId, Operation, SmallMessage};

//! Invariant checking for hub state.
//!
//! Invariants are structural properties that must hold after every hub
//! operation, whatever the sequence of registrations, joins, publishes and
//! backpressure drops that led there.
//!
//! # Architecture
//!
//! The hub's observable state is copied into a [`HubSnapshot`], then every
//! registered [`Invariant`] is checked against it. Violations carry the name
//! of the broken invariant and enough context to debug it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = HubSnapshot::from_hub(&hub);
//! registry.assert_all(&snapshot, "after publish");
//! ```

mod checks;
mod snapshot;

pub use checks::{IdentityIndexConsistent, MembersAreRegistered, MembershipLockstep, NoEmptyRooms};
pub use snapshot::HubSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property that must hold for every reachable hub state.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a snapshot.
    fn check(&self, state: &HubSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with the standard hub invariants.
    ///
    /// Includes:
    /// - [`MembershipLockstep`]: room → connection and connection → room agree
    /// - [`NoEmptyRooms`]: a room exists only while it has members
    /// - [`MembersAreRegistered`]: only registered connections appear in rooms
    /// - [`IdentityIndexConsistent`]: identity lookups match connection owners
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(MembershipLockstep);
        registry.add(NoEmptyRooms);
        registry.add(MembersAreRegistered);
        registry.add(IdentityIndexConsistent);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &HubSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation found.
    pub fn assert_all(&self, state: &HubSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(|v| v.to_string()).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn empty_snapshot_passes_invariants() {
        let registry = InvariantRegistry::standard();
        assert!(registry.check_all(&HubSnapshot::default()).is_ok());
    }
}

//! Fuzz target for HubState operation sequences
//!
//! Applies arbitrary register / join / leave / publish / close sequences to
//! the real hub and to the reference model in lockstep.
//!
//! # Invariants
//!
//! - Every operation returns the same outcome on both implementations
//! - Membership lockstep, no empty rooms, members registered and the
//!   identity index hold after EVERY operation
//! - A connection whose sink reports closed is never still registered
//! - Nothing registers after a shutdown

#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use bytes::Bytes;
use chatline_core::{ConnectionId, HubConfig, HubError, HubState, Identity, RoomId};
use chatline_harness::{
    HubSnapshot, InvariantRegistry, MemorySink, ModelHub, Operation, OperationOutcome, SinkTap,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Scenario {
    max_connections: u8,
    queue_capacity: u8,
    operations: Vec<Operation>,
}

fuzz_target!(|scenario: Scenario| {
    let config = HubConfig {
        max_connections: usize::from(scenario.max_connections % 8) + 1,
        queue_capacity: usize::from(scenario.queue_capacity % 4) + 1,
    };
    let invariants = InvariantRegistry::standard();
    let mut model = ModelHub::new(&config);
    let mut hub: HubState<MemorySink> = HubState::new(config.clone());
    let mut taps: HashMap<u8, SinkTap> = HashMap::new();

    let mut shut_down = false;
    for op in scenario.operations.iter().take(256) {
        let expected = model.apply(op);
        let actual = apply(&mut hub, &mut taps, config.queue_capacity, op);
        assert_eq!(expected, actual, "divergence on {op:?}");

        invariants.assert_all(&HubSnapshot::from_hub(&hub), &format!("after {op:?}"));

        shut_down |= matches!(op, Operation::Shutdown);
        if shut_down {
            assert_eq!(hub.connection_count(), 0, "registration after shutdown");
        }

        for (conn, tap) in &taps {
            if tap.is_closed() {
                assert!(!hub.is_registered(conn_id(*conn)), "closed sink still registered");
            }
        }
    }
});

fn conn_id(conn: u8) -> ConnectionId {
    ConnectionId::new(u64::from(conn))
}

fn room(room: u8) -> RoomId {
    RoomId::new(format!("room-{room}"))
}

fn identity(identity: u8) -> Identity {
    Identity::new(format!("user-{identity}"))
}

fn room_number(room: &RoomId) -> u8 {
    room.as_str().strip_prefix("room-").and_then(|n| n.parse().ok()).unwrap_or(u8::MAX)
}

fn apply(
    hub: &mut HubState<MemorySink>,
    taps: &mut HashMap<u8, SinkTap>,
    queue_capacity: usize,
    op: &Operation,
) -> OperationOutcome {
    match op {
        Operation::Register { conn, identity: who } => {
            let (sink, tap) = MemorySink::with_capacity(queue_capacity);
            match hub.register(conn_id(*conn), identity(*who), sink) {
                Ok(()) => {
                    taps.insert(*conn, tap);
                    OperationOutcome::Registered
                },
                Err(HubError::DuplicateRegistration(_)) => OperationOutcome::Duplicate,
                Err(HubError::CapacityExceeded { .. }) => OperationOutcome::AtCapacity,
                Err(HubError::ShuttingDown) => OperationOutcome::ShuttingDown,
            }
        },
        Operation::Unregister { conn } => {
            OperationOutcome::Unregistered(hub.unregister(conn_id(*conn)).map(|departure| {
                let mut rooms: Vec<_> = departure.rooms.iter().map(room_number).collect();
                rooms.sort_unstable();
                rooms
            }))
        },
        Operation::Join { conn, room: r } => OperationOutcome::Join(hub.join(conn_id(*conn), &room(*r))),
        Operation::Leave { conn, room: r } => {
            OperationOutcome::Leave(hub.leave(conn_id(*conn), &room(*r)))
        },
        Operation::Publish { room: r, message } => {
            OperationOutcome::Delivered(hub.publish(&room(*r), Bytes::from(message.to_bytes())))
        },
        Operation::Broadcast { message } => {
            OperationOutcome::Delivered(hub.broadcast_global(Bytes::from(message.to_bytes())))
        },
        Operation::Drain { conn } => {
            if !hub.is_registered(conn_id(*conn)) {
                return OperationOutcome::Drained(0);
            }
            OperationOutcome::Drained(taps.get(conn).map_or(0, |tap| tap.drain().len()))
        },
        Operation::DisconnectIdentity { identity: who } => {
            OperationOutcome::Closed(hub.disconnect_identity(&identity(*who)))
        },
        Operation::Shutdown => OperationOutcome::Closed(hub.shutdown()),
    }
}

//! Property-based tests for HubState
//!
//! These tests verify membership and ordering properties that must hold for
//! all operation sequences, using in-memory sinks.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use chatline_core::{ConnectionId, HubConfig, HubState, Identity, JoinOutcome, RoomId};
use chatline_harness::{MemorySink, SinkTap};
use proptest::prelude::*;

fn conn(raw: u8) -> ConnectionId {
    ConnectionId::new(u64::from(raw))
}

fn room(raw: u8) -> RoomId {
    RoomId::new(format!("r{raw}"))
}

/// Register `count` connections with roomy queues.
fn hub_with(count: u8, queue_capacity: usize) -> (HubState<MemorySink>, Vec<SinkTap>) {
    let mut hub = HubState::new(HubConfig { max_connections: 64, queue_capacity });
    let taps = (0..count)
        .map(|raw| {
            let (sink, tap) = MemorySink::with_capacity(queue_capacity);
            hub.register(conn(raw), Identity::new(format!("user-{raw}")), sink).unwrap();
            tap
        })
        .collect();
    (hub, taps)
}

#[derive(Debug, Clone)]
enum MembershipOp {
    Join(u8, u8),
    Leave(u8, u8),
    Unregister(u8),
}

fn membership_op() -> impl Strategy<Value = MembershipOp> {
    prop_oneof![
        4 => (0..6u8, 0..3u8).prop_map(|(c, r)| MembershipOp::Join(c, r)),
        3 => (0..6u8, 0..3u8).prop_map(|(c, r)| MembershipOp::Leave(c, r)),
        1 => (0..6u8).prop_map(MembershipOp::Unregister),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: room size equals outstanding joins minus leaves of live members
    #[test]
    fn prop_room_size_tracks_outstanding_joins(
        ops in prop::collection::vec(membership_op(), 0..60)
    ) {
        let (mut hub, _taps) = hub_with(6, 8);
        let mut expected: HashMap<u8, HashSet<u8>> = HashMap::new();
        let mut gone: HashSet<u8> = HashSet::new();

        for op in &ops {
            match *op {
                MembershipOp::Join(c, r) => {
                    hub.join(conn(c), &room(r));
                    if !gone.contains(&c) {
                        expected.entry(r).or_default().insert(c);
                    }
                },
                MembershipOp::Leave(c, r) => {
                    hub.leave(conn(c), &room(r));
                    expected.entry(r).or_default().remove(&c);
                },
                MembershipOp::Unregister(c) => {
                    hub.unregister(conn(c));
                    gone.insert(c);
                    for members in expected.values_mut() {
                        members.remove(&c);
                    }
                },
            }
        }

        for r in 0..3u8 {
            let want = expected.get(&r).map_or(0, HashSet::len);
            prop_assert_eq!(hub.room_size(&room(r)), want);
            prop_assert_eq!(hub.has_room(&room(r)), want > 0);
        }
    }

    /// Property: unregistering the only member reaps the room
    #[test]
    fn prop_last_unregister_reaps_room(
        rooms in prop::collection::hash_set(0..10u8, 1..5),
        payload in prop::collection::vec(any::<u8>(), 0..32)
    ) {
        let (mut hub, _taps) = hub_with(1, 8);
        for r in &rooms {
            prop_assert_eq!(hub.join(conn(0), &room(*r)), JoinOutcome::Joined);
        }

        hub.unregister(conn(0));

        for r in &rooms {
            prop_assert_eq!(hub.publish(&room(*r), Bytes::from(payload.clone())), 0);
            prop_assert!(!hub.has_room(&room(*r)));
        }
        prop_assert_eq!(hub.room_count(), 0);
    }

    /// Property: every member present for consecutive publishes sees them in order
    #[test]
    fn prop_publish_order_preserved(
        members in 1..6u8,
        messages in prop::collection::vec(any::<u32>(), 1..20)
    ) {
        let (mut hub, taps) = hub_with(members, messages.len());
        let target = room(0);
        for c in 0..members {
            hub.join(conn(c), &target);
        }

        for m in &messages {
            let delivered = hub.publish(&target, Bytes::copy_from_slice(&m.to_be_bytes()));
            prop_assert_eq!(delivered, members as usize);
        }

        let expected: Vec<Bytes> =
            messages.iter().map(|m| Bytes::copy_from_slice(&m.to_be_bytes())).collect();
        for tap in &taps {
            let frames = tap.drain();
            let seqs: Vec<u64> = frames.iter().map(|f| f.seq()).collect();
            let payloads: Vec<Bytes> = frames.into_iter().map(|f| f.into_payload()).collect();
            prop_assert_eq!(&payloads, &expected);
            prop_assert_eq!(seqs, (1..=messages.len() as u64).collect::<Vec<_>>());
        }
    }

    /// Property: a second unregister changes nothing
    #[test]
    fn prop_unregister_idempotent(
        joins in prop::collection::vec((0..4u8, 0..3u8), 0..20),
        victim in 0..4u8
    ) {
        let (mut hub, _taps) = hub_with(4, 8);
        for (c, r) in &joins {
            hub.join(conn(*c), &room(*r));
        }

        prop_assert!(hub.unregister(conn(victim)).is_some());
        let sizes: Vec<usize> = (0..3).map(|r| hub.room_size(&room(r))).collect();
        let stats = hub.stats();

        prop_assert!(hub.unregister(conn(victim)).is_none());
        let sizes_after: Vec<usize> = (0..3).map(|r| hub.room_size(&room(r))).collect();

        prop_assert_eq!(sizes, sizes_after);
        prop_assert_eq!(stats, hub.stats());
    }

    /// Property: one full queue costs exactly one delivery
    #[test]
    fn prop_full_member_dropped_others_served(
        members in 1..8u8,
        slow in any::<prop::sample::Index>()
    ) {
        let capacity = 2;
        let (mut hub, taps) = hub_with(members, capacity);
        let target = room(0);
        for c in 0..members {
            hub.join(conn(c), &target);
        }
        let slow = slow.index(members as usize);

        // Fill the slow member's queue, draining everyone else
        for _ in 0..capacity {
            hub.publish(&target, Bytes::from_static(b"fill"));
            for (i, tap) in taps.iter().enumerate() {
                if i != slow {
                    tap.drain();
                }
            }
        }

        let delivered = hub.publish(&target, Bytes::from_static(b"next"));

        prop_assert_eq!(delivered, members as usize - 1);
        prop_assert!(taps[slow].is_closed());
        prop_assert!(!hub.is_registered(conn(slow as u8)));
        prop_assert_eq!(hub.room_size(&target), members as usize - 1);
        prop_assert_eq!(hub.stats().backpressure_drops, 1);
    }
}

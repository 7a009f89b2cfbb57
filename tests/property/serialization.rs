//! Property-based tests for the event channel codec.
//!
//! Uses proptest to verify:
//! 1. Any valid `ChannelMessage` survives encode → decode.
//! 2. Random bytes never cause a panic in `decode` (returns `Err` gracefully).
//! 3. Task JSON (the HTTP body format) survives serialize → deserialize.

use chrono::{DateTime, TimeZone, Utc};
use focus_proto::channel::{self, ChannelMessage};
use focus_proto::session::{FocusSession, SessionId};
use focus_proto::task::{OwnerId, SyncEvent, Task, TaskId};
use proptest::prelude::*;

/// Strategy for timestamps between 2000 and 2100 at second precision.
fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800i64..4_102_444_800i64).prop_map(|secs| {
        Utc.timestamp_opt(secs, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    })
}

fn arb_owner() -> impl Strategy<Value = OwnerId> {
    "[a-z0-9-]{1,32}".prop_map(OwnerId::new)
}

fn arb_task_id() -> impl Strategy<Value = TaskId> {
    prop_oneof![
        any::<u128>().prop_map(|n| TaskId::from_string(uuid::Uuid::from_u128(n).to_string())),
        any::<u64>().prop_map(TaskId::local),
        any::<u64>().prop_map(TaskId::pending),
    ]
}

fn arb_task() -> impl Strategy<Value = Task> {
    (
        arb_task_id(),
        "[^\x00]{1,256}",
        any::<bool>(),
        arb_timestamp(),
        arb_owner(),
    )
        .prop_map(|(id, text, done, created_at, owner_id)| Task {
            id,
            text,
            done,
            created_at,
            owner_id,
        })
}

fn arb_session() -> impl Strategy<Value = FocusSession> {
    (
        prop::option::of("[^\x00]{1,64}"),
        1u32..600,
        arb_timestamp(),
        arb_owner(),
    )
        .prop_map(|(task, minutes, completed_at, owner_id)| FocusSession {
            id: SessionId::generate(),
            task,
            minutes,
            completed_at,
            owner_id,
        })
}

fn arb_event() -> impl Strategy<Value = SyncEvent> {
    prop_oneof![
        arb_task().prop_map(SyncEvent::Created),
        arb_task().prop_map(SyncEvent::Updated),
        arb_task_id().prop_map(|id| SyncEvent::Deleted { id }),
    ]
}

fn arb_message() -> impl Strategy<Value = ChannelMessage> {
    prop_oneof![
        arb_owner().prop_map(|owner_id| ChannelMessage::Join { owner_id }),
        (arb_owner(), any::<u32>())
            .prop_map(|(owner_id, connections)| ChannelMessage::Joined {
                owner_id,
                connections
            }),
        arb_event().prop_map(ChannelMessage::Event),
        arb_session().prop_map(ChannelMessage::SessionCreated),
        "[^\x00]{0,128}".prop_map(|reason| ChannelMessage::Error { reason }),
    ]
}

proptest! {
    #[test]
    fn channel_message_round_trip(msg in arb_message()) {
        let bytes = channel::encode(&msg).unwrap();
        let decoded = channel::decode(&bytes).unwrap();
        prop_assert_eq!(msg, decoded);
    }

    #[test]
    fn random_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = channel::decode(&bytes);
    }

    #[test]
    fn task_json_round_trip(task in arb_task()) {
        let json = serde_json::to_string(&task).unwrap();
        let decoded: Task = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(task, decoded);
    }
}

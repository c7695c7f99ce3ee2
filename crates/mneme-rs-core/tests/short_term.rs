//! Short-term memory integration tests.

use futures_util::future::join_all;
use mneme_rs_core::{
    CompactionOutcome, CompactionPolicy, ConversationStore, MnemeCoreError, ShortTermMemory,
    TranscriptSummarizer,
};
use mneme_rs_protocol::{Author, Event};
use mneme_rs_storage::{InProcessBackend, RelationalBackend};
use mneme_rs_test_utils::{FailingSummarizer, FixedSummarizer, FlakyBackend, RecordingSummarizer};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::tempdir;

fn in_process_store() -> Arc<ConversationStore> {
    Arc::new(ConversationStore::new(Arc::new(InProcessBackend::new())))
}

/// A single appended event is read back unchanged.
#[tokio::test]
async fn create_append_get() {
    let store = in_process_store();
    store
        .create_conversation("app1", "u1", "s1")
        .await
        .expect("create");
    store
        .append_event("app1", "u1", "s1", Event::text(Author::User, "hello"))
        .await
        .expect("append");
    let conversation = store.get_conversation("app1", "u1", "s1").await.expect("get");
    assert_eq!(conversation.events.len(), 1);
    assert_eq!(conversation.events[0].author, Author::User);
    assert_eq!(conversation.events[0].text_content(), "hello");
}

/// interval=3, overlap=1: the log collapses to [summary, last event] at each boundary.
#[tokio::test]
async fn sliding_window_compaction() {
    let memory = ShortTermMemory::with_policy(
        in_process_store(),
        Arc::new(FixedSummarizer::new("summary")),
        CompactionPolicy::new(3, 1).expect("policy"),
    )
    .expect("memory");
    let events = (1..=5)
        .map(|idx| Event::text(Author::User, format!("event{idx}")))
        .collect::<Vec<_>>();

    let mut outcomes = Vec::new();
    for event in events.iter().cloned() {
        let outcome = memory
            .record_turn("app", "u1", "c1", event)
            .await
            .expect("turn");
        outcomes.push(outcome);
    }

    let compacted = outcomes
        .iter()
        .map(|outcome| outcome.compaction.is_compacted())
        .collect::<Vec<_>>();
    assert_eq!(compacted, vec![false, false, true, false, true]);

    let after_third = &outcomes[2].conversation;
    assert_eq!(after_third.events.len(), 2);
    assert!(after_third.events[0].is_summary());
    assert_eq!(after_third.events[0].author, Author::System);
    assert_eq!(after_third.events[1], events[2]);
    let span = after_third.events[0].compacted.clone().expect("span");
    assert_eq!(span.first_event_id, events[0].id);
    assert_eq!(span.last_event_id, events[1].id);
    assert_eq!(span.event_count, 2);

    let after_fifth = memory
        .get_conversation("app", "u1", "c1")
        .await
        .expect("get");
    assert_eq!(after_fifth.events.len(), 2);
    assert!(after_fifth.events[0].is_summary());
    assert_eq!(after_fifth.events[1], events[4]);
    let span = after_fifth.events[0].compacted.clone().expect("span");
    assert_eq!(span.event_count, 3);
}

/// The last `overlap` events survive compaction byte for byte.
#[tokio::test]
async fn overlap_events_are_retained_verbatim() {
    let memory = ShortTermMemory::with_policy(
        in_process_store(),
        Arc::new(TranscriptSummarizer::default()),
        CompactionPolicy::new(4, 2).expect("policy"),
    )
    .expect("memory");
    let events = (0..4)
        .map(|idx| Event::text(Author::Agent, format!("turn {idx}")))
        .collect::<Vec<_>>();
    for event in events.iter().cloned() {
        memory
            .record_turn("app", "u1", "c1", event)
            .await
            .expect("turn");
    }
    let after = memory
        .get_conversation("app", "u1", "c1")
        .await
        .expect("get");
    assert_eq!(after.events.len(), 1 + 2);
    assert!(after.events[0].is_summary());
    let expected_tail = serde_json::to_string(&events[2..]).expect("json");
    let actual_tail = serde_json::to_string(&after.events[1..]).expect("json");
    assert_eq!(actual_tail, expected_tail);
}

/// A failing summarizer leaves the conversation uncompacted and retries on the next turn.
#[tokio::test]
async fn summarizer_failure_is_not_fatal() {
    let memory = ShortTermMemory::with_policy(
        in_process_store(),
        Arc::new(FailingSummarizer),
        CompactionPolicy::new(2, 1).expect("policy"),
    )
    .expect("memory");
    for idx in 0..3 {
        let outcome = memory
            .record_turn("app", "u1", "c1", Event::text(Author::User, format!("{idx}")))
            .await
            .expect("turn");
        if idx >= 1 {
            assert!(matches!(
                outcome.compaction,
                CompactionOutcome::Failed { .. }
            ));
        }
    }
    let conversation = memory
        .get_conversation("app", "u1", "c1")
        .await
        .expect("get");
    assert_eq!(conversation.events.len(), 3);
    assert!(conversation.events.iter().all(|event| !event.is_summary()));
}

/// Deleted conversations are gone.
#[tokio::test]
async fn delete_then_get_is_not_found() {
    let store = in_process_store();
    store
        .create_conversation("app", "u1", "c1")
        .await
        .expect("create");
    store
        .delete_conversation("app", "u1", "c1")
        .await
        .expect("delete");
    let err = store
        .get_conversation("app", "u1", "c1")
        .await
        .unwrap_err();
    assert!(matches!(err, MnemeCoreError::NotFound(_)));
    let err = store
        .delete_conversation("app", "u1", "c1")
        .await
        .unwrap_err();
    assert!(matches!(err, MnemeCoreError::NotFound(_)));
}

/// Concurrent appends to one conversation all land, in a total order.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_are_serialized() {
    let temp = tempdir().expect("tempdir");
    let backend = RelationalBackend::open(temp.path().join("stm.db")).expect("sqlite");
    let store = Arc::new(ConversationStore::new(Arc::new(backend)));
    store
        .create_conversation("app", "u1", "c1")
        .await
        .expect("create");

    let appends = (0..32).map(|idx| {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .append_event("app", "u1", "c1", Event::text(Author::User, format!("{idx}")))
                .await
        })
    });
    let mut indices = join_all(appends)
        .await
        .into_iter()
        .map(|joined| joined.expect("join").expect("append"))
        .collect::<Vec<_>>();
    indices.sort_unstable();
    assert_eq!(indices, (0..32).collect::<Vec<_>>());

    let conversation = store.get_conversation("app", "u1", "c1").await.expect("get");
    assert_eq!(conversation.events.len(), 32);
}

/// Program-order appends are read back in the same order.
#[tokio::test]
async fn appends_preserve_program_order() {
    let store = in_process_store();
    store
        .create_conversation("app", "u1", "c1")
        .await
        .expect("create");
    let mut ids = Vec::new();
    for idx in 0..10 {
        let event = Event::text(Author::User, format!("{idx}"));
        ids.push(event.id);
        store
            .append_event("app", "u1", "c1", event)
            .await
            .expect("append");
    }
    let conversation = store.get_conversation("app", "u1", "c1").await.expect("get");
    let stored = conversation
        .events
        .iter()
        .map(|event| event.id)
        .collect::<Vec<_>>();
    assert_eq!(stored, ids);
}

/// Events appended while the summarizer runs are kept after the summary.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn appends_during_compaction_are_kept() {
    let store = in_process_store();
    let summarizer = Arc::new(RecordingSummarizer::paused());
    let memory = Arc::new(ShortTermMemory::with_policy(
        store.clone(),
        summarizer.clone(),
        CompactionPolicy::new(3, 1).expect("policy"),
    )
    .expect("memory"));
    for idx in 0..2 {
        memory
            .record_turn("app", "u1", "c1", Event::text(Author::User, format!("{idx}")))
            .await
            .expect("turn");
    }

    let compacting = {
        let memory = memory.clone();
        tokio::spawn(async move {
            memory
                .record_turn("app", "u1", "c1", Event::text(Author::User, "2"))
                .await
        })
    };
    summarizer.wait_started().await;
    let late = Event::text(Author::Agent, "late reply");
    store
        .append_event("app", "u1", "c1", late.clone())
        .await
        .expect("append during compaction");
    summarizer.release();

    let outcome = compacting.await.expect("join").expect("turn");
    assert!(outcome.compaction.is_compacted());
    let conversation = store.get_conversation("app", "u1", "c1").await.expect("get");
    let texts = conversation
        .events
        .iter()
        .map(|event| event.text_content())
        .collect::<Vec<_>>();
    assert!(conversation.events[0].is_summary());
    assert_eq!(texts[1..].to_vec(), vec!["2".to_string(), "late reply".to_string()]);
    assert_eq!(summarizer.calls().len(), 1);
    assert_eq!(summarizer.calls()[0].len(), 2);
}

/// Connectivity failures surface as retryable errors.
#[tokio::test]
async fn backend_unavailable_is_retryable() {
    let flaky = Arc::new(FlakyBackend::new(Arc::new(InProcessBackend::new())));
    let store = ConversationStore::new(flaky.clone());
    store
        .create_conversation("app", "u1", "c1")
        .await
        .expect("create");
    flaky.fail_next(1);
    let err = store
        .append_event("app", "u1", "c1", Event::text(Author::User, "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, MnemeCoreError::BackendUnavailable(_)));
    assert!(err.is_retryable());
    store
        .append_event("app", "u1", "c1", Event::text(Author::User, "x"))
        .await
        .expect("retry succeeds");
}

/// Tenants never see each other's conversations.
#[tokio::test]
async fn conversations_are_isolated_per_tenant() {
    let store = in_process_store();
    store
        .create_conversation("appA", "userA", "shared-id")
        .await
        .expect("create");
    let err = store
        .get_conversation("appB", "userA", "shared-id")
        .await
        .unwrap_err();
    assert!(matches!(err, MnemeCoreError::NotFound(_)));
    assert!(
        store
            .list_conversations("appA", "userB")
            .await
            .expect("list")
            .is_empty()
    );
}

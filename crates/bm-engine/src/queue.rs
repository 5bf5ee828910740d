//! Work-queue bookkeeping: TTL strategy, deduplication, attempt cap, and
//! ack handling (spec.md §4.7).

use crate::config::EngineConfig;
use bm_core::{Error, Generation, Id, Message, MessageStatus, QueueRecord, Result, TaskKind};
use bm_store::Store;
use std::collections::HashMap;

/// Periodic counterpart to [`crate::resolver::resolve`]'s lazy dedup
/// (spec.md §8 scenario 6): collapse every ripe-hash with more than one
/// stored pubkey down to the one with the latest `time`, independent of
/// whether anything ever calls `resolve` for that address again.
pub fn dedup_stored_pubkeys<S: Store>(store: &S) -> Result<usize> {
    let all = store
        .list_pubkeys()
        .map_err(|e| Error::StoreError(e.to_string()))?;

    let mut by_ripe: HashMap<[u8; 20], Vec<_>> = HashMap::new();
    for pubkey in all {
        by_ripe.entry(pubkey.ripe).or_default().push(pubkey);
    }

    let mut dropped = 0;
    for (ripe, mut pubkeys) in by_ripe {
        if pubkeys.len() <= 1 {
            continue;
        }
        pubkeys.sort_by_key(|p| p.time);
        let newest = pubkeys.pop().expect("len > 1 checked above");
        for duplicate in pubkeys {
            store
                .delete_pubkey(duplicate.id)
                .map_err(|e| Error::StoreError(e.to_string()))?;
            tracing::warn!(
                ripe = ?ripe,
                pubkey_id = duplicate.id,
                kept_id = newest.id,
                "dropped duplicate stored pubkey on periodic sweep"
            );
            dropped += 1;
        }
    }
    Ok(dropped)
}

/// TTL, in seconds, for a record's next attempt given its current generation.
pub fn ttl_for(generation: Generation, config: &EngineConfig) -> i64 {
    match generation {
        Generation::First => config.first_attempt_ttl,
        Generation::Subsequent => config.subsequent_attempts_ttl,
    }
}

/// Advance `record` to its next generation/trigger-time after a failed
/// attempt (spec.md §4.7's retry action, §5's "attempt count incremented,
/// trigger-time bumped by back-off capped at the TTL boundary").
pub fn schedule_retry(record: &mut QueueRecord, now: i64, config: &EngineConfig) {
    record.attempts += 1;
    record.generation = Generation::from_attempts(record.attempts);
    record.trigger_time = now + ttl_for(record.generation, config);
}

/// `attempts > MAXIMUM_ATTEMPTS` ⇒ the record is dropped and its message
/// marked failed (spec.md §4.7, §8 "Attempt cap").
pub fn enforce_attempt_cap<S: Store>(
    store: &S,
    record: &QueueRecord,
    config: &EngineConfig,
) -> Result<bool> {
    if record.attempts <= config.maximum_attempts {
        return Ok(false);
    }
    if let Some(message_id) = record.object0 {
        if let Some(mut message) = store
            .get_message(message_id)
            .map_err(|e| Error::StoreError(e.to_string()))?
        {
            message.status = MessageStatus::Failed;
            store
                .put_message(&message)
                .map_err(|e| Error::StoreError(e.to_string()))?;
        }
    }
    store
        .delete_queue_record(record.id)
        .map_err(|e| Error::StoreError(e.to_string()))?;
    tracing::warn!(
        record_id = record.id,
        attempts = record.attempts,
        "queue record exceeded maximum attempts, message marked failed"
    );
    Ok(true)
}

/// On a matching acknowledgement, delete every `send-message`-flow record
/// for `message_id` and mark the message delivered (spec.md §4.7 "Ack
/// handling"). Deletes across every task in the send flow, not only
/// `send-message`, since a delivered ack supersedes the whole flow.
pub fn handle_ack<S: Store>(store: &S, message_id: Id) -> Result<()> {
    for task in [
        TaskKind::SendMessage,
        TaskKind::ProcessOutgoingMessage,
        TaskKind::DisseminateMessage,
    ] {
        for record in store
            .queue_records_for(task, Some(message_id))
            .map_err(|e| Error::StoreError(e.to_string()))?
        {
            store
                .delete_queue_record(record.id)
                .map_err(|e| Error::StoreError(e.to_string()))?;
        }
    }
    if let Some(mut message) = store
        .get_message(message_id)
        .map_err(|e| Error::StoreError(e.to_string()))?
    {
        message.status = MessageStatus::Delivered;
        store
            .put_message(&message)
            .map_err(|e| Error::StoreError(e.to_string()))?;
    }
    Ok(())
}

/// Deduplication pass (spec.md §4.7, §8 "Queue uniqueness"): for each
/// `(task, object0)` pair keep at most one record per generation; delete
/// extras; if a first-generation record and a subsequent-generation record
/// would otherwise race, push the subsequent one out past the first's TTL.
pub fn enforce_uniqueness<S: Store>(store: &S, config: &EngineConfig) -> Result<()> {
    let all = store
        .list_queue_records()
        .map_err(|e| Error::StoreError(e.to_string()))?;

    let mut groups: HashMap<(TaskKind, Option<Id>), Vec<QueueRecord>> = HashMap::new();
    for record in all {
        groups.entry((record.task, record.object0)).or_default().push(record);
    }

    for ((task, object0), mut records) in groups {
        records.sort();

        let mut first: Option<QueueRecord> = None;
        let mut subsequent: Option<QueueRecord> = None;
        for record in records {
            let slot = match record.generation {
                Generation::First => &mut first,
                Generation::Subsequent => &mut subsequent,
            };
            match slot {
                None => *slot = Some(record),
                Some(kept) => {
                    tracing::warn!(
                        task = ?task,
                        object0,
                        duplicate_id = record.id,
                        kept_id = kept.id,
                        "dropping duplicate queue record"
                    );
                    store
                        .delete_queue_record(record.id)
                        .map_err(|e| Error::StoreError(e.to_string()))?;
                }
            }
        }

        if let (Some(first), Some(mut subsequent)) = (first.clone(), subsequent) {
            let earliest_allowed = first.trigger_time + ttl_for(first.generation, config);
            if subsequent.trigger_time < earliest_allowed {
                subsequent.trigger_time = earliest_allowed;
                store
                    .put_queue_record(&subsequent)
                    .map_err(|e| Error::StoreError(e.to_string()))?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bm_store::SledStore;

    fn record(id: Id, task: TaskKind, trigger_time: i64, generation: Generation, object0: Option<Id>) -> QueueRecord {
        QueueRecord {
            id,
            task,
            trigger_time,
            attempts: match generation {
                Generation::First => 0,
                Generation::Subsequent => 1,
            },
            generation,
            object0,
            object1: None,
            object2: None,
        }
    }

    #[test]
    fn schedule_retry_advances_generation_and_trigger_time() {
        let config = EngineConfig::default();
        let mut record = record(1, TaskKind::SendMessage, 0, Generation::First, Some(1));
        schedule_retry(&mut record, 100, &config);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.generation, Generation::Subsequent);
        assert_eq!(record.trigger_time, 100 + config.subsequent_attempts_ttl);
    }

    #[test]
    fn attempt_cap_marks_message_failed_and_deletes_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let config = EngineConfig::default();

        let message = Message {
            id: 1,
            subject: "s".into(),
            body: "b".into(),
            sender_address_id: 1,
            recipient_address: "BM-x".into(),
            status: MessageStatus::Sending,
            ack_id: None,
        };
        store.put_message(&message).unwrap();

        let mut over_cap = record(1, TaskKind::SendMessage, 0, Generation::Subsequent, Some(1));
        over_cap.attempts = config.maximum_attempts + 1;
        store.put_queue_record(&over_cap).unwrap();

        let capped = enforce_attempt_cap(&store, &over_cap, &config).unwrap();
        assert!(capped);
        assert_eq!(
            store.get_message(1).unwrap().unwrap().status,
            MessageStatus::Failed
        );
        assert!(store.list_queue_records().unwrap().is_empty());
    }

    #[test]
    fn handle_ack_deletes_flow_records_and_marks_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();

        let message = Message {
            id: 1,
            subject: "s".into(),
            body: "b".into(),
            sender_address_id: 1,
            recipient_address: "BM-x".into(),
            status: MessageStatus::WaitingForAck,
            ack_id: Some([1u8; 32]),
        };
        store.put_message(&message).unwrap();
        store
            .put_queue_record(&record(1, TaskKind::SendMessage, 0, Generation::First, Some(1)))
            .unwrap();
        store
            .put_queue_record(&record(
                2,
                TaskKind::DisseminateMessage,
                100,
                Generation::First,
                Some(1),
            ))
            .unwrap();

        handle_ack(&store, 1).unwrap();

        assert!(store.list_queue_records().unwrap().is_empty());
        assert_eq!(
            store.get_message(1).unwrap().unwrap().status,
            MessageStatus::Delivered
        );
    }

    #[test]
    fn uniqueness_pass_drops_extra_duplicates_and_keeps_one_per_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let config = EngineConfig::default();

        store
            .put_queue_record(&record(1, TaskKind::SendMessage, 100, Generation::First, Some(1)))
            .unwrap();
        store
            .put_queue_record(&record(2, TaskKind::SendMessage, 50, Generation::First, Some(1)))
            .unwrap();
        store
            .put_queue_record(&record(
                3,
                TaskKind::SendMessage,
                3700,
                Generation::Subsequent,
                Some(1),
            ))
            .unwrap();

        enforce_uniqueness(&store, &config).unwrap();

        let remaining = store.queue_records_for(TaskKind::SendMessage, Some(1)).unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().any(|r| r.id == 2));
        assert!(remaining.iter().any(|r| r.id == 3));
    }

    #[test]
    fn periodic_dedup_keeps_the_pubkey_with_the_latest_time() {
        use bm_core::Pubkey;

        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let ripe = [9u8; 20];

        let older = Pubkey {
            id: 1,
            address_version: 2,
            stream: 1,
            behaviour_bitfield: 0,
            public_signing_key: vec![1; 64],
            public_encryption_key: vec![2; 64],
            nonce_trials_per_byte: 320,
            extra_bytes: 14_000,
            signature: None,
            pow_nonce: 0,
            time: 1000,
            ripe,
            address_id: None,
        };
        let mut newer = older.clone();
        newer.id = 2;
        newer.time = 2000;
        store.put_pubkey(&older).unwrap();
        store.put_pubkey(&newer).unwrap();

        let dropped = dedup_stored_pubkeys(&store).unwrap();
        assert_eq!(dropped, 1);

        let remaining = store.list_pubkeys_by_ripe(&ripe).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, 2);
        assert_eq!(remaining[0].time, 2000);
    }

    #[test]
    fn uniqueness_pass_pushes_subsequent_record_past_first_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let config = EngineConfig::default();

        store
            .put_queue_record(&record(1, TaskKind::SendMessage, 100, Generation::First, Some(1)))
            .unwrap();
        store
            .put_queue_record(&record(
                2,
                TaskKind::SendMessage,
                200, // would race with the first record's TTL window
                Generation::Subsequent,
                Some(1),
            ))
            .unwrap();

        enforce_uniqueness(&store, &config).unwrap();

        let remaining = store.queue_records_for(TaskKind::SendMessage, Some(1)).unwrap();
        let subsequent = remaining
            .iter()
            .find(|r| r.generation == Generation::Subsequent)
            .unwrap();
        assert_eq!(subsequent.trigger_time, 100 + config.first_attempt_ttl);
    }
}

//! Pure, DB-free logic for the `data.status_transition` audit log.
//!
//! Isolated from [`crate::meetings`] so the copy-on-write rebuild and the
//! legacy `status_transitions` (plural) migration — the two trickiest
//! bits of the audit-log bookkeeping — are unit-testable without a live
//! Postgres instance.

use chrono::{DateTime, Utc};
use mb_fsm::{CompletionReason, FailureStage, Status, TransitionSource};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry in the canonical `status_transition` audit list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: Status,
    pub to: Status,
    pub timestamp: DateTime<Utc>,
    pub source: TransitionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_reason: Option<CompletionReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_stage: Option<FailureStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Value>,
    /// Caller-supplied metadata (e.g. `exit_code`), merged in without
    /// overwriting any of the fixed fields above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Rebuild the `data` JSONB object as a fresh [`Value`] (copy-on-write)
/// with `record` appended to `status_transition` and the deprecated
/// `status_transitions` key migrated away.
///
/// `patch` applies additional top-level keys (`last_error`,
/// `stop_requested`) atomically with the same rebuild so a single store
/// write commits both the audit entry and any caller-supplied side data.
pub fn rebuild_data(existing: &Value, record: &TransitionRecord, patch: &Map<String, Value>) -> Value {
    let mut data = existing.as_object().cloned().unwrap_or_default();

    let mut list: Vec<Value> = match data.remove("status_transition") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    // Deprecated plural key: merge any prior entries ahead of the
    // canonical list, then drop the key entirely.
    if let Some(Value::Array(legacy)) = data.remove("status_transitions") {
        let mut merged = legacy;
        merged.extend(list);
        list = merged;
    }

    list.push(serde_json::to_value(record).expect("TransitionRecord always serializes"));
    data.insert("status_transition".into(), Value::Array(list));

    for (k, v) in patch {
        data.insert(k.clone(), v.clone());
    }

    Value::Object(data)
}

/// Apply only the deprecated-key migration (invariant 3), without
/// appending a transition. Used by [`crate::meetings::MeetingsRepository::set_stop_requested`]
/// and other non-transition writes that still touch `data`.
pub fn migrate_legacy_key(existing: &Value) -> Value {
    let mut data = existing.as_object().cloned().unwrap_or_default();
    if let Some(Value::Array(legacy)) = data.remove("status_transitions") {
        let mut list: Vec<Value> = match data.remove("status_transition") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let mut merged = legacy;
        merged.extend(list.drain(..));
        data.insert("status_transition".into(), Value::Array(merged));
    }
    Value::Object(data)
}

/// Parse the `status_transition` list back out of a `data` object, in
/// order. Used by tests and by audit-completeness checks.
pub fn transitions_of(data: &Value) -> Vec<TransitionRecord> {
    data.get("status_transition")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(from: Status, to: Status) -> TransitionRecord {
        TransitionRecord {
            from,
            to,
            timestamp: Utc::now(),
            source: TransitionSource::Bot,
            reason: None,
            completion_reason: None,
            failure_stage: None,
            error_details: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn appends_to_empty_list() {
        let data = json!({});
        let rec = record(Status::Requested, Status::Joining);
        let rebuilt = rebuild_data(&data, &rec, &Map::new());
        let list = transitions_of(&rebuilt);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].from, Status::Requested);
        assert_eq!(list[0].to, Status::Joining);
    }

    #[test]
    fn is_append_only_across_calls() {
        let data = json!({});
        let rec1 = record(Status::Requested, Status::Joining);
        let after1 = rebuild_data(&data, &rec1, &Map::new());
        let rec2 = record(Status::Joining, Status::Active);
        let after2 = rebuild_data(&after1, &rec2, &Map::new());

        let list = transitions_of(&after2);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].to, Status::Joining);
        assert_eq!(list[1].to, Status::Active);
    }

    #[test]
    fn migrates_deprecated_plural_key_ahead_of_canonical_entries() {
        let legacy_entry = json!({
            "from": "requested", "to": "joining", "timestamp": Utc::now(),
            "source": "bot"
        });
        let data = json!({ "status_transitions": [legacy_entry] });
        let rec = record(Status::Joining, Status::Active);
        let rebuilt = rebuild_data(&data, &rec, &Map::new());

        assert!(rebuilt.get("status_transitions").is_none());
        let list = transitions_of(&rebuilt);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].to, Status::Joining);
        assert_eq!(list[1].to, Status::Active);
    }

    #[test]
    fn patch_sets_additional_top_level_keys() {
        let data = json!({});
        let rec = record(Status::Active, Status::Failed);
        let mut patch = Map::new();
        patch.insert("last_error".into(), json!({"exit_code": 1}));
        let rebuilt = rebuild_data(&data, &rec, &patch);

        assert_eq!(rebuilt["last_error"]["exit_code"], 1);
    }

    #[test]
    fn migrate_legacy_key_without_transition_merges_and_removes_plural() {
        let data = json!({
            "status_transitions": [{"from": "requested", "to": "joining", "timestamp": Utc::now(), "source": "bot"}],
            "status_transition": [{"from": "joining", "to": "active", "timestamp": Utc::now(), "source": "bot"}]
        });
        let migrated = migrate_legacy_key(&data);
        assert!(migrated.get("status_transitions").is_none());
        let list = transitions_of(&migrated);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].to, Status::Joining);
        assert_eq!(list[1].to, Status::Active);
    }

    #[test]
    fn extra_metadata_does_not_clobber_fixed_fields() {
        let data = json!({});
        let mut rec = record(Status::Active, Status::Completed);
        rec.extra.insert("exit_code".into(), json!(0));
        let rebuilt = rebuild_data(&data, &rec, &Map::new());
        let list = transitions_of(&rebuilt);
        assert_eq!(list[0].from, Status::Active);
        assert_eq!(list[0].to, Status::Completed);
        assert_eq!(list[0].extra.get("exit_code"), Some(&json!(0)));
    }

    /// S1 — happy path: requested -> joining -> awaiting_admission -> active
    /// -> completed, every hop admitted by the FSM and recorded in order.
    #[test]
    fn s1_happy_path_produces_one_ordered_entry_per_hop() {
        let hops = [
            (Status::Requested, Status::Joining, TransitionSource::Bot),
            (Status::Joining, Status::AwaitingAdmission, TransitionSource::Bot),
            (Status::AwaitingAdmission, Status::Active, TransitionSource::Bot),
            (Status::Active, Status::Completed, TransitionSource::Bot),
        ];

        let mut data = json!({});
        for (from, to, source) in hops {
            assert!(from.can_transition_to(to), "{from:?} -> {to:?} must be admitted");
            let mut rec = record(from, to);
            rec.source = source;
            if to == Status::Completed {
                rec.completion_reason = Some(CompletionReason::Stopped);
            }
            data = rebuild_data(&data, &rec, &Map::new());
        }

        let list = transitions_of(&data);
        assert_eq!(list.len(), 4);
        assert_eq!(
            list.iter().map(|r| r.to).collect::<Vec<_>>(),
            vec![Status::Joining, Status::AwaitingAdmission, Status::Active, Status::Completed]
        );
        assert!(list.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(list.last().unwrap().completion_reason, Some(CompletionReason::Stopped));
    }

    /// S4 — crash: a nonzero exit from ACTIVE lands in FAILED with
    /// `failure_stage` and `last_error` both recorded on the same write.
    #[test]
    fn s4_crash_records_failure_stage_and_last_error_together() {
        let data = json!({});
        let mut rec = record(Status::Active, Status::Failed);
        rec.source = TransitionSource::Bot;
        rec.failure_stage = Some(FailureStage::Active);
        rec.reason = Some("crash".into());
        rec.error_details = Some(json!({"trace": "..."}));

        let mut patch = Map::new();
        patch.insert("last_error".into(), json!({"exit_code": 1}));
        let rebuilt = rebuild_data(&data, &rec, &patch);

        let list = transitions_of(&rebuilt);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].to, Status::Failed);
        assert_eq!(list[0].failure_stage, Some(FailureStage::Active));
        assert_eq!(rebuilt["last_error"]["exit_code"], 1);
        assert!(Status::Failed.is_terminal());
    }
}

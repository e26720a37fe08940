use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

pub mod status {
    pub const IN_PROGRESS: &str = "in_progress";
    pub const COMPLETED: &str = "completed";
    pub const CANCELLED: &str = "cancelled";
}

/// One numbered attempt at a test type. `questions_snapshot` is written once
/// at start and never regenerated; everything mutable lives in
/// `attempt_metadata`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub test_type: String,
    pub assignment_id: Option<Uuid>,
    pub attempt_number: i32,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub max_questions: Option<i32>,
    pub questions_snapshot: JsonValue,
    pub attempt_metadata: JsonValue,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TestAttempt {
    pub fn metadata(&self) -> AttemptMetadata {
        serde_json::from_value(self.attempt_metadata.clone()).unwrap_or_default()
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == status::IN_PROGRESS
    }
}

/// Structured attempt metadata, serialized as one JSON unit per update.
/// Groups the independent concerns the attempt carries: configuration
/// provenance, the follow-up ledger, the answer trail and the final score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttemptMetadata {
    pub config_id: Option<Uuid>,
    pub config_version: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_category: Option<String>,
    /// Follow-up counters keyed by base-question index. Submissions arrive
    /// out of order, so the key is the index, never the arrival position.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub follow_up_counts: BTreeMap<String, i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<AnswerRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: Uuid,
    pub question_index: i32,
    pub is_follow_up: bool,
    pub base_question_index: i32,
    pub follow_up_sequence: i32,
    pub answer_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    pub submitted_at: DateTime<Utc>,
}

/// Caller-supplied answer payload, already validated at the route boundary.
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub question_index: i32,
    pub is_follow_up: bool,
    pub base_question_index: Option<i32>,
    pub follow_up_sequence: Option<i32>,
    pub answer_text: String,
    pub duration_seconds: Option<i32>,
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Clone)]
pub struct LedgerOutcome {
    pub record: AnswerRecord,
    /// Whether this submission consumed follow-up quota.
    pub counted: bool,
    pub total_follow_ups_for_base: i32,
    pub remaining_follow_ups: i32,
    pub can_generate_follow_up: bool,
    pub max_follow_ups: i32,
}

impl AttemptMetadata {
    /// Append one answer and settle the follow-up ledger for its base
    /// question. Over-quota follow-ups are stored but never counted; their
    /// reported sequence number is informational only.
    pub fn record_answer(
        &mut self,
        answer: NewAnswer,
        quota: i32,
        now: DateTime<Utc>,
    ) -> LedgerOutcome {
        let base_index = answer.base_question_index.unwrap_or(answer.question_index);
        let key = base_index.to_string();
        let current = self.follow_up_counts.get(&key).copied().unwrap_or(0);

        let (sequence, total, counted) = if answer.is_follow_up {
            if current >= quota {
                (answer.follow_up_sequence.unwrap_or(current + 1), current, false)
            } else {
                let next = current + 1;
                self.follow_up_counts.insert(key, next);
                (next, next, true)
            }
        } else {
            let total = *self.follow_up_counts.entry(key).or_insert(0);
            (0, total, false)
        };

        let remaining = (quota - total).max(0);
        let can_generate_follow_up = if answer.is_follow_up {
            remaining > 0
        } else {
            quota > 0
        };

        let record = AnswerRecord {
            id: Uuid::new_v4(),
            question_index: answer.question_index,
            is_follow_up: answer.is_follow_up,
            base_question_index: base_index,
            follow_up_sequence: sequence,
            answer_text: answer.answer_text,
            duration_seconds: answer.duration_seconds,
            metadata: answer.metadata,
            submitted_at: now,
        };
        self.answers.push(record.clone());

        LedgerOutcome {
            record,
            counted,
            total_follow_ups_for_base: total,
            remaining_follow_ups: remaining,
            can_generate_follow_up,
            max_follow_ups: quota,
        }
    }

    /// Merge finalization payload: the score object verbatim, the answers as
    /// a count only. The detailed trail already lives in `answers`.
    pub fn apply_completion(&mut self, score: Option<JsonValue>, answers: Option<&[JsonValue]>) {
        if let Some(score) = score {
            self.score = Some(score);
        }
        if let Some(answers) = answers {
            self.answers_count = Some(answers.len() as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base(question_index: i32) -> NewAnswer {
        NewAnswer {
            question_index,
            is_follow_up: false,
            base_question_index: None,
            follow_up_sequence: None,
            answer_text: "base answer".into(),
            duration_seconds: Some(12),
            metadata: None,
        }
    }

    fn follow_up(base_index: i32) -> NewAnswer {
        NewAnswer {
            question_index: base_index,
            is_follow_up: true,
            base_question_index: Some(base_index),
            follow_up_sequence: None,
            answer_text: "follow-up answer".into(),
            duration_seconds: None,
            metadata: None,
        }
    }

    #[test]
    fn base_answer_initializes_counter_at_zero() {
        let mut meta = AttemptMetadata::default();
        let out = meta.record_answer(base(0), 2, Utc::now());
        assert_eq!(out.record.follow_up_sequence, 0);
        assert_eq!(out.total_follow_ups_for_base, 0);
        assert_eq!(out.remaining_follow_ups, 2);
        assert!(out.can_generate_follow_up);
        assert_eq!(meta.follow_up_counts.get("0"), Some(&0));
        assert_eq!(meta.answers.len(), 1);
    }

    #[test]
    fn base_answer_with_zero_quota_cannot_generate() {
        let mut meta = AttemptMetadata::default();
        let out = meta.record_answer(base(0), 0, Utc::now());
        assert!(!out.can_generate_follow_up);
        assert_eq!(out.remaining_follow_ups, 0);
    }

    #[test]
    fn third_follow_up_is_stored_but_not_counted() {
        let mut meta = AttemptMetadata::default();
        meta.record_answer(base(0), 2, Utc::now());

        let first = meta.record_answer(follow_up(0), 2, Utc::now());
        assert!(first.counted);
        assert_eq!(first.record.follow_up_sequence, 1);
        assert_eq!(first.remaining_follow_ups, 1);
        assert!(first.can_generate_follow_up);

        let second = meta.record_answer(follow_up(0), 2, Utc::now());
        assert!(second.counted);
        assert_eq!(second.record.follow_up_sequence, 2);
        assert_eq!(second.remaining_follow_ups, 0);
        assert!(!second.can_generate_follow_up);

        let third = meta.record_answer(follow_up(0), 2, Utc::now());
        assert!(!third.counted);
        assert_eq!(third.total_follow_ups_for_base, 2);
        assert_eq!(third.remaining_follow_ups, 0);
        assert!(!third.can_generate_follow_up);

        // stored anyway
        assert_eq!(meta.answers.len(), 4);
        // counter untouched by the over-cap submission
        assert_eq!(meta.follow_up_counts.get("0"), Some(&2));
    }

    #[test]
    fn counters_are_independent_per_base_question() {
        let mut meta = AttemptMetadata::default();
        meta.record_answer(follow_up(3), 1, Utc::now());
        meta.record_answer(follow_up(7), 1, Utc::now());
        assert_eq!(meta.follow_up_counts.get("3"), Some(&1));
        assert_eq!(meta.follow_up_counts.get("7"), Some(&1));
    }

    #[test]
    fn follow_up_without_base_index_uses_question_index() {
        let mut meta = AttemptMetadata::default();
        let mut answer = follow_up(5);
        answer.base_question_index = None;
        let out = meta.record_answer(answer, 2, Utc::now());
        assert_eq!(out.record.base_question_index, 5);
        assert_eq!(meta.follow_up_counts.get("5"), Some(&1));
    }

    #[test]
    fn over_cap_sequence_prefers_caller_supplied_value() {
        let mut meta = AttemptMetadata::default();
        meta.record_answer(follow_up(0), 1, Utc::now());
        let mut answer = follow_up(0);
        answer.follow_up_sequence = Some(9);
        let out = meta.record_answer(answer, 1, Utc::now());
        assert!(!out.counted);
        assert_eq!(out.record.follow_up_sequence, 9);
    }

    #[test]
    fn completion_merges_score_and_counts_answers() {
        let mut meta = AttemptMetadata::default();
        let answers = vec![json!({"q": 0}), json!({"q": 1})];
        meta.apply_completion(Some(json!({"overall": 4.2})), Some(&answers));
        assert_eq!(meta.score, Some(json!({"overall": 4.2})));
        assert_eq!(meta.answers_count, Some(2));

        // absent payload leaves prior values alone
        meta.apply_completion(None, None);
        assert_eq!(meta.answers_count, Some(2));
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let mut meta = AttemptMetadata {
            config_id: Some(Uuid::new_v4()),
            config_version: Some(3),
            role_category: Some("Sales Manager".into()),
            ..Default::default()
        };
        meta.record_answer(base(0), 2, Utc::now());
        meta.record_answer(follow_up(0), 2, Utc::now());

        let value = serde_json::to_value(&meta).unwrap();
        let back: AttemptMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back.config_version, Some(3));
        assert_eq!(back.answers.len(), 2);
        assert_eq!(back.follow_up_counts.get("0"), Some(&1));
    }
}

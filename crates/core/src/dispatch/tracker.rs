use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::crm::ObjectId;
use crate::workflow::{WorkflowError, WorkflowOutcome, WorkflowStage};

/// Status of a tracked run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded {
        outcome: WorkflowOutcome,
    },
    Failed {
        stage: WorkflowStage,
        message: String,
        retryable: bool,
    },
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub contact_id: ObjectId,
    #[serde(flatten)]
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Runs {
    by_id: HashMap<Uuid, RunRecord>,
    /// Insertion order, oldest first.
    order: VecDeque<Uuid>,
}

/// In-memory record of recent runs.
///
/// Holds at most `capacity` finished runs; running ones are never evicted.
pub struct RunTracker {
    runs: RwLock<Runs>,
    capacity: usize,
}

impl RunTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            runs: RwLock::new(Runs::default()),
            capacity: capacity.max(1),
        }
    }

    /// Register a new running run.
    pub async fn start(&self, contact_id: ObjectId) -> Uuid {
        let id = Uuid::new_v4();
        let record = RunRecord {
            id,
            contact_id,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
        };

        let mut runs = self.runs.write().await;
        runs.by_id.insert(id, record);
        runs.order.push_back(id);
        self.evict(&mut runs);
        id
    }

    /// Record the result of a run.
    pub async fn finish(&self, id: Uuid, result: &Result<WorkflowOutcome, WorkflowError>) {
        let status = match result {
            Ok(outcome) => RunStatus::Succeeded {
                outcome: outcome.clone(),
            },
            Err(e) => RunStatus::Failed {
                stage: e.stage(),
                message: e.to_string(),
                retryable: e.is_retryable(),
            },
        };

        let mut runs = self.runs.write().await;
        if let Some(record) = runs.by_id.get_mut(&id) {
            record.status = status;
            record.finished_at = Some(Utc::now());
        }
        self.evict(&mut runs);
    }

    pub async fn get(&self, id: Uuid) -> Option<RunRecord> {
        self.runs.read().await.by_id.get(&id).cloned()
    }

    /// Most recent runs first.
    pub async fn list(&self, limit: usize) -> Vec<RunRecord> {
        let runs = self.runs.read().await;
        runs.order
            .iter()
            .rev()
            .filter_map(|id| runs.by_id.get(id).cloned())
            .take(limit)
            .collect()
    }

    pub async fn running_count(&self) -> usize {
        self.runs
            .read()
            .await
            .by_id
            .values()
            .filter(|r| !r.status.is_finished())
            .count()
    }

    fn evict(&self, runs: &mut Runs) {
        let mut excess = runs.by_id.len().saturating_sub(self.capacity);
        if excess == 0 {
            return;
        }

        let Runs { by_id, order } = runs;
        order.retain(|id| {
            if excess == 0 {
                return true;
            }
            let finished = by_id.get(id).is_some_and(|r| r.status.is_finished());
            if finished {
                by_id.remove(id);
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::CrmError;

    fn outcome(contact: u64) -> WorkflowOutcome {
        WorkflowOutcome {
            contact_id: ObjectId(contact),
            open_ticket_ids: vec![],
            closed_ticket_count: 0,
            engagement: None,
            created_ticket_id: None,
            associated_ticket_ids: vec![],
            skipped: None,
        }
    }

    #[tokio::test]
    async fn test_start_and_finish_success() {
        let tracker = RunTracker::new(10);
        let id = tracker.start(ObjectId(1)).await;
        assert_eq!(tracker.get(id).await.unwrap().status, RunStatus::Running);
        assert_eq!(tracker.running_count().await, 1);

        tracker.finish(id, &Ok(outcome(1))).await;
        let record = tracker.get(id).await.unwrap();
        assert!(matches!(record.status, RunStatus::Succeeded { .. }));
        assert!(record.finished_at.is_some());
        assert_eq!(tracker.running_count().await, 0);
    }

    #[tokio::test]
    async fn test_finish_failure_records_stage() {
        let tracker = RunTracker::new(10);
        let id = tracker.start(ObjectId(1)).await;
        tracker
            .finish(
                id,
                &Err(WorkflowError::TicketSearch(CrmError::RateLimitExceeded)),
            )
            .await;

        match tracker.get(id).await.unwrap().status {
            RunStatus::Failed {
                stage, retryable, ..
            } => {
                assert_eq!(stage, WorkflowStage::TicketSearch);
                assert!(retryable);
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_eviction_keeps_running_runs() {
        let tracker = RunTracker::new(2);
        let running = tracker.start(ObjectId(1)).await;
        let a = tracker.start(ObjectId(2)).await;
        tracker.finish(a, &Ok(outcome(2))).await;
        let b = tracker.start(ObjectId(3)).await;
        tracker.finish(b, &Ok(outcome(3))).await;

        assert!(tracker.get(running).await.is_some());
        assert!(tracker.get(a).await.is_none());
        assert!(tracker.get(b).await.is_some());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let tracker = RunTracker::new(10);
        let first = tracker.start(ObjectId(1)).await;
        let second = tracker.start(ObjectId(2)).await;

        let runs = tracker.list(10).await;
        assert_eq!(runs[0].id, second);
        assert_eq!(runs[1].id, first);
        assert_eq!(tracker.list(1).await.len(), 1);
    }

    #[test]
    fn test_run_record_serialization() {
        let record = RunRecord {
            id: Uuid::nil(),
            contact_id: ObjectId(5),
            status: RunStatus::Failed {
                stage: WorkflowStage::EngagementScan,
                message: "boom".to_string(),
                retryable: false,
            },
            started_at: Utc::now(),
            finished_at: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["stage"], "engagement_scan");
        assert_eq!(value["contact_id"], 5);
        assert!(value.get("finished_at").is_none());
    }
}

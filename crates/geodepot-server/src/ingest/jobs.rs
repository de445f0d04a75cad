//! Job definitions for the deletion queue
//!
//! Defines the job types and payloads for the apalis job queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dataset deletion job payload
///
/// Enqueued by the remove command after the synchronous checks pass. The
/// worker tears down the catalog store and the database rows; the job is
/// idempotent so redelivery after a crash is safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDatasetJob {
    /// Resource to delete
    pub resource_id: Uuid,
    /// Catalog store identity, captured at enqueue time so the worker can
    /// still reach the store after the row is gone
    pub type_name: String,
    /// User who requested the removal
    pub triggered_by: Option<String>,
    /// Timestamp when the job was created
    pub created_at: DateTime<Utc>,
}

impl DeleteDatasetJob {
    pub fn new(resource_id: Uuid, type_name: impl Into<String>) -> Self {
        Self {
            resource_id,
            type_name: type_name.into(),
            triggered_by: None,
            created_at: Utc::now(),
        }
    }

    /// Set the user who triggered this job
    pub fn with_triggered_by(mut self, user: impl Into<String>) -> Self {
        self.triggered_by = Some(user.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_job_new() {
        let resource_id = Uuid::new_v4();
        let job = DeleteDatasetJob::new(resource_id, "roads");

        assert_eq!(job.resource_id, resource_id);
        assert_eq!(job.type_name, "roads");
        assert!(job.triggered_by.is_none());
    }

    #[test]
    fn test_delete_job_with_triggered_by() {
        let job = DeleteDatasetJob::new(Uuid::new_v4(), "roads").with_triggered_by("alice");
        assert_eq!(job.triggered_by.as_deref(), Some("alice"));
    }
}

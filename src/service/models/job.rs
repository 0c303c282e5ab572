use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_core::string_enum;
use uuid::Uuid;

use super::ReleaseJobTrigger;
use crate::persistence::Persistable;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Scheduled,
    ActionRequired,
    Running,
    Completed,
    Failure,
    Cancelled,
    Skipped,
    InvalidJobAgent,
}

string_enum!(JobStatus {
    Scheduled => "scheduled",
    ActionRequired => "action_required",
    Running => "running",
    Completed => "completed",
    Failure => "failure",
    Cancelled => "cancelled",
    Skipped => "skipped",
    InvalidJobAgent => "invalid_job_agent",
});

impl JobStatus {
    pub const TERMINAL: [JobStatus; 5] = [
        JobStatus::Failure,
        JobStatus::Cancelled,
        JobStatus::Skipped,
        JobStatus::Completed,
        JobStatus::InvalidJobAgent,
    ];

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// Statuses a forced release may replace. Everything except an
    /// executing job.
    pub fn is_supersedable(&self) -> bool {
        matches!(
            self,
            JobStatus::Scheduled
                | JobStatus::ActionRequired
                | JobStatus::Skipped
                | JobStatus::Failure
                | JobStatus::Cancelled
                | JobStatus::Completed
        )
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;

        match self {
            Scheduled => matches!(
                next,
                ActionRequired
                    | Running
                    | Completed
                    | Failure
                    | Cancelled
                    | Skipped
                    | InvalidJobAgent
            ),
            ActionRequired => matches!(next, Scheduled | Running | Failure | Cancelled | Skipped),
            Running => matches!(next, ActionRequired | Completed | Failure | Cancelled),
            Completed | Failure | Cancelled | Skipped | InvalidJobAgent => false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub trigger_id: String,
    pub job_agent_id: Option<String>,

    pub release_id: String,
    pub environment_id: String,
    pub target_id: Option<String>,

    pub status: JobStatus,
    pub is_forced_release: bool,
    pub message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn for_trigger(
        trigger: &ReleaseJobTrigger,
        job_agent_id: Option<&str>,
        is_forced_release: bool,
    ) -> Self {
        let now = Utc::now();
        let (status, message) = match job_agent_id {
            Some(_) => (JobStatus::Scheduled, None),
            None => (
                JobStatus::InvalidJobAgent,
                Some("deployment has no job agent configured".to_string()),
            ),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            trigger_id: trigger.id.clone(),
            job_agent_id: job_agent_id.map(str::to_string),
            release_id: trigger.release_id.clone(),
            environment_id: trigger.environment_id.clone(),
            target_id: trigger.target_id.clone(),
            status,
            is_forced_release,
            message,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Persistable<Job> for Job {
    fn get_id(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TriggerType;

    const ALL: [JobStatus; 8] = [
        JobStatus::Scheduled,
        JobStatus::ActionRequired,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failure,
        JobStatus::Cancelled,
        JobStatus::Skipped,
        JobStatus::InvalidJobAgent,
    ];

    #[test]
    fn test_terminal_statuses_accept_no_transition() {
        for status in JobStatus::TERMINAL {
            for next in ALL {
                assert!(
                    !status.can_transition_to(next),
                    "{status} must not move to {next}"
                );
            }
        }
    }

    #[test]
    fn test_action_required_resumes() {
        assert!(!JobStatus::ActionRequired.is_terminal());
        assert!(JobStatus::ActionRequired.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::ActionRequired));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Scheduled));
    }

    #[test]
    fn test_only_running_blocks_supersede() {
        for status in ALL {
            let expected = !matches!(status, JobStatus::Running | JobStatus::InvalidJobAgent);
            assert_eq!(status.is_supersedable(), expected, "{status}");
        }
    }

    #[test]
    fn test_job_without_agent_is_invalid() {
        let trigger = ReleaseJobTrigger::new(
            TriggerType::NewRelease,
            "release",
            "environment",
            Some("target"),
        );

        let job = Job::for_trigger(&trigger, None, false);
        assert_eq!(job.status, JobStatus::InvalidJobAgent);

        let job = Job::for_trigger(&trigger, Some("agent"), true);
        assert_eq!(job.status, JobStatus::Scheduled);
        assert!(job.is_forced_release);
        assert_eq!(job.target_id.as_deref(), Some("target"));
    }
}

mod approval;
mod environment;
mod job;
mod release;
mod target;
mod target_provider;
mod trigger;

pub use approval::{ApprovalStatus, EnvironmentPolicyApproval};
pub use environment::{ApprovalRequirement, Environment, EnvironmentPolicy};
pub use job::{Job, JobStatus};
pub use release::{Deployment, Release};
pub use target::{Labels, Target, TargetKind};
pub use target_provider::{GoogleProviderConfig, TargetProvider, TargetProviderConfig};
pub use trigger::{ReleaseJobTrigger, TriggerType};

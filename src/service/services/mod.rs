use sqlx::PgPool;
use std::sync::Arc;
use trellis_core::EventStream;

use crate::{
    models::{Deployment, Environment, EnvironmentPolicy, Release, TargetProvider},
    persistence::{
        memory::{
            ApprovalMemoryPersistence, JobMemoryPersistence, MemoryPersistence,
            TargetMemoryPersistence, TriggerMemoryPersistence,
        },
        relational::{
            ApprovalRelationalPersistence, DeploymentRelationalPersistence,
            EnvironmentRelationalPersistence, JobRelationalPersistence,
            PolicyRelationalPersistence, ReleaseRelationalPersistence,
            TargetProviderRelationalPersistence, TargetRelationalPersistence,
            TriggerRelationalPersistence,
        },
        ApprovalPersistence, JobPersistence, Persistence, TargetPersistence, TriggerPersistence,
    },
};

mod approval;
mod dispatch;
mod environment;
mod job;
mod release;
mod target;
mod target_provider;
mod trigger;

pub use approval::{ApprovalService, GateDecision};
pub use dispatch::{DispatchReport, Dispatcher, SkipReason, SkippedTrigger, SUPERSEDED_MESSAGE};
pub use environment::EnvironmentService;
pub use job::JobService;
pub use release::ReleaseService;
pub use target::TargetService;
pub use target_provider::TargetProviderService;
pub use trigger::TriggerService;

/// One persistence backend per model.
pub struct Persistences {
    pub approval: Box<dyn ApprovalPersistence>,
    pub deployment: Box<dyn Persistence<Deployment>>,
    pub environment: Box<dyn Persistence<Environment>>,
    pub job: Box<dyn JobPersistence>,
    pub policy: Box<dyn Persistence<EnvironmentPolicy>>,
    pub release: Box<dyn Persistence<Release>>,
    pub target: Box<dyn TargetPersistence>,
    pub target_provider: Box<dyn Persistence<TargetProvider>>,
    pub trigger: Box<dyn TriggerPersistence>,
}

impl Persistences {
    pub fn memory() -> Self {
        Self {
            approval: Box::<ApprovalMemoryPersistence>::default(),
            deployment: Box::<MemoryPersistence<Deployment>>::default(),
            environment: Box::<MemoryPersistence<Environment>>::default(),
            job: Box::<JobMemoryPersistence>::default(),
            policy: Box::<MemoryPersistence<EnvironmentPolicy>>::default(),
            release: Box::<MemoryPersistence<Release>>::default(),
            target: Box::<TargetMemoryPersistence>::default(),
            target_provider: Box::<MemoryPersistence<TargetProvider>>::default(),
            trigger: Box::<TriggerMemoryPersistence>::default(),
        }
    }

    pub fn relational(db: &Arc<PgPool>) -> Self {
        Self {
            approval: Box::new(ApprovalRelationalPersistence {
                db: Arc::clone(db),
            }),
            deployment: Box::new(DeploymentRelationalPersistence {
                db: Arc::clone(db),
            }),
            environment: Box::new(EnvironmentRelationalPersistence {
                db: Arc::clone(db),
            }),
            job: Box::new(JobRelationalPersistence {
                db: Arc::clone(db),
            }),
            policy: Box::new(PolicyRelationalPersistence {
                db: Arc::clone(db),
            }),
            release: Box::new(ReleaseRelationalPersistence {
                db: Arc::clone(db),
            }),
            target: Box::new(TargetRelationalPersistence {
                db: Arc::clone(db),
            }),
            target_provider: Box::new(TargetProviderRelationalPersistence {
                db: Arc::clone(db),
            }),
            trigger: Box::new(TriggerRelationalPersistence {
                db: Arc::clone(db),
            }),
        }
    }
}

/// Every service wired over one set of persistences and one event stream.
#[derive(Clone, Debug)]
pub struct Services {
    pub approval: Arc<ApprovalService>,
    pub dispatcher: Arc<Dispatcher>,
    pub environment: Arc<EnvironmentService>,
    pub job: Arc<JobService>,
    pub release: Arc<ReleaseService>,
    pub target: Arc<TargetService>,
    pub target_provider: Arc<TargetProviderService>,
    pub trigger: Arc<TriggerService>,
}

impl Services {
    pub fn new(persistences: Persistences, event_stream: Arc<dyn EventStream>) -> Self {
        let environment = Arc::new(EnvironmentService {
            environment_persistence: persistences.environment,
            policy_persistence: persistences.policy,
        });

        let release = Arc::new(ReleaseService {
            release_persistence: persistences.release,
            deployment_persistence: persistences.deployment,
        });

        let approval = Arc::new(ApprovalService {
            persistence: persistences.approval,
            event_stream: Arc::clone(&event_stream),
            environment_service: Arc::clone(&environment),
        });

        let job = Arc::new(JobService {
            persistence: persistences.job,
            event_stream: Arc::clone(&event_stream),
            environment_service: Arc::clone(&environment),
        });

        let target = Arc::new(TargetService {
            persistence: persistences.target,
            event_stream: Arc::clone(&event_stream),
        });

        let target_provider = Arc::new(TargetProviderService {
            persistence: persistences.target_provider,
            event_stream: Arc::clone(&event_stream),
        });

        let trigger = Arc::new(TriggerService {
            persistence: persistences.trigger,
            event_stream,
        });

        let dispatcher = Arc::new(Dispatcher {
            approval_service: Arc::clone(&approval),
            environment_service: Arc::clone(&environment),
            job_service: Arc::clone(&job),
            release_service: Arc::clone(&release),
            target_service: Arc::clone(&target),
            trigger_service: Arc::clone(&trigger),
        });

        Self {
            approval,
            dispatcher,
            environment,
            job,
            release,
            target,
            target_provider,
            trigger,
        }
    }
}

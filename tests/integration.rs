use std::{sync::Arc, time::Duration};

use trellis::{
    credentials::StaticCredentialProvider,
    error::{DispatchError, PolicyViolation},
    models::JobStatus,
    processor::DispatchProcessor,
    providers::GoogleProviderAdapter,
    reconciliation::Reconciler,
    services::{DispatchReport, SkipReason, SUPERSEDED_MESSAGE},
    test::{
        get_cluster_descriptor_fixture, get_release_fixture, get_services_fixture,
        get_target_provider_fixture, get_trigger_fixture, FakeClusterApi,
        AUTOMATIC_POLICY_FIXTURE_ID, JOB_AGENT_FIXTURE_ID, MANUAL_POLICY_FIXTURE_ID,
        WORKSPACE_FIXTURE_ID,
    },
};
use trellis_core::EventStream;
use trellis_memory_stream::MemoryEventStream;

async fn drain(event_stream: &MemoryEventStream, processor: &DispatchProcessor) -> Vec<DispatchReport> {
    let mut reports = Vec::new();

    loop {
        let events = event_stream.receive("dispatcher").await.unwrap();
        if events.is_empty() {
            return reports;
        }

        for event in events.iter() {
            if let Some(report) = processor.process(event).await.unwrap() {
                reports.push(report);
            }
            event_stream.delete(event, "dispatcher").await.unwrap();
        }
    }
}

#[tokio::test]
async fn test_e2e() {
    dotenvy::from_filename(".env.test").ok();

    let event_stream = Arc::new(MemoryEventStream::new().unwrap());
    let services = get_services_fixture(Arc::clone(&event_stream) as Arc<dyn EventStream>)
        .await
        .unwrap();

    let processor = DispatchProcessor {
        dispatcher: Arc::clone(&services.dispatcher),
    };

    // scan one cluster with one namespace
    services
        .target_provider
        .upsert(&get_target_provider_fixture(None), &None)
        .await
        .unwrap();

    let cluster_api = FakeClusterApi::default()
        .with_cluster("my-project", get_cluster_descriptor_fixture("prod", "us-central1"))
        .with_namespace("prod", "payments", &[("team", "payments")]);
    let adapter = GoogleProviderAdapter::new(Arc::new(cluster_api), Duration::from_millis(200));

    let reconciler = Reconciler::new(
        vec![Arc::new(adapter)],
        Arc::new(StaticCredentialProvider::new("test-token")),
        Arc::clone(&services.target),
        Arc::clone(&services.target_provider),
        Duration::from_millis(500),
    );

    let reports = reconciler.reconcile_all().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].errors.is_empty());
    assert_eq!(reports[0].upserted, 2);

    let cluster = services
        .target
        .get_by_identifier(WORKSPACE_FIXTURE_ID, "my-project/prod")
        .await
        .unwrap()
        .unwrap();
    let namespace = services
        .target
        .get_by_identifier(WORKSPACE_FIXTURE_ID, "my-project/prod/payments")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(namespace.labels["kubernetes/namespace"], "payments");
    assert_eq!(namespace.labels["team"], "payments");

    drain(&event_stream, &processor).await;

    // the automatic environment dispatches right away, the manual one waits
    let release = get_release_fixture(None);
    let automatic_environment = format!("environment:{AUTOMATIC_POLICY_FIXTURE_ID}");
    let manual_environment = format!("environment:{MANUAL_POLICY_FIXTURE_ID}");

    let triggers = vec![
        get_trigger_fixture(&release.id, &automatic_environment, Some(&cluster.id)),
        get_trigger_fixture(&release.id, &manual_environment, Some(&namespace.id)),
    ];

    let report = services.dispatcher.dispatch(&triggers, &None).await.unwrap();
    assert_eq!(report.jobs.len(), 1);
    assert_eq!(report.jobs[0].target_id.as_deref(), Some(cluster.id.as_str()));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(
        report.skipped[0].reason,
        SkipReason::AwaitingApproval {
            policy_id: MANUAL_POLICY_FIXTURE_ID.to_string()
        }
    );

    // replaying the trigger events creates nothing new
    let replayed = drain(&event_stream, &processor).await;
    assert!(replayed.iter().all(|report| report.jobs.is_empty()));

    let active = services
        .job
        .get_active_for_agent(JOB_AGENT_FIXTURE_ID)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);

    // approval resumes the waiting trigger through the processor
    services
        .approval
        .approve(MANUAL_POLICY_FIXTURE_ID, &release.id, &None)
        .await
        .unwrap();

    let resumed = drain(&event_stream, &processor).await;
    let resumed_jobs: usize = resumed.iter().map(|report| report.jobs.len()).sum();
    assert_eq!(resumed_jobs, 1);

    let active = services
        .job
        .get_active_for_agent(JOB_AGENT_FIXTURE_ID)
        .await
        .unwrap();
    assert_eq!(active.len(), 2);

    // a rescan keeps ids and locks
    services.target.lock(&cluster.id, &None).await.unwrap();
    reconciler.reconcile_all().await.unwrap();

    let rescanned = services
        .target
        .get_by_identifier(WORKSPACE_FIXTURE_ID, "my-project/prod")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rescanned.id, cluster.id);
    assert!(rescanned.is_locked());

    // forcing onto a locked target is refused
    let result = services
        .dispatcher
        .force_release(&release.id, &cluster.id, &automatic_environment, &None)
        .await;
    assert!(matches!(
        result,
        Err(DispatchError::PolicyViolation(PolicyViolation::TargetLocked { .. }))
    ));

    // once unlocked the forced job supersedes the scheduled one
    services.target.unlock(&cluster.id, &None).await.unwrap();

    let scheduled = services
        .job
        .get_latest(&release.id, &cluster.id)
        .await
        .unwrap()
        .unwrap();

    let forced = services
        .dispatcher
        .force_release(&release.id, &cluster.id, &automatic_environment, &None)
        .await
        .unwrap();
    assert!(forced.is_forced_release);

    let superseded = services.job.get_by_id(&scheduled.id).await.unwrap().unwrap();
    assert_eq!(superseded.status, JobStatus::Cancelled);
    assert_eq!(superseded.message.as_deref(), Some(SUPERSEDED_MESSAGE));

    // the agent runs the forced job to completion
    services
        .job
        .update_status(&forced.id, JobStatus::Running, None, &None)
        .await
        .unwrap();
    services
        .job
        .update_status(&forced.id, JobStatus::Completed, Some("deployed"), &None)
        .await
        .unwrap();

    let active = services
        .job
        .get_active_for_agent(JOB_AGENT_FIXTURE_ID)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].target_id.as_deref(), Some(namespace.id.as_str()));

    drain(&event_stream, &processor).await;
}

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{task_ab, ScriptedService};
use taskdesk_core::task::{Status, StatusFilter};
use taskdesk_core::StatusSummary;
use taskdesk_service::test_helpers::sample_tasks;
use taskdesk_service::{ServiceError, TaskListing};
use taskdesk_views::{LoadOutcome, TaskListView, ViewError};

fn service_with_samples() -> Arc<ScriptedService> {
    let svc = ScriptedService::new(task_ab());
    svc.set_listing(TaskListing {
        tasks: sample_tasks(),
        status_summary: StatusSummary {
            all: 3,
            pending_tasks: 1,
            in_progress_tasks: 1,
            completed_tasks: 1,
        },
    });
    Arc::new(svc)
}

#[tokio::test]
async fn load_fills_tasks_and_tabs() {
    let svc = service_with_samples();
    let view = TaskListView::new(svc.clone());
    assert!(view.snapshot().tabs.is_empty());

    let outcome = view.load(StatusFilter::All).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Applied);

    let snap = view.snapshot();
    assert_eq!(snap.tasks.len(), 3);
    assert!(!snap.loading);
    let tabs: Vec<_> = snap.tabs.iter().map(|t| (t.label(), t.count)).collect();
    assert_eq!(
        tabs,
        vec![("All", 3), ("Pending", 1), ("In Progress", 1), ("Completed", 1)]
    );
    assert_eq!(svc.list_calls(), vec![StatusFilter::All]);
}

#[tokio::test]
async fn tab_counts_come_from_summary_not_the_page() {
    let svc = service_with_samples();
    svc.set_listing(TaskListing {
        tasks: sample_tasks(),
        status_summary: StatusSummary {
            all: 99,
            ..Default::default()
        },
    });
    let view = TaskListView::new(svc.clone());

    view.load(StatusFilter::Only(Status::Pending)).await.unwrap();
    let snap = view.snapshot();
    assert_eq!(snap.tasks.len(), 1);
    assert_eq!(snap.tabs[0].count, 99);
    assert_eq!(snap.tabs[1].count, 0);
}

#[tokio::test]
async fn filter_change_triggers_constrained_read() {
    let svc = service_with_samples();
    let view = TaskListView::new(svc.clone());
    view.load(StatusFilter::All).await.unwrap();

    let outcome = view
        .set_filter(StatusFilter::Only(Status::Completed))
        .await
        .unwrap();
    assert_eq!(outcome, LoadOutcome::Applied);
    assert_eq!(view.filter(), StatusFilter::Only(Status::Completed));
    assert_eq!(view.snapshot().tasks[0].id, "t3");

    // same filter again: nothing to do
    let outcome = view
        .set_filter(StatusFilter::Only(Status::Completed))
        .await
        .unwrap();
    assert_eq!(outcome, LoadOutcome::Unchanged);
    assert_eq!(
        svc.list_calls(),
        vec![StatusFilter::All, StatusFilter::Only(Status::Completed)]
    );
}

#[tokio::test]
async fn failed_load_keeps_last_known_state() {
    let svc = service_with_samples();
    let view = TaskListView::new(svc.clone());
    view.load(StatusFilter::All).await.unwrap();
    let before = view.snapshot();

    svc.fail_reads(ServiceError::Status {
        status: 503,
        message: "unavailable".into(),
    });
    let err = view
        .load(StatusFilter::Only(Status::Pending))
        .await
        .unwrap_err();
    assert!(matches!(err, ViewError::Fetch(ServiceError::Status { status: 503, .. })));

    let snap = view.snapshot();
    assert_eq!(snap.tasks, before.tasks);
    assert_eq!(snap.tabs, before.tabs);
    assert!(!snap.loading);
    assert!(snap.notice.unwrap().contains("unavailable"));
}

#[tokio::test(start_paused = true)]
async fn stale_load_is_discarded() {
    let svc = service_with_samples();
    svc.delay_next_list(Duration::from_secs(5));
    let view = TaskListView::new(svc.clone());

    let (slow, fast) = tokio::join!(view.load(StatusFilter::Only(Status::Pending)), async {
        tokio::task::yield_now().await;
        view.load(StatusFilter::Only(Status::Completed)).await
    });

    assert_eq!(fast.unwrap(), LoadOutcome::Applied);
    assert_eq!(slow.unwrap(), LoadOutcome::Stale);
    let snap = view.snapshot();
    assert_eq!(snap.filter, StatusFilter::Only(Status::Completed));
    assert_eq!(snap.tasks.len(), 1);
    assert_eq!(snap.tasks[0].status, Status::Completed);
    assert!(!snap.loading);
}

#[tokio::test(start_paused = true)]
async fn closed_view_discards_pending_load() {
    let svc = service_with_samples();
    svc.delay_next_list(Duration::from_secs(5));
    let view = TaskListView::new(svc.clone());

    let (result, _) = tokio::join!(view.load(StatusFilter::All), async {
        tokio::task::yield_now().await;
        view.close();
    });
    assert!(matches!(result, Err(ViewError::Cancelled)));
    assert!(view.snapshot().tasks.is_empty());
}

#[tokio::test]
async fn cards_project_task_fields() {
    let svc = service_with_samples();
    let view = TaskListView::new(svc.clone());
    view.load(StatusFilter::All).await.unwrap();

    let cards = view.snapshot().cards();
    let t2 = cards.iter().find(|c| c.id == "t2").unwrap();
    assert_eq!(t2.checklist_len, 3);
    assert_eq!(t2.completed_todo_count, 1);
    assert_eq!(t2.attachment_count, 2);
    assert_eq!(t2.assignee_images, vec!["https://img.example/u1.png"]);
    assert_eq!(t2.due_date, "5th Mar 2025");
}

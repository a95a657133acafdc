mod common;

use helpbot_core::clock::ManualClock;
use helpbot_core::domain::ticket::{ThreadId, TicketStatus};
use helpbot_core::domain::user::UserId;
use helpbot_core::notifications::Notification;
use helpbot_core::reputation::LevelChange;
use helpbot_db::repositories::user;
use helpbot_workflows::TicketError;

use common::{migrated_pool, router_with_sink, shared_file_pool, start_time, ticket_workflow};

const OWNER: UserId = UserId(100);
const HELPER: UserId = UserId(200);
const THREAD: ThreadId = ThreadId(555);

#[tokio::test]
async fn resolving_twice_applies_the_bounty_once() {
    let pool = migrated_pool().await;
    let (router, _sink) = router_with_sink();
    let workflow = ticket_workflow(&pool, ManualClock::new(start_time()), router);
    workflow.open_ticket(THREAD, OWNER, "evt-open").await.expect("open");

    let first = workflow.resolve_ticket(THREAD, HELPER, "evt-1").await.expect("first resolve");
    let change = first.reputation.expect("helper earns the bounty");
    assert_eq!(change.transition, LevelChange::LevelUp);
    assert_eq!(first.ticket.status, TicketStatus::Resolved);
    assert_eq!(first.ticket.helper, Some(HELPER));
    assert_eq!(first.ticket.resolved_at, Some(start_time()));

    let second = workflow.resolve_ticket(THREAD, HELPER, "evt-2").await.expect_err("second");
    assert!(matches!(second, TicketError::AlreadyResolved { thread_id: THREAD }));

    let helper = user::find(&pool, HELPER).await.expect("find").expect("helper row");
    assert_eq!(helper.reputation, 5);
    assert_eq!(helper.level, 1);
    assert_eq!(helper.resolved_questions, 1);
}

#[tokio::test]
async fn self_resolution_changes_no_reputation_or_counter() {
    let pool = migrated_pool().await;
    let (router, sink) = router_with_sink();
    let workflow = ticket_workflow(&pool, ManualClock::new(start_time()), router);
    workflow.open_ticket(THREAD, OWNER, "evt-open").await.expect("open");

    let resolution = workflow.resolve_ticket(THREAD, OWNER, "evt-1").await.expect("resolve");

    assert!(resolution.is_self_resolved());
    assert_eq!(resolution.ticket.status, TicketStatus::Resolved);
    let owner = user::find(&pool, OWNER).await.expect("find").expect("owner row");
    assert_eq!(owner.reputation, 0);
    assert_eq!(owner.resolved_questions, 0);
    assert_eq!(owner.asked_questions, 1);
    assert_eq!(
        sink.notifications(),
        vec![Notification::TicketResolved {
            ticket_id: resolution.ticket.id,
            thread_id: THREAD,
            resolver_id: OWNER,
            self_resolved: true,
        }]
    );
}

#[tokio::test]
async fn helper_resolution_reports_ticket_and_level_up() {
    let pool = migrated_pool().await;
    let (router, sink) = router_with_sink();
    let workflow = ticket_workflow(&pool, ManualClock::new(start_time()), router);
    let ticket = workflow.open_ticket(THREAD, OWNER, "evt-open").await.expect("open");

    workflow.resolve_ticket(THREAD, HELPER, "evt-1").await.expect("resolve");

    assert_eq!(
        sink.notifications(),
        vec![
            Notification::TicketResolved {
                ticket_id: ticket.id,
                thread_id: THREAD,
                resolver_id: HELPER,
                self_resolved: false,
            },
            Notification::UserLeveledUp { user_id: HELPER, new_level: 1 },
        ]
    );
    assert!(sink.envelopes().iter().all(|envelope| envelope.correlation_id == "evt-1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolutions_award_exactly_one_bounty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = shared_file_pool(&dir).await;
    let (router, _sink) = router_with_sink();
    let workflow = ticket_workflow(&pool, ManualClock::new(start_time()), router);
    workflow.open_ticket(THREAD, OWNER, "evt-open").await.expect("open");

    let attempts = (0..8)
        .map(|attempt| {
            let workflow = workflow.clone();
            tokio::spawn(async move {
                workflow.resolve_ticket(THREAD, HELPER, &format!("evt-{attempt}")).await
            })
        })
        .collect::<Vec<_>>();

    let mut resolved = 0;
    let mut already_resolved = 0;
    for attempt in attempts {
        match attempt.await.expect("task joins") {
            Ok(_) => resolved += 1,
            Err(TicketError::AlreadyResolved { thread_id }) => {
                assert_eq!(thread_id, THREAD);
                already_resolved += 1;
            }
            Err(other) => panic!("unexpected resolve error: {other:?}"),
        }
    }

    assert_eq!((resolved, already_resolved), (1, 7));
    let helper = user::find(&pool, HELPER).await.expect("find").expect("helper row");
    assert_eq!(helper.reputation, 5);
    assert_eq!(helper.resolved_questions, 1);
    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_bounties_to_one_helper_are_not_lost() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = shared_file_pool(&dir).await;
    let (router, _sink) = router_with_sink();
    let workflow = ticket_workflow(&pool, ManualClock::new(start_time()), router);
    for thread in 1..=20 {
        workflow.open_ticket(ThreadId(thread), OWNER, "evt-open").await.expect("open");
    }

    let resolutions = (1..=20)
        .map(|thread| {
            let workflow = workflow.clone();
            tokio::spawn(async move {
                workflow.resolve_ticket(ThreadId(thread), HELPER, &format!("evt-{thread}")).await
            })
        })
        .collect::<Vec<_>>();
    for resolution in resolutions {
        resolution.await.expect("task joins").expect("resolve");
    }

    let helper = user::find(&pool, HELPER).await.expect("find").expect("helper row");
    assert_eq!(helper.reputation, 100);
    assert_eq!(helper.resolved_questions, 20);
    assert_eq!(helper.level, 4);
    pool.close().await;
}

#[tokio::test]
async fn bounty_accumulates_across_tickets() {
    let pool = migrated_pool().await;
    let (router, _sink) = router_with_sink();
    let workflow = ticket_workflow(&pool, ManualClock::new(start_time()), router);

    for thread in 1..=5 {
        workflow.open_ticket(ThreadId(thread), OWNER, "evt-open").await.expect("open");
        workflow.resolve_ticket(ThreadId(thread), HELPER, "evt").await.expect("resolve");
    }

    let helper = user::find(&pool, HELPER).await.expect("find").expect("helper row");
    assert_eq!(helper.reputation, 25);
    assert_eq!(helper.level, 2);
    assert_eq!(helper.resolved_questions, 5);
    let owner = user::find(&pool, OWNER).await.expect("find").expect("owner row");
    assert_eq!(owner.asked_questions, 5);
}

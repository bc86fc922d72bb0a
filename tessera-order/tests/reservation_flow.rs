use chrono::{Duration, Utc};
use std::sync::Arc;

use tessera_core::payment::PaymentNotification;
use tessera_core::repository::ReservationStore;
use tessera_core::{Clock, CoreError, EntryState, ManualClock, ReservationPolicy, Seat, SeatStatus};
use tessera_order::{
    ConfirmOutcome, MockPaymentGateway, NotificationOutcome, OrderState, PaymentOrchestrator, ReservationCoordinator,
};
use tessera_store::MemoryStore;

struct Harness {
    store: MemoryStore,
    clock: Arc<ManualClock>,
    coordinator: Arc<ReservationCoordinator>,
}

fn harness(seats: u32, users: u32, policy: ReservationPolicy) -> Harness {
    let store = MemoryStore::seeded(seats, users);
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let coordinator = Arc::new(ReservationCoordinator::new(
        Arc::new(store.clone()),
        clock.clone(),
        policy,
    ));
    Harness { store, clock, coordinator }
}

fn notification(order_id: uuid::Uuid, status: &str) -> PaymentNotification {
    PaymentNotification {
        order_id,
        transaction_status: status.to_string(),
        status_code: Some("200".into()),
        gross_amount: Some("100000.00".into()),
        signature_key: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reserve_single_winner() {
    const CONTENDERS: i64 = 8;
    let h = harness(3, CONTENDERS as u32, ReservationPolicy::default());

    let barrier = Arc::new(tokio::sync::Barrier::new(CONTENDERS as usize));
    let handles: Vec<_> = (1..=CONTENDERS)
        .map(|user_id| {
            let c = h.coordinator.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                c.reserve(user_id, &[1]).await
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(CoreError::Conflict(_))))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(conflicts, CONTENDERS as usize - 1);

    let active: Vec<_> = h.store.ledger().into_iter().filter(|e| e.state.is_active()).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].seat_id, 1);
}

#[tokio::test]
async fn test_expired_hold_can_be_taken_over() {
    let h = harness(3, 2, ReservationPolicy::default());

    let first = h.coordinator.reserve(1, &[2]).await.unwrap();
    assert!(matches!(h.coordinator.reserve(2, &[2]).await, Err(CoreError::Conflict(_))));

    h.clock.advance(Duration::minutes(16));
    let second = h.coordinator.reserve(2, &[2]).await.unwrap();
    assert_ne!(first.order_id, second.order_id);

    let ledger = h.store.ledger();
    let old = ledger.iter().find(|e| e.order_id == first.order_id).unwrap();
    assert_eq!(old.state, EntryState::Expired);
    let new = ledger.iter().find(|e| e.order_id == second.order_id).unwrap();
    assert_eq!(new.state, EntryState::Reserved);
    assert_eq!(new.user_id, 2);
}

#[tokio::test]
async fn test_limit_exceeded_commits_nothing() {
    let policy = ReservationPolicy {
        max_seats_per_user: 3,
        ..ReservationPolicy::default()
    };
    let h = harness(6, 1, policy);

    h.coordinator.reserve(1, &[1, 2]).await.unwrap();
    let err = h.coordinator.reserve(1, &[3, 4]).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::LimitExceeded {
            held: 2,
            requested: 2,
            limit: 3
        }
    ));

    assert_eq!(h.store.ledger().len(), 2);
    assert_eq!(h.store.get_seat(3).await.unwrap().unwrap().status, SeatStatus::Available);
    assert_eq!(h.store.get_seat(4).await.unwrap().unwrap().status, SeatStatus::Available);
}

#[tokio::test]
async fn test_re_reserving_own_seat_supersedes_previous_order() {
    let h = harness(3, 1, ReservationPolicy::default());

    let first = h.coordinator.reserve(1, &[1]).await.unwrap();
    let second = h.coordinator.reserve(1, &[1, 2]).await.unwrap();

    let ledger = h.store.ledger();
    let old = ledger.iter().find(|e| e.order_id == first.order_id).unwrap();
    assert_eq!(old.state, EntryState::Cancelled);
    assert_eq!(
        ledger
            .iter()
            .filter(|e| e.order_id == second.order_id && e.state == EntryState::Reserved)
            .count(),
        2
    );
}

#[tokio::test]
async fn test_unknown_ids_and_bad_requests() {
    let h = harness(2, 1, ReservationPolicy::default());

    assert!(matches!(h.coordinator.reserve(1, &[]).await, Err(CoreError::ValidationError(_))));
    assert!(matches!(h.coordinator.reserve(1, &[1, 1]).await, Err(CoreError::ValidationError(_))));
    assert!(matches!(h.coordinator.reserve(1, &[1, 42]).await, Err(CoreError::NotFound(_))));
    assert!(matches!(h.coordinator.reserve(9, &[1]).await, Err(CoreError::NotFound(_))));
    assert!(h.store.ledger().is_empty());
}

#[tokio::test]
async fn test_confirm_is_idempotent() {
    let h = harness(3, 1, ReservationPolicy::default());
    let receipt = h.coordinator.reserve(1, &[1, 2]).await.unwrap();

    let first = h.coordinator.confirm(receipt.order_id).await.unwrap();
    assert_eq!(first, ConfirmOutcome::Settled { seat_ids: vec![1, 2] });
    let again = h.coordinator.confirm(receipt.order_id).await.unwrap();
    assert_eq!(again, ConfirmOutcome::AlreadyFinal);

    assert_eq!(h.store.get_seat(1).await.unwrap().unwrap().status, SeatStatus::Sold);
    assert_eq!(h.store.get_seat(2).await.unwrap().unwrap().status, SeatStatus::Sold);
}

#[tokio::test]
async fn test_sold_seat_never_expires() {
    let h = harness(2, 2, ReservationPolicy::default());
    let receipt = h.coordinator.reserve(1, &[1]).await.unwrap();
    h.coordinator.confirm(receipt.order_id).await.unwrap();

    h.clock.advance(Duration::hours(3));
    assert!(!h.coordinator.expire(1).await.unwrap());
    assert!(matches!(h.coordinator.reserve(2, &[1]).await, Err(CoreError::Conflict(_))));
}

#[tokio::test]
async fn test_cancel_releases_and_refuses_after_settlement() {
    let h = harness(3, 1, ReservationPolicy::default());

    let dropped = h.coordinator.reserve(1, &[1]).await.unwrap();
    assert_eq!(h.coordinator.cancel(dropped.order_id).await.unwrap(), vec![1]);
    assert_eq!(h.store.get_seat(1).await.unwrap().unwrap().status, SeatStatus::Available);

    let paid = h.coordinator.reserve(1, &[2]).await.unwrap();
    h.coordinator.confirm(paid.order_id).await.unwrap();
    assert!(matches!(h.coordinator.cancel(paid.order_id).await, Err(CoreError::AlreadyFinal(_))));
    assert!(matches!(h.coordinator.cancel(uuid::Uuid::new_v4()).await, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_late_confirm_after_takeover_conflicts() {
    let h = harness(2, 2, ReservationPolicy::default());
    let stale = h.coordinator.reserve(1, &[1]).await.unwrap();

    h.clock.advance(Duration::minutes(20));
    h.coordinator.reserve(2, &[1]).await.unwrap();

    assert!(matches!(h.coordinator.confirm(stale.order_id).await, Err(CoreError::Conflict(_))));
}

#[tokio::test]
async fn test_expire_stale_sweeps_lapsed_holds() {
    let h = harness(4, 2, ReservationPolicy::default());
    h.coordinator.reserve(1, &[1, 2]).await.unwrap();

    h.clock.advance(Duration::minutes(10));
    h.coordinator.reserve(2, &[3]).await.unwrap();

    h.clock.advance(Duration::minutes(6));
    let mut released = h.coordinator.expire_stale().await.unwrap();
    released.sort_unstable();
    assert_eq!(released, vec![1, 2]);

    assert_eq!(h.store.get_seat(1).await.unwrap().unwrap().status, SeatStatus::Available);
    assert_eq!(h.store.get_seat(3).await.unwrap().unwrap().status, SeatStatus::Reserved);
    assert!(h.coordinator.expire_stale().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reserve_times_out_behind_a_held_lock() {
    let policy = ReservationPolicy {
        reserve_timeout: std::time::Duration::from_millis(50),
        ..ReservationPolicy::default()
    };
    let h = harness(2, 1, policy);

    let blocker = h.store.begin().await.unwrap();
    let err = h.coordinator.reserve(1, &[1]).await.unwrap_err();
    assert!(matches!(err, CoreError::Timeout(_)));
    drop(blocker);

    assert!(h.store.ledger().is_empty());
    assert!(h.coordinator.reserve(1, &[1]).await.is_ok());
}

#[tokio::test]
async fn test_order_summary_tracks_state() {
    let h = harness(3, 2, ReservationPolicy::default());
    let receipt = h.coordinator.reserve(1, &[1, 3]).await.unwrap();

    let summary = h.coordinator.order_summary(1, receipt.order_id).await.unwrap();
    assert_eq!(summary.state, OrderState::Reserved);
    assert_eq!(summary.gross_amount, 200_000);
    assert_eq!(summary.held_until, Some(receipt.held_until));
    assert_eq!(summary.customer.name, "Guest 1");

    assert!(matches!(
        h.coordinator.order_summary(2, receipt.order_id).await,
        Err(CoreError::NotFound(_))
    ));

    h.clock.advance(Duration::minutes(16));
    let lapsed = h.coordinator.order_summary(1, receipt.order_id).await.unwrap();
    assert_eq!(lapsed.state, OrderState::Lapsed);
    assert_eq!(lapsed.held_until, None);
}

#[tokio::test]
async fn test_payment_flow_through_notifications() {
    let h = harness(3, 1, ReservationPolicy::default());
    let gateway = Arc::new(MockPaymentGateway::new());
    let payments = PaymentOrchestrator::new(gateway.clone(), h.coordinator.clone());

    let receipt = h.coordinator.reserve(1, &[2]).await.unwrap();
    let (summary, reference) = payments.initiate_payment(1, receipt.order_id).await.unwrap();
    assert_eq!(summary.gross_amount, 100_000);
    assert!(reference.redirect_url.contains(&reference.token));

    let pending = payments.handle_notification(&notification(receipt.order_id, "pending")).await.unwrap();
    assert_eq!(pending, NotificationOutcome::Ignored);

    let settled = payments.handle_notification(&notification(receipt.order_id, "settlement")).await.unwrap();
    assert_eq!(settled, NotificationOutcome::Confirmed(ConfirmOutcome::Settled { seat_ids: vec![2] }));

    let repeated = payments.handle_notification(&notification(receipt.order_id, "settlement")).await.unwrap();
    assert_eq!(repeated, NotificationOutcome::Confirmed(ConfirmOutcome::AlreadyFinal));

    let late_failure = payments.handle_notification(&notification(receipt.order_id, "expire")).await.unwrap();
    assert_eq!(late_failure, NotificationOutcome::Ignored);

    assert!(matches!(
        payments.initiate_payment(1, receipt.order_id).await,
        Err(CoreError::AlreadyFinal(_))
    ));
}

#[tokio::test]
async fn test_gateway_failure_keeps_the_hold() {
    let h = harness(2, 1, ReservationPolicy::default());
    let gateway = Arc::new(MockPaymentGateway::new());
    let payments = PaymentOrchestrator::new(gateway.clone(), h.coordinator.clone());

    let receipt = h.coordinator.reserve(1, &[1]).await.unwrap();
    gateway.set_failing(true);
    assert!(matches!(
        payments.initiate_payment(1, receipt.order_id).await,
        Err(CoreError::GatewayError(_))
    ));
    assert_eq!(h.store.get_seat(1).await.unwrap().unwrap().status, SeatStatus::Reserved);

    let released = payments.handle_notification(&notification(receipt.order_id, "deny")).await.unwrap();
    assert_eq!(released, NotificationOutcome::Released(vec![1]));
}

#[tokio::test]
async fn test_stray_reserved_status_waits_for_the_window() {
    let h = harness(0, 1, ReservationPolicy::default());
    let mut seat = Seat::new(1, "A1", 100_000, "/seats/1");
    seat.status = SeatStatus::Reserved;
    seat.updated_at = h.clock.now();
    h.store.insert_seat(seat).await.unwrap();

    assert!(!h.coordinator.expire(1).await.unwrap());
    assert_eq!(h.store.get_seat(1).await.unwrap().unwrap().status, SeatStatus::Reserved);

    h.clock.advance(Duration::minutes(16));
    assert!(h.coordinator.expire(1).await.unwrap());
    assert_eq!(h.store.get_seat(1).await.unwrap().unwrap().status, SeatStatus::Available);
}

#[tokio::test]
async fn test_failure_for_lapsed_order_is_ignored() {
    let h = harness(2, 2, ReservationPolicy::default());
    let payments = PaymentOrchestrator::new(Arc::new(MockPaymentGateway::new()), h.coordinator.clone());

    let stale = h.coordinator.reserve(1, &[1]).await.unwrap();
    h.clock.advance(Duration::minutes(20));
    h.coordinator.reserve(2, &[1]).await.unwrap();

    let outcome = payments.handle_notification(&notification(stale.order_id, "expire")).await.unwrap();
    assert_eq!(outcome, NotificationOutcome::Ignored);
    assert_eq!(h.store.get_seat(1).await.unwrap().unwrap().status, SeatStatus::Reserved);
}

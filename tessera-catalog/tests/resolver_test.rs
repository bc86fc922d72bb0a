use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use tessera_catalog::{AvailabilityResolver, ViewStatus};
use tessera_core::repository::ReservationStore;
use tessera_core::{Clock, EntryState, ManualClock, ReservationEntry, SeatStatus};
use tessera_store::MemoryStore;

async fn hold(store: &MemoryStore, user_id: i64, seat_id: i64, state: EntryState, now: chrono::DateTime<Utc>) {
    let mut entry = ReservationEntry::reserved(Uuid::new_v4(), user_id, seat_id, now);
    entry.state = state;
    let status = if state == EntryState::Settlement {
        SeatStatus::Sold
    } else {
        SeatStatus::Reserved
    };

    let mut tx = store.begin().await.unwrap();
    tx.insert_entry(&entry).await.unwrap();
    tx.set_seat_status(seat_id, status, now).await.unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_viewers_see_their_own_seats() {
    let store = MemoryStore::seeded(3, 2);
    let clock = Arc::new(ManualClock::new(Utc::now()));
    hold(&store, 1, 1, EntryState::Reserved, clock.now()).await;
    hold(&store, 1, 2, EntryState::Settlement, clock.now()).await;

    let resolver = AvailabilityResolver::new(Arc::new(store), clock.clone(), Duration::minutes(15));

    let mine = resolver.seats_for(1).await.unwrap();
    let statuses: Vec<ViewStatus> = mine.iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![ViewStatus::ReservedByMe, ViewStatus::PurchasedByMe, ViewStatus::Available]);

    let theirs = resolver.seats_for(2).await.unwrap();
    let statuses: Vec<ViewStatus> = theirs.iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![ViewStatus::Reserved, ViewStatus::Sold, ViewStatus::Available]);

    clock.advance(Duration::minutes(16));
    let later = resolver.seats_for(2).await.unwrap();
    assert_eq!(later[0].status, ViewStatus::Available);
    assert_eq!(later[1].status, ViewStatus::Sold);
}

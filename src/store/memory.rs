//! In-process seat store guarded by a Tokio mutex.
//!
//! Every instance is its own isolated pool. The lock is only held for the map
//! operation itself, never across an await on anything else.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Claim, SeatStore, StoreError, StoreResult};
use crate::models::Seat;

#[derive(Debug, Clone, Copy)]
struct SeatRow {
    booked: bool,
    generation: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySeatStore {
    rows: Arc<Mutex<BTreeMap<i32, SeatRow>>>,
}

impl MemorySeatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn insert_rows(rows: &mut BTreeMap<i32, SeatRow>, seats: &[Seat]) -> StoreResult<()> {
    // Check the whole batch first so a duplicate leaves nothing behind
    let mut incoming = std::collections::BTreeSet::new();
    for seat in seats {
        if rows.contains_key(&seat.number) || !incoming.insert(seat.number) {
            return Err(StoreError::DuplicateKey(seat.number));
        }
    }
    for seat in seats {
        rows.insert(
            seat.number,
            SeatRow { booked: seat.booked, generation: seat.generation },
        );
    }
    Ok(())
}

fn to_seat(number: i32, row: &SeatRow) -> Seat {
    Seat { number, booked: row.booked, generation: row.generation }
}

#[async_trait]
impl SeatStore for MemorySeatStore {
    async fn count(&self) -> StoreResult<usize> {
        Ok(self.rows.lock().await.len())
    }

    async fn insert_all(&self, seats: &[Seat]) -> StoreResult<()> {
        let mut rows = self.rows.lock().await;
        insert_rows(&mut rows, seats)
    }

    async fn delete_all(&self) -> StoreResult<()> {
        self.rows.lock().await.clear();
        Ok(())
    }

    async fn replace_all(&self, seats: &[Seat]) -> StoreResult<()> {
        let mut rows = self.rows.lock().await;
        let mut fresh = BTreeMap::new();
        insert_rows(&mut fresh, seats)?;
        *rows = fresh;
        Ok(())
    }

    async fn find_available(&self, limit: usize) -> StoreResult<Vec<Seat>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|(_, row)| !row.booked)
            .take(limit)
            .map(|(number, row)| to_seat(*number, row))
            .collect())
    }

    async fn conditional_mark_booked(&self, claim: &Claim) -> StoreResult<usize> {
        let mut rows = self.rows.lock().await;

        let qualifying = claim
            .numbers
            .iter()
            .filter(|number| {
                rows.get(*number)
                    .is_some_and(|row| !row.booked && row.generation == claim.generation)
            })
            .count();

        if qualifying != claim.numbers.len() {
            return Ok(qualifying);
        }

        for number in &claim.numbers {
            if let Some(row) = rows.get_mut(number) {
                row.booked = true;
            }
        }
        Ok(qualifying)
    }

    async fn find_all(&self) -> StoreResult<Vec<Seat>> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().map(|(number, row)| to_seat(*number, row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(capacity: i32) -> (MemorySeatStore, Uuid) {
        let store = MemorySeatStore::new();
        let generation = Uuid::new_v4();
        store
            .insert_all(&Seat::fresh_pool(capacity, generation))
            .await
            .unwrap();
        (store, generation)
    }

    #[tokio::test]
    async fn insert_all_rejects_existing_numbers() {
        let (store, _) = seeded(5).await;
        let err = store
            .insert_all(&Seat::fresh_pool(3, Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(1)));
        assert_eq!(store.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn insert_all_rejects_duplicates_within_batch() {
        let store = MemorySeatStore::new();
        let generation = Uuid::new_v4();
        let mut seats = Seat::fresh_pool(3, generation);
        seats.push(Seat { number: 2, booked: false, generation });
        assert!(matches!(
            store.insert_all(&seats).await,
            Err(StoreError::DuplicateKey(2))
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_available_returns_lowest_unbooked_first() {
        let (store, generation) = seeded(10).await;
        let claim = Claim { generation, numbers: vec![1, 3] };
        assert_eq!(store.conditional_mark_booked(&claim).await.unwrap(), 2);

        let numbers: Vec<i32> = store
            .find_available(4)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.number)
            .collect();
        assert_eq!(numbers, vec![2, 4, 5, 6]);
    }

    #[tokio::test]
    async fn conditional_mark_is_all_or_nothing() {
        let (store, generation) = seeded(10).await;
        store
            .conditional_mark_booked(&Claim { generation, numbers: vec![2] })
            .await
            .unwrap();

        let affected = store
            .conditional_mark_booked(&Claim { generation, numbers: vec![1, 2, 3] })
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let booked: Vec<i32> = store
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .filter(|s| s.booked)
            .map(|s| s.number)
            .collect();
        assert_eq!(booked, vec![2]);
    }

    #[tokio::test]
    async fn conditional_mark_ignores_stale_generation() {
        let (store, old_generation) = seeded(10).await;
        store
            .replace_all(&Seat::fresh_pool(10, Uuid::new_v4()))
            .await
            .unwrap();

        let affected = store
            .conditional_mark_booked(&Claim { generation: old_generation, numbers: vec![1, 2] })
            .await
            .unwrap();
        assert_eq!(affected, 0);
        assert!(store.find_all().await.unwrap().iter().all(|s| !s.booked));
    }

    #[tokio::test]
    async fn conditional_mark_counts_missing_rows_as_unqualified() {
        let (store, generation) = seeded(3).await;
        let affected = store
            .conditional_mark_booked(&Claim { generation, numbers: vec![3, 4] })
            .await
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(store.find_available(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn delete_all_empties_pool() {
        let (store, _) = seeded(4).await;
        store.delete_all().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clones_share_one_pool() {
        let (store, generation) = seeded(4).await;
        let other = store.clone();
        other
            .conditional_mark_booked(&Claim { generation, numbers: vec![1] })
            .await
            .unwrap();
        assert_eq!(store.find_available(10).await.unwrap().len(), 3);
        assert_eq!(MemorySeatStore::new().count().await.unwrap(), 0);
    }
}

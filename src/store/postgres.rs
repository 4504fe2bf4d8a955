//! Seat store backed by the `seats` table in Postgres.
//!
//! Row locks are always taken in ascending seat-number order so that
//! overlapping commits and resets queue behind each other instead of
//! deadlocking. Pool creation and resets additionally hold a transaction-scoped
//! advisory lock, so two of them never insert the same numbers at once.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error};
use uuid::Uuid;

use super::{Claim, SeatStore, StoreError, StoreResult};
use crate::database::Database;
use crate::models::Seat;

// Advisory lock key serializing insert_all / replace_all across connections
const POOL_REBUILD_LOCK: i64 = 0x5EA7_0001;

#[derive(Debug, Clone)]
pub struct PostgresSeatStore {
    pool: PgPool,
}

impl PostgresSeatStore {
    pub fn new(db: &Database) -> Self {
        Self { pool: db.pool.clone() }
    }

    async fn lock_pool_rebuild(tx: &mut Transaction<'_, Postgres>) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(POOL_REBUILD_LOCK)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn insert_in(tx: &mut Transaction<'_, Postgres>, seats: &[Seat]) -> StoreResult<()> {
        let numbers: Vec<i32> = seats.iter().map(|s| s.number).collect();
        let booked: Vec<bool> = seats.iter().map(|s| s.booked).collect();
        let generations: Vec<Uuid> = seats.iter().map(|s| s.generation).collect();

        let inserted: Vec<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO seats (number, booked, generation)
            SELECT * FROM UNNEST($1::INTEGER[], $2::BOOLEAN[], $3::UUID[])
            ON CONFLICT (number) DO NOTHING
            RETURNING number
            "#,
        )
        .bind(&numbers)
        .bind(&booked)
        .bind(&generations)
        .fetch_all(&mut **tx)
        .await?;

        if inserted.len() != numbers.len() {
            // A number repeated within the batch is inserted once and skipped after
            let mut inserted: HashSet<i32> = inserted.into_iter().collect();
            let duplicate = numbers
                .iter()
                .copied()
                .find(|n| !inserted.remove(n))
                .unwrap_or_default();
            return Err(StoreError::DuplicateKey(duplicate));
        }
        Ok(())
    }
}

#[async_trait]
impl SeatStore for PostgresSeatStore {
    async fn count(&self) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seats")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn insert_all(&self, seats: &[Seat]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_pool_rebuild(&mut tx).await?;
        // Dropping the transaction on error rolls it back
        Self::insert_in(&mut tx, seats).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_all(&self) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM seats").execute(&self.pool).await?;
        debug!(rows = result.rows_affected(), "deleted seat records");
        Ok(())
    }

    async fn replace_all(&self, seats: &[Seat]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_pool_rebuild(&mut tx).await?;

        sqlx::query("SELECT number FROM seats ORDER BY number FOR UPDATE")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM seats").execute(&mut *tx).await?;
        Self::insert_in(&mut tx, seats).await?;

        tx.commit().await.map_err(|e| {
            error!("replace_all commit failed: {:?}", e);
            StoreError::from(e)
        })
    }

    async fn find_available(&self, limit: usize) -> StoreResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(
            r#"
            SELECT number, booked, generation
            FROM seats
            WHERE booked = FALSE
            ORDER BY number
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }

    async fn conditional_mark_booked(&self, claim: &Claim) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;

        let locked: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT number
            FROM seats
            WHERE number = ANY($1) AND generation = $2 AND booked = FALSE
            ORDER BY number
            FOR UPDATE
            "#,
        )
        .bind(&claim.numbers)
        .bind(claim.generation)
        .fetch_all(&mut *tx)
        .await?;

        if locked.len() != claim.numbers.len() {
            tx.rollback().await?;
            return Ok(locked.len());
        }

        let result = sqlx::query(
            "UPDATE seats SET booked = TRUE WHERE number = ANY($1) AND generation = $2",
        )
        .bind(&claim.numbers)
        .bind(claim.generation)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() as usize)
    }

    async fn find_all(&self) -> StoreResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT number, booked, generation FROM seats ORDER BY number",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }
}

//! Authoritative storage of seat records.
//!
//! The allocation engine talks to the pool only through [`SeatStore`]. A store
//! keeps no booking logic of its own beyond the conditional batch commit, which
//! is the single point where a seat changes from free to booked.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Seat;

pub use memory::MemorySeatStore;
pub use postgres::PostgresSeatStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("seat {0} already exists")]
    DuplicateKey(i32),
    #[error("seat store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
    #[error("seat store error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err)
            }
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A set of seats read under one pool generation, to be committed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub generation: Uuid,
    pub numbers: Vec<i32>,
}

#[async_trait]
pub trait SeatStore: Send + Sync + std::fmt::Debug {
    /// Number of seat records currently stored.
    async fn count(&self) -> StoreResult<usize>;

    /// Creates every record in `seats` or none of them.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if any number already exists.
    async fn insert_all(&self, seats: &[Seat]) -> StoreResult<()>;

    /// Removes every seat record.
    async fn delete_all(&self) -> StoreResult<()>;

    /// Wipes the pool and inserts `seats` in its place.
    ///
    /// Stores that can do so override this to make the swap atomic, so readers
    /// see either the old pool or the new one.
    async fn replace_all(&self, seats: &[Seat]) -> StoreResult<()> {
        self.delete_all().await?;
        self.insert_all(seats).await
    }

    /// Up to `limit` unbooked seats, lowest numbers first.
    async fn find_available(&self, limit: usize) -> StoreResult<Vec<Seat>>;

    /// Marks every seat in `claim` booked, or none.
    ///
    /// A seat qualifies when it exists in `claim.generation` and is currently
    /// unbooked. The batch is applied only if all of them qualify; the return
    /// value is the number that qualified, so anything short of
    /// `claim.numbers.len()` means nothing was written.
    async fn conditional_mark_booked(&self, claim: &Claim) -> StoreResult<usize>;

    /// Full snapshot of the pool in seat-number order.
    async fn find_all(&self) -> StoreResult<Vec<Seat>>;
}

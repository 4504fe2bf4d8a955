//! Allocation engine: turns "book N seats" into a committed, non-overlapping
//! set of seat numbers.
//!
//! Booking is optimistic. Candidates are read from the store, then committed
//! with a single conditional batch update that only succeeds if every
//! candidate is still free in the same pool generation. A lost race means the
//! whole select-then-commit step is repeated against fresh state, up to
//! `max_retries` more times, after a short jittered backoff. Nothing is held
//! locked between the read and the commit, and the engine keeps no copy of
//! seat state across calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BookingConfig;
use crate::error::BookingError;
use crate::models::{PoolStatus, Seat};
use crate::store::{Claim, SeatStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Initialized,
    AlreadyInitialized,
}

impl InitOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            InitOutcome::Initialized => "Seats initialized",
            InitOutcome::AlreadyInitialized => "Seats already initialized",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AllocationEngine {
    store: Arc<dyn SeatStore>,
    config: BookingConfig,
}

impl AllocationEngine {
    pub fn new(store: Arc<dyn SeatStore>, config: BookingConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    /// Creates the pool if the store is empty; otherwise does nothing.
    pub async fn initialize(&self) -> Result<InitOutcome, BookingError> {
        if self.store.count().await? > 0 {
            return Ok(InitOutcome::AlreadyInitialized);
        }

        let generation = Uuid::new_v4();
        match self
            .store
            .insert_all(&Seat::fresh_pool(self.config.capacity, generation))
            .await
        {
            Ok(()) => {
                info!(capacity = self.config.capacity, %generation, "seat pool initialized");
                Ok(InitOutcome::Initialized)
            }
            // Another caller populated the pool between our count and insert
            Err(StoreError::DuplicateKey(number)) => {
                debug!(number, "concurrent initialize won, treating as already initialized");
                Ok(InitOutcome::AlreadyInitialized)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Wipes the pool and recreates every seat unbooked.
    pub async fn reinitialize(&self) -> Result<(), BookingError> {
        let generation = Uuid::new_v4();
        self.store
            .replace_all(&Seat::fresh_pool(self.config.capacity, generation))
            .await?;
        warn!(capacity = self.config.capacity, %generation, "seat pool reinitialized");
        Ok(())
    }

    /// Books exactly `requested` seats, lowest numbers first, or none at all.
    ///
    /// The returned numbers are ascending.
    pub async fn book(&self, requested: i64) -> Result<Vec<i32>, BookingError> {
        let count = self.validate(requested)?;
        let attempts = self.config.max_retries.saturating_add(1);

        for attempt in 1..=attempts {
            let candidates = self.store.find_available(count).await?;
            if candidates.len() < count {
                return Err(BookingError::InsufficientAvailability {
                    requested: count,
                    available: candidates.len(),
                });
            }

            let Some(claim) = build_claim(candidates, count) else {
                warn!(attempt, requested = count, "store returned an inconsistent candidate set");
                self.back_off(attempt, attempts).await;
                continue;
            };

            let affected = self.store.conditional_mark_booked(&claim).await?;
            if affected == count {
                info!(attempt, seats = ?claim.numbers, "seats booked");
                return Ok(claim.numbers);
            }

            warn!(attempt, requested = count, affected, "seat commit contended, retrying");
            self.back_off(attempt, attempts).await;
        }

        warn!(attempts, requested = count, "giving up on contended booking");
        Err(BookingError::Contention { attempts })
    }

    pub async fn list_seats(&self) -> Result<Vec<Seat>, BookingError> {
        Ok(self.store.find_all().await?)
    }

    pub async fn status(&self) -> Result<PoolStatus, BookingError> {
        let seats = self.store.find_all().await?;
        Ok(PoolStatus::from_seats(&seats))
    }

    pub async fn initialize_within(&self, timeout: Duration) -> Result<InitOutcome, BookingError> {
        bounded(timeout, self.initialize()).await
    }

    pub async fn reinitialize_within(&self, timeout: Duration) -> Result<(), BookingError> {
        bounded(timeout, self.reinitialize()).await
    }

    pub async fn book_within(
        &self,
        requested: i64,
        timeout: Duration,
    ) -> Result<Vec<i32>, BookingError> {
        bounded(timeout, self.book(requested)).await
    }

    pub async fn list_seats_within(&self, timeout: Duration) -> Result<Vec<Seat>, BookingError> {
        bounded(timeout, self.list_seats()).await
    }

    pub async fn status_within(&self, timeout: Duration) -> Result<PoolStatus, BookingError> {
        bounded(timeout, self.status()).await
    }

    fn validate(&self, requested: i64) -> Result<usize, BookingError> {
        if requested <= 0 {
            return Err(BookingError::InvalidRequest("Invalid seat count".to_string()));
        }
        if requested > i64::from(self.config.max_batch) {
            return Err(BookingError::InvalidRequest(format!(
                "Cannot book more than {} seats",
                self.config.max_batch
            )));
        }
        usize::try_from(requested)
            .map_err(|_| BookingError::InvalidRequest("Invalid seat count".to_string()))
    }

    async fn back_off(&self, attempt: u32, attempts: u32) {
        if attempt < attempts {
            tokio::time::sleep(backoff_delay(self.config.retry_backoff(), attempt)).await;
        }
    }
}

const MAX_BACKOFF_SHIFT: u32 = 6;

// base * 2^(attempt - 1), capped, drawn uniformly from the upper half.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
    let ceiling = base.saturating_mul(1 << shift);
    let floor = ceiling / 2;
    let spread = u64::try_from((ceiling - floor).as_micros()).unwrap_or(u64::MAX);
    floor + Duration::from_micros(rand::thread_rng().gen_range(0..=spread))
}

// All candidates must be distinct and come from one pool generation.
fn build_claim(mut candidates: Vec<Seat>, count: usize) -> Option<Claim> {
    if candidates.len() != count {
        return None;
    }
    let generation = candidates.first()?.generation;
    if candidates.iter().any(|s| s.generation != generation) {
        return None;
    }

    candidates.sort_unstable_by_key(|s| s.number);
    let mut numbers: Vec<i32> = candidates.into_iter().map(|s| s.number).collect();
    numbers.dedup();
    if numbers.len() != count {
        return None;
    }
    Some(Claim { generation, numbers })
}

/// Runs `op` under `timeout`.
///
/// A timed-out booking has either committed nothing or committed its full batch
/// in one store call; callers can re-read the pool to find out which.
pub async fn bounded<T, F>(timeout: Duration, op: F) -> Result<T, BookingError>
where
    F: Future<Output = Result<T, BookingError>>,
{
    tokio::time::timeout(timeout, op)
        .await
        .map_err(|_| BookingError::Timeout(timeout))?
}

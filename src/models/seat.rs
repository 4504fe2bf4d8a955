use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Seat {
    #[serde(rename = "seatNumber")]
    pub number: i32,
    #[serde(rename = "isBooked")]
    pub booked: bool,
    // Which (re)initialization created this row; never leaves the process
    #[serde(skip)]
    pub generation: Uuid,
}

impl Seat {
    /// Builds a full, unbooked pool numbered `1..=capacity`.
    pub fn fresh_pool(capacity: i32, generation: Uuid) -> Vec<Seat> {
        (1..=capacity)
            .map(|number| Seat { number, booked: false, generation })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub total: usize,
    pub booked: usize,
    pub available: usize,
}

impl PoolStatus {
    pub fn from_seats(seats: &[Seat]) -> Self {
        let booked = seats.iter().filter(|s| s.booked).count();
        PoolStatus {
            total: seats.len(),
            booked,
            available: seats.len() - booked,
        }
    }
}

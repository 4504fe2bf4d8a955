pub mod seat;

pub use seat::{PoolStatus, Seat};

pub mod allocation;

pub use allocation::{AllocationEngine, InitOutcome};

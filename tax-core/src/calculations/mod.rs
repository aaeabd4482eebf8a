//! Shared arithmetic for progressive tax calculations.

pub mod common;

pub use common::{max, round_half_up};

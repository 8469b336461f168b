//! Common types for the kestrel routing toolkit

pub mod coordinate;
pub mod error;
pub mod types;

pub use coordinate::{FixedPointCoordinate, COORDINATE_PRECISION};
pub use error::{Error, Result};
pub use types::*;

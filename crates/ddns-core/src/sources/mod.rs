//! Address sources that need no platform I/O
//!
//! - [`StaticSource`]: one literal address
//! - [`JoinSource`]: merge several sources, keeping every result and error

mod join;
mod literal;

pub use join::JoinSource;
pub use literal::StaticSource;

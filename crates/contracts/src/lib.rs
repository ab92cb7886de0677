//! # Contracts
//!
//! Frozen interface contracts shared by every crate: stream kinds, the stream
//! type registry, typed records and the two external collaborators (broadcast
//! transport and eye tracker).
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Transport timestamps are seconds (f64)
//! - Record time fields and device timestamps are microseconds (i64)

mod config;
mod device;
mod error;
mod query;
mod record;
mod sample;
mod schema;
mod stream;
mod transport;

pub use config::*;
pub use device::*;
pub use error::*;
pub use query::*;
pub use record::*;
pub use sample::*;
pub use schema::*;
pub use stream::*;
pub use transport::*;

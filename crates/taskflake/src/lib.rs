//! Snowflake-style primary keys for task-service entities.
//!
//! An [`IdGenerator`] mints unique, time-ordered 64-bit keys for
//! newly created tasks, task types, and tags without a database sequence or
//! central coordinator. Construct one generator per process with a fixed
//! worker id and pass a handle to every creation flow that needs to mint
//! keys.

mod error;
mod generator;
mod id;
#[cfg(feature = "serde")]
mod serde;
mod status;
mod time;

pub use crate::error::*;
pub use crate::generator::*;
pub use crate::id::*;
#[cfg(feature = "serde")]
pub use crate::serde::*;
pub use crate::status::*;
pub use crate::time::*;

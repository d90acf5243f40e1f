//! Document sources.
//!
//! The exporter reads through [`DocumentSource`]; the MongoDB driver is one
//! implementation, [`MemorySource`] is another for tests and dry runs.

mod memory;
mod traits;

#[cfg(feature = "mongodb")]
mod mongo;

pub use memory::{FailurePoint, MemorySource};
pub use traits::{DatabaseReader, DocumentSource};

#[cfg(feature = "mongodb")]
pub use mongo::MongoSource;

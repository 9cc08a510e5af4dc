//! Store module: permission store implementations.

mod memory;

pub use memory::{DEFAULT_RETIRED_CAPACITY, InMemoryPermissionStore};

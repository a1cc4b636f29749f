//! Repository traits and driver implementations

pub mod postgres_impl;
pub mod sqlite_impl;
pub mod traits;

pub use postgres_impl::PostgresStorage;
pub use sqlite_impl::SqliteStorage;
pub use traits::*;

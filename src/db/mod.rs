//! Persistence for CropCare.
//!
//! Handlers only see the [`Store`] trait. `PgStore` is the production backend and
//! `MemoryStore` serves tests and database-less development runs.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use models::{Investor, Session, User};
pub use postgres::PgStore;
pub use store::Store;

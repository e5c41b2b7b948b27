//! Persistence layer
//!
//! The engine is written against the traits in [`store`]; it never holds a
//! global client. Two implementations are provided:
//! - [`InMemoryStore`] for tests and local runs
//! - [`PostgresStore`] for production

mod memory;
mod postgres;
mod store;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{
    CreatorDirectory, DefinitionStore, ExecutionStore, InterventionQueue, StoreError,
    WorkflowStore,
};

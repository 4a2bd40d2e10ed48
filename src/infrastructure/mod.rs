pub mod auth;
pub mod store;

pub use auth::MemoryAuthGateway;
pub use store::MemoryDocumentStore;

pub mod auth_gateway;
pub mod document_store;

pub use auth_gateway::AuthGateway;
pub use document_store::{
    DocumentQuery, DocumentSnapshot, DocumentStore, ListenerRegistration, SnapshotReceiver,
    SnapshotSender, SortDirection, TransactionFn,
};

pub mod memory_auth_gateway;

pub use memory_auth_gateway::MemoryAuthGateway;

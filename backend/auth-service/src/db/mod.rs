pub mod accounts;
pub mod service_clients;

pub use accounts::{AccountDirectory, InMemoryAccountDirectory, PgAccountDirectory};
pub use service_clients::{
    InMemoryServiceClientRepository, PgServiceClientRepository, ServiceClientRepository,
};

//! Infrastructure layer: persistence, audit trail and account workflows.
//!
//! Domain crates stay free of IO; everything that touches storage or the async
//! runtime lives here behind traits so the API can run on either the in-memory
//! store (dev/tests) or Postgres.

pub mod accounts;
pub mod audit;
pub mod in_memory;
pub mod postgres;
pub mod repository;

pub use accounts::{
    AccountError, AccountService, LoginOutcome, LoginRequest, RegisteredTenant, TenantRegistration,
};
pub use audit::{AuditAction, AuditError, AuditRecord, AuditRecorder, AuditSink, InMemoryAuditSink};
pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use repository::{
    ProjectRepository, RegistrationStore, Repositories, RepositoryError, RepositoryResult,
    TaskRepository, TenantRepository, UserRepository,
};

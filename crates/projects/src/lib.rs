//! Projects domain module.
//!
//! Tenant-owned projects and their tasks, implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage). Every value here carries the
//! tenant it belongs to; callers are expected to supply that tenant from the
//! request scope, never from client input.

pub mod project;
pub mod task;

pub use project::{Project, ProjectChanges, ProjectStatus};
pub use task::{Task, TaskChanges, TaskStatus};

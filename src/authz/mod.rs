//! Tenant-scoped authorization
//!
//! Every tenant-scoped operation goes through [`Gate::authorize`]: resolve
//! the caller's membership in the active practice, check the role against
//! the fixed permission table, and hand back a request-scoped
//! [`AuthContext`] carrying the practice id that all storage access must be
//! filtered by. There is no path to tenant data that bypasses the gate.

mod capability;
mod gate;
mod store;

pub use capability::{describe_roles, is_allowed, Capability, Role};
pub use gate::{AuthContext, Gate};
pub use store::{DirectoryStore, SqlDirectoryStore};

pub mod auth;
pub mod records;

pub use auth::{AuthError, IdentityService};
pub use records::LocalRecordStore;

pub mod protocol;
pub mod router;
pub mod state;

// Re-export the pieces the front end wires together at startup.
pub use router::{History, Page, ViewRouter};
pub use state::{AuthState, SessionContext};

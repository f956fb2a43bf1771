pub mod db;
pub mod http;
pub mod memory;

pub use db::SqliteStorage;
pub use http::{ApiClient, ClientError, RequestOptions};
pub use memory::MemoryStorage;

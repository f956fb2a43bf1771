pub mod domain;
pub mod ports;

pub use domain::{
    AdminProfile, AdminUser, DashboardStats, Record, RecordFields, Role, Session, SessionUser,
    UnknownRole,
};
pub use ports::{KeyValueStore, Navigator, PortError, PortResult, RecordRepository, TokenStore};

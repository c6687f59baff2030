pub mod applications;
pub mod connection;
pub mod events;
pub mod matches;
pub mod models;
pub mod ratings;
pub mod results;
pub mod setup;
pub mod slots;

pub use connection::{create_memory_pool, create_pool, get_connection, DbConn, DbPool};
pub use models::*;

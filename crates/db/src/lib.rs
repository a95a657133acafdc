pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod transaction;

pub use connection::{connect, connect_with_settings, ping, DbPool};
pub use repositories::RepositoryError;
pub use transaction::{in_transaction, BoxFuture};

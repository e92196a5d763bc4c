mod pg_account_repository;
mod pg_config;

pub use pg_account_repository::*;
pub use pg_config::*;

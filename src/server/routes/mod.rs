//! Route handlers organized by operation

pub mod connect;
pub mod generate;
pub mod health;
pub mod query;

//! Database layer for the local store

mod connection;
mod migrations;

pub use connection::Database;

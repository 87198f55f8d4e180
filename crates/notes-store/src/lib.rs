// ABOUTME: Persistence layer for notesd, backing the note gateway with an embedded SQLite file.
// ABOUTME: Re-exports the SQLite gateway and its error type.

pub mod sqlite;

pub use sqlite::{SqliteGateway, SqliteGatewayError};

/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
/// Player ledger and question bank backends.
pub mod trivia_store;

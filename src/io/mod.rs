/// CSV and JSON export of sizing results.
pub mod export;

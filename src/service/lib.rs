pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod persistence;
pub mod processor;
pub mod providers;
pub mod reconciliation;
pub mod services;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod test;

mod event;
mod postgresql;

pub use postgresql::PostgresqlEventStream;

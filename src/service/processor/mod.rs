mod dispatch;

pub use dispatch::DispatchProcessor;

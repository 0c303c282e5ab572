mod approval;
mod generic;
mod job;
mod target;
mod trigger;

pub use approval::ApprovalMemoryPersistence;
pub use generic::MemoryPersistence;
pub use job::JobMemoryPersistence;
pub use target::TargetMemoryPersistence;
pub use trigger::TriggerMemoryPersistence;

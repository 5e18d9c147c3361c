// Module declarations
mod branch;
mod context;
mod driver;
mod existing;
mod machine;
pub mod operations;
mod options;
mod types;

// Public API re-exports
pub use driver::{drive, summary_line};
pub use machine::{Machine, Step};
pub use operations::{OperationState, OperationStatus, RunObserver};

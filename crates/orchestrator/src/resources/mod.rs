//! RAII guards for resources that must not outlive a task.

mod temp_guard;

pub use temp_guard::TempFileGuard;

// ABOUTME: Matrix module turning axis declarations and include/exclude rules into Jobs
// ABOUTME: Jobs are independent, ordered and carry a flat axis to value assignment

pub mod error;
pub mod expander;
pub mod job;

pub use error::{MatrixError, Result};
pub use expander::{Matrix, MatrixExpander, MatrixRule};
pub use job::{Job, JobOrigin};

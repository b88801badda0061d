// ABOUTME: Error types for matrix expansion
// ABOUTME: Raised for include/exclude rules that cannot apply to the declared axes

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    #[error("Matrix axis '{axis}' has no values")]
    EmptyAxis { axis: String },

    #[error("{rule}[{index}] references undeclared axis '{axis}' (declared: {declared})")]
    UndeclaredAxis {
        rule: String,
        index: usize,
        axis: String,
        declared: String,
    },

    #[error("{rule}[{index}] is empty")]
    EmptyRule { rule: String, index: usize },
}

pub type Result<T> = std::result::Result<T, MatrixError>;

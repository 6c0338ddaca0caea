use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown field '{field}' on {scope}")]
    UnknownField { scope: &'static str, field: String },

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression must evaluate to a boolean, got {0}")]
    NonBooleanResult(String),
}

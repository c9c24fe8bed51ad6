//! Formula errors

/// Parse or evaluation failure of one expression
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    /// Expression is blank
    #[error("expression is empty")]
    Empty,

    /// Character the grammar does not know
    #[error("unsupported character {found:?} at offset {offset}")]
    UnexpectedChar {
        /// Offending character
        found: char,
        /// Byte offset
        offset: usize,
    },

    /// Malformed numeric literal
    #[error("invalid number literal {0:?}")]
    InvalidNumber(String),

    /// Token sequence does not form an expression
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Function outside the whitelist
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Identifier outside the variable namespace
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// Wrong number of arguments
    #[error("{function} expects {expected} argument(s), got {actual}")]
    Arity {
        /// Function name
        function: &'static str,
        /// Accepted count, human readable
        expected: &'static str,
        /// Supplied count
        actual: usize,
    },

    /// Variable exists but holds no number
    #[error("variable {0} has no numeric value")]
    NotNumeric(String),

    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,

    /// NaN or infinity
    #[error("expression produced a non-finite value")]
    NonFinite,
}

impl FormulaError {
    /// Raised while parsing rather than evaluating
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::Empty
                | Self::UnexpectedChar { .. }
                | Self::InvalidNumber(_)
                | Self::Syntax(_)
                | Self::UnknownFunction(_)
                | Self::UnknownVariable(_)
                | Self::Arity { .. }
        )
    }
}

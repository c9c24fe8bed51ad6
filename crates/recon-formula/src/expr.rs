//! Expression AST, parser and evaluator
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := NUMBER | IDENT | IDENT '(' args? ')' | '(' expr ')'
//! ```
//!
//! Function names are resolved against the whitelist while parsing, so an
//! [`Expr`] that exists only ever calls `abs`, `min`, `max` or `round`.

use std::collections::BTreeSet;

use recon_schema::{CellValue, Variables};

use crate::error::FormulaError;
use crate::lexer::{tokenize, Token};

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
}

/// Whitelisted function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `abs(x)`
    Abs,
    /// `min(x, ...)`
    Min,
    /// `max(x, ...)`
    Max,
    /// `round(x)` or `round(x, digits)`
    Round,
}

impl Function {
    fn resolve(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "abs" => Some(Self::Abs),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "round" => Some(Self::Round),
            _ => None,
        }
    }

    /// Name as written in expressions
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Min => "min",
            Self::Max => "max",
            Self::Round => "round",
        }
    }

    fn check_arity(self, actual: usize) -> Result<(), FormulaError> {
        let (ok, expected) = match self {
            Self::Abs => (actual == 1, "1"),
            Self::Min | Self::Max => (actual >= 1, "at least 1"),
            Self::Round => ((1..=2).contains(&actual), "1 or 2"),
        };
        if ok {
            Ok(())
        } else {
            Err(FormulaError::Arity {
                function: self.name(),
                expected,
                actual,
            })
        }
    }
}

/// Parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal
    Number(f64),
    /// Variable reference
    Variable(String),
    /// `-x`
    Negate(Box<Expr>),
    /// `left op right`
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Whitelisted call
    Call {
        /// Function
        function: Function,
        /// Arguments
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Parse without restricting identifiers
    ///
    /// # Errors
    /// Returns a parse-class [`FormulaError`] on bad syntax, unknown functions
    /// or wrong arity.
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        Parser::new(tokenize(source)?).parse()
    }

    /// Parse and check every identifier against `namespace`
    ///
    /// # Errors
    /// As [`Expr::parse`], plus [`FormulaError::UnknownVariable`].
    pub fn parse_in(source: &str, namespace: &BTreeSet<String>) -> Result<Self, FormulaError> {
        let expr = Self::parse(source)?;
        if let Some(unknown) = expr.variables().into_iter().find(|v| !namespace.contains(*v)) {
            return Err(FormulaError::UnknownVariable(unknown.to_string()));
        }
        Ok(expr)
    }

    /// Variables referenced, sorted and deduplicated
    #[must_use]
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Number(_) => {}
            Self::Variable(name) => {
                out.insert(name);
            }
            Self::Negate(inner) => inner.collect_variables(out),
            Self::Binary { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Self::Call { args, .. } => args.iter().for_each(|a| a.collect_variables(out)),
        }
    }

    /// Evaluate against a variable map
    ///
    /// # Errors
    /// [`FormulaError::UnknownVariable`], [`FormulaError::NotNumeric`],
    /// [`FormulaError::DivisionByZero`] or [`FormulaError::NonFinite`].
    pub fn eval(&self, variables: &Variables) -> Result<f64, FormulaError> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Variable(name) => {
                let value = variables
                    .get(name)
                    .ok_or_else(|| FormulaError::UnknownVariable(name.clone()))?;
                numeric(name, value)?
            }
            Self::Negate(inner) => -inner.eval(variables)?,
            Self::Binary { op, left, right } => {
                let lhs = left.eval(variables)?;
                let rhs = right.eval(variables)?;
                match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Subtract => lhs - rhs,
                    BinaryOp::Multiply => lhs * rhs,
                    BinaryOp::Divide => {
                        if rhs == 0.0 {
                            return Err(FormulaError::DivisionByZero);
                        }
                        lhs / rhs
                    }
                }
            }
            Self::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|a| a.eval(variables))
                    .collect::<Result<Vec<_>, _>>()?;
                apply(*function, &values)
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite)
        }
    }
}

fn numeric(name: &str, value: &CellValue) -> Result<f64, FormulaError> {
    value
        .as_number()
        .ok_or_else(|| FormulaError::NotNumeric(name.to_string()))
}

fn apply(function: Function, values: &[f64]) -> f64 {
    match function {
        Function::Abs => values[0].abs(),
        Function::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Function::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Function::Round => {
            let digits = values.get(1).copied().unwrap_or(0.0).trunc();
            round_to(values[0], digits)
        }
    }
}

/// Round half away from zero to `digits` decimals
#[must_use]
pub fn round_to(value: f64, digits: f64) -> f64 {
    let scale = 10f64.powf(digits);
    (value * scale).round() / scale
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, index: 0 }
    }

    fn parse(mut self) -> Result<Expr, FormulaError> {
        let expr = self.parse_add_sub()?;
        if self.index != self.tokens.len() {
            return Err(FormulaError::Syntax("unexpected trailing tokens".into()));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn parse_add_sub(&mut self) -> Result<Expr, FormulaError> {
        let mut expr = self.parse_mul_div()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => break,
            };
            self.consume();
            let right = self.parse_mul_div()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_mul_div(&mut self) -> Result<Expr, FormulaError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.consume();
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => {
                if !matches!(self.peek(), Some(Token::LParen)) {
                    return Ok(Expr::Variable(name));
                }
                self.consume();
                let function =
                    Function::resolve(&name).ok_or(FormulaError::UnknownFunction(name))?;
                let mut args = Vec::new();
                if !matches!(self.peek(), Some(Token::RParen)) {
                    loop {
                        args.push(self.parse_add_sub()?);
                        if matches!(self.peek(), Some(Token::Comma)) {
                            self.consume();
                            continue;
                        }
                        break;
                    }
                }
                if !matches!(self.consume(), Some(Token::RParen)) {
                    return Err(FormulaError::Syntax(format!(
                        "{} is missing closing ')'",
                        function.name()
                    )));
                }
                function.check_arity(args.len())?;
                Ok(Expr::Call { function, args })
            }
            Some(Token::LParen) => {
                let expr = self.parse_add_sub()?;
                if !matches!(self.consume(), Some(Token::RParen)) {
                    return Err(FormulaError::Syntax("missing ')'".into()));
                }
                Ok(expr)
            }
            Some(other) => Err(FormulaError::Syntax(format!("unexpected token {other:?}"))),
            None => Err(FormulaError::Syntax("unexpected end of expression".into())),
        }
    }
}

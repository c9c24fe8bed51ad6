//! Recon Formula
//!
//! Derived values of an issue: formula cells, `calc_logic` derivations and
//! the tax / interest / penalty demand totals.
//!
//! # Core Concepts
//!
//! - [`Expr`]: parsed expression over the variable namespace; functions are
//!   limited to `abs`, `min`, `max`, `round`
//! - [`FormulaEngine`]: bounded multi-pass recomputation with per-formula
//!   failure isolation
//! - [`DemandTotals`]: mapped totals with a labelled-row fallback
//!
//! # Example
//!
//! ```rust
//! use recon_formula::Expr;
//! use recon_schema::{CellValue, Variables};
//!
//! let mut vars = Variables::new();
//! vars.insert("tax".into(), CellValue::Number(1000.0));
//! let expr = Expr::parse("round(tax * 0.18, 2)").unwrap();
//! assert_eq!(expr.eval(&vars).unwrap(), 180.0);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod expr;
mod lexer;
mod recompute;
mod totals;

pub use error::FormulaError;
pub use expr::{round_to, BinaryOp, Expr, Function};
pub use recompute::{FormulaConfig, FormulaEngine, FormulaFailure, RecomputeReport};
pub use totals::{demand_totals, DemandTotals, TotalsSource};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

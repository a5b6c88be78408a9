// SPDX-License-Identifier: MIT

//! Derived-field formulas
//!
//! A formula is either a bare field id or a function call:
//! - `total_days` copies another field
//! - `daysBetween(start_date, end_date)` counts days inclusively
//! - `round(sum(price, tax), 2)` nests calls
//!
//! Supported functions: `daysBetween`, `concat`, `sum`, `round`, `toNumber`.

mod ast;
mod evaluator;
mod lexer;
mod parser;

pub use ast::{Expr, Literal};
pub use evaluator::{evaluate, format_number, FieldValues, Formula};
pub use parser::parse;

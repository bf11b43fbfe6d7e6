//! Expression and rule AST, evaluator, and built-in functions for Trellis.
//!
//! This crate provides:
//! - [`Expr`] - Expression trees with a canonical text form
//! - [`Rule`] and [`RuleSet`] - The parsed rule structures the engine compiles
//! - [`Evaluator`] - Evaluates expressions against [`Bindings`]
//! - [`FunctionTable`] - Built-in functions (`LENGTH`, `UPPER`, `ROUND`, ...)
//!
//! There is no surface grammar here; front-ends build these structures
//! directly.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ast;
pub mod eval;
pub mod native;
pub mod rule;

pub use ast::{BinaryOp, Expr};
pub use eval::{Bindings, Evaluator};
pub use native::{Arity, FunctionTable, NativeFn};
pub use rule::{
    Accumulation, Action, AggregateFn, Quantified, Rule, RuleSet, SubPattern, TypedVariable,
};

//! Trigger expressions
//!
//! ```text
//! host1.user.bob > 0 and not host1.load.1 > 4
//! ```
//!
//! Precedence from tightest to loosest is `not`, `and`, `or`, comparisons,
//! `+ -`, `* /`. Arithmetic therefore binds *looser* than comparisons:
//! `1 + 2 > 5` is `1 + (2 > 5)`. Every binary operator is left-associative
//! except comparisons, which group to the right (`a > b > c` is
//! `a > (b > c)`).
//!
//! Evaluation happens in two phases. Every variable is first resolved through
//! the [`EndpointRegistry`] into a [`Snapshot`]; the tree is then evaluated
//! eagerly against that snapshot, so both operands of every operator are
//! always computed.

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::{BinaryOp, Expr};
pub use eval::{Snapshot, Value};
pub use parser::parse;

use automato_core::EndpointRegistry;
use thiserror::Error;

/// Expression errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("'{variable}' is unavailable: {reason}")]
    Absent { variable: String, reason: String },

    #[error("unsupported operand types for '{op}': {left} and {right}")]
    TypeMismatch {
        op: BinaryOp,
        left: &'static str,
        right: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{0}'")]
    Overflow(BinaryOp),
}

/// Result type for expression parsing and evaluation
pub type ExprResult<T> = Result<T, ExprError>;

/// A parsed expression together with its source text
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    text: String,
    ast: Expr,
}

impl Expression {
    pub fn parse(text: impl Into<String>) -> ExprResult<Self> {
        let text = text.into();
        let ast = parse(&text)?;
        Ok(Self { text, ast })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Resolve every variable, then evaluate
    pub async fn evaluate(&self, endpoints: &EndpointRegistry) -> ExprResult<Value> {
        let snapshot = Snapshot::resolve(&self.ast, endpoints).await;
        self.ast.evaluate(&snapshot)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

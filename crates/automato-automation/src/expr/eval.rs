//! Values and evaluation

use automato_core::EndpointRegistry;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use super::ast::{BinaryOp, Expr};
use super::{ExprError, ExprResult};

/// Runtime value of an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Read a state value; `None` for values an expression cannot use
    ///
    /// Strings holding an integer or float literal are read as numbers.
    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float)),
            serde_json::Value::String(s) => Some(Self::from_text(s)),
            _ => None,
        }
    }

    fn from_text(text: &str) -> Value {
        let trimmed = text.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => Value::Str(text.to_string()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    fn number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::Str(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

/// Resolved variables of one expression
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    values: HashMap<String, Result<Value, String>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every variable of `expr`, collecting stale state where needed
    pub async fn resolve(expr: &Expr, endpoints: &EndpointRegistry) -> Self {
        let mut snapshot = Self::new();
        for variable in expr.variables() {
            let value = match endpoints.resolve_state(variable).await {
                Ok(raw) => Value::from_json(&raw)
                    .ok_or_else(|| format!("value {} is not a scalar", raw)),
                Err(e) => {
                    warn!(variable, error = %e, "Variable unresolved");
                    Err(e.to_string())
                }
            };
            snapshot.values.insert(variable.to_string(), value);
        }
        snapshot
    }

    pub fn insert(&mut self, variable: impl Into<String>, value: Value) {
        self.values.insert(variable.into(), Ok(value));
    }

    /// Record a variable as unavailable
    pub fn insert_absent(&mut self, variable: impl Into<String>, reason: impl Into<String>) {
        self.values.insert(variable.into(), Err(reason.into()));
    }

    fn get(&self, variable: &str) -> ExprResult<Value> {
        match self.values.get(variable) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(reason)) => Err(ExprError::Absent {
                variable: variable.to_string(),
                reason: reason.clone(),
            }),
            None => Err(ExprError::Absent {
                variable: variable.to_string(),
                reason: "not resolved".to_string(),
            }),
        }
    }
}

impl Expr {
    /// Evaluate against resolved variables; both operands are always computed
    pub fn evaluate(&self, snapshot: &Snapshot) -> ExprResult<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => snapshot.get(name),
            Expr::Not(inner) => inner.evaluate(snapshot).map(|v| Value::Bool(!v.is_truthy())),
            Expr::Binary { op, left, right } => {
                let left = left.evaluate(snapshot);
                let right = right.evaluate(snapshot);
                let result = apply(*op, left?, right?);
                if let Err(ref e) = result {
                    debug!(op = %op, error = %e, "Operator failed");
                }
                result
            }
        }
    }
}

fn apply(op: BinaryOp, left: Value, right: Value) -> ExprResult<Value> {
    match op {
        BinaryOp::And => Ok(if left.is_truthy() { right } else { left }),
        BinaryOp::Or => Ok(if left.is_truthy() { left } else { right }),
        BinaryOp::Eq => Ok(Value::Bool(equals(&left, &right))),
        BinaryOp::Gt => order(op, &left, &right).map(|o| Value::Bool(o == Ordering::Greater)),
        BinaryOp::Ge => order(op, &left, &right).map(|o| Value::Bool(o != Ordering::Less)),
        BinaryOp::Lt => order(op, &left, &right).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOp::Le => order(op, &left, &right).map(|o| Value::Bool(o != Ordering::Greater)),
        BinaryOp::Add => match (&left, &right) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            _ => arithmetic(op, &left, &right, i64::checked_add, |a, b| a + b),
        },
        BinaryOp::Sub => arithmetic(op, &left, &right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => arithmetic(op, &left, &right, i64::checked_mul, |a, b| a * b),
        BinaryOp::Div => {
            let (a, b) = numbers(op, &left, &right)?;
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Value::Float(a.as_f64() / divisor))
        }
    }
}

fn numbers(op: BinaryOp, left: &Value, right: &Value) -> ExprResult<(Number, Number)> {
    match (left.number(), right.number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ExprError::TypeMismatch {
            op,
            left: left.type_name(),
            right: right.type_name(),
        }),
    }
}

fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> ExprResult<Value> {
    match numbers(op, left, right)? {
        (Number::Int(a), Number::Int(b)) => int_op(a, b)
            .map(Value::Int)
            .ok_or(ExprError::Overflow(op)),
        (a, b) => Ok(Value::Float(float_op(a.as_f64(), b.as_f64()))),
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => match (left.number(), right.number()) {
            (Some(a), Some(b)) => a.compare(b) == Some(Ordering::Equal),
            _ => false,
        },
    }
}

fn order(op: BinaryOp, left: &Value, right: &Value) -> ExprResult<Ordering> {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Ok(a.cmp(b));
    }
    let (a, b) = numbers(op, left, right)?;
    // Only NaN is unordered
    a.compare(b).ok_or(ExprError::TypeMismatch {
        op,
        left: left.type_name(),
        right: right.type_name(),
    })
}

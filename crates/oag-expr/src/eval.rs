//! Expression interpreter over JSON scopes.
//!
//! Evaluation is total over the accepted grammar: every failure mode
//! (missing field, type mismatch, division by zero, non-boolean result)
//! returns an [`ExprError`] — nothing panics and nothing escapes the three
//! scope values handed in.

use serde_json::Value;

use crate::ast::{BinaryOp, Builtin, Expr, Literal, ScopeRoot, UnaryOp};
use crate::error::ExprError;

/// The three values an expression may read. Scopes are borrowed read-only;
/// the evaluator cannot mutate them.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub state: &'a Value,
    pub param: &'a Value,
    pub user: &'a Value,
}

impl<'a> Scope<'a> {
    pub fn new(state: &'a Value, param: &'a Value, user: &'a Value) -> Self {
        Self { state, param, user }
    }

    fn root(&self, root: ScopeRoot) -> &'a Value {
        match root {
            ScopeRoot::State => self.state,
            ScopeRoot::Param => self.param,
            ScopeRoot::User => self.user,
        }
    }
}

/// Evaluate an expression to a JSON value.
pub fn evaluate(expr: &Expr, scope: &Scope<'_>) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(lit) => Ok(literal_value(lit)),
        Expr::Path { root, segments } => resolve_path(scope.root(*root), *root, segments),
        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(evaluate(item, scope)?);
            }
            Ok(Value::Array(values))
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, scope)?;
            apply_unary(*op, value)
        }
        Expr::Binary { op, lhs, rhs } => apply_binary(*op, lhs, rhs, scope),
        Expr::Call { builtin, arg } => {
            let value = evaluate(arg, scope)?;
            apply_builtin(*builtin, value)
        }
    }
}

/// Evaluate an expression that must produce a boolean.
pub fn evaluate_predicate(expr: &Expr, scope: &Scope<'_>) -> Result<bool, ExprError> {
    match evaluate(expr, scope)? {
        Value::Bool(b) => Ok(b),
        other => Err(ExprError::NonBooleanResult(type_name(&other).to_string())),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Int(i) => Value::from(*i),
        Literal::Float(f) => Value::from(*f),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn resolve_path(
    root_value: &Value,
    root: ScopeRoot,
    segments: &[String],
) -> Result<Value, ExprError> {
    let mut current = root_value;
    for segment in segments {
        current = current
            .get(segment)
            .ok_or_else(|| ExprError::UnknownField {
                scope: root.as_str(),
                field: segment.clone(),
            })?;
    }
    Ok(current.clone())
}

fn apply_unary(op: UnaryOp, value: Value) -> Result<Value, ExprError> {
    match op {
        UnaryOp::Not => match value {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(ExprError::Type(format!(
                "'not' requires a boolean, got {}",
                type_name(&other)
            ))),
        },
        UnaryOp::Neg => match as_number(&value) {
            Some(Num::Int(i)) => Ok(Value::from(-i)),
            Some(Num::Float(f)) => Ok(Value::from(-f)),
            None => Err(ExprError::Type(format!(
                "unary '-' requires a number, got {}",
                type_name(&value)
            ))),
        },
    }
}

fn apply_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    scope: &Scope<'_>,
) -> Result<Value, ExprError> {
    // Boolean operators short-circuit.
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let left = match evaluate(lhs, scope)? {
            Value::Bool(b) => b,
            other => {
                return Err(ExprError::Type(format!(
                    "boolean operator requires booleans, got {}",
                    type_name(&other)
                )))
            }
        };
        match (op, left) {
            (BinaryOp::And, false) => return Ok(Value::Bool(false)),
            (BinaryOp::Or, true) => return Ok(Value::Bool(true)),
            _ => {}
        }
        return match evaluate(rhs, scope)? {
            Value::Bool(b) => Ok(Value::Bool(b)),
            other => Err(ExprError::Type(format!(
                "boolean operator requires booleans, got {}",
                type_name(&other)
            ))),
        };
    }

    let left = evaluate(lhs, scope)?;
    let right = evaluate(rhs, scope)?;

    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&left, &right))),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            let ordering = compare(&left, &right)?;
            let result = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Lte => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Gte => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::Add => arithmetic(left, right, op),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => arithmetic(left, right, op),
        BinaryOp::In => Ok(Value::Bool(contains(&right, &left)?)),
        BinaryOp::NotIn => Ok(Value::Bool(!contains(&right, &left)?)),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn apply_builtin(builtin: Builtin, value: Value) -> Result<Value, ExprError> {
    match builtin {
        Builtin::Len => match &value {
            Value::String(s) => Ok(Value::from(s.chars().count() as i64)),
            Value::Array(items) => Ok(Value::from(items.len() as i64)),
            Value::Object(map) => Ok(Value::from(map.len() as i64)),
            other => Err(ExprError::Type(format!(
                "len() requires a string, list or object, got {}",
                type_name(other)
            ))),
        },
        Builtin::Abs => match as_number(&value) {
            Some(Num::Int(i)) => Ok(Value::from(i.abs())),
            Some(Num::Float(f)) => Ok(Value::from(f.abs())),
            None => Err(ExprError::Type(format!(
                "abs() requires a number, got {}",
                type_name(&value)
            ))),
        },
    }
}

// ── Value helpers ────────────────────────────────────────────────

enum Num {
    Int(i64),
    Float(f64),
}

fn as_number(value: &Value) -> Option<Num> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Num::Int(i))
            } else {
                n.as_f64().map(Num::Float)
            }
        }
        _ => None,
    }
}

/// Equality with int/float promotion; everything else is JSON equality.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => num_to_f64(&x) == num_to_f64(&y),
        _ => a == b,
    }
}

fn num_to_f64(n: &Num) -> f64 {
    match n {
        Num::Int(i) => *i as f64,
        Num::Float(f) => *f,
    }
}

fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, ExprError> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return num_to_f64(&x)
            .partial_cmp(&num_to_f64(&y))
            .ok_or_else(|| ExprError::Type("numbers are not comparable".into()));
    }
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Ok(x.cmp(y));
    }
    Err(ExprError::Type(format!(
        "cannot compare {} with {}",
        type_name(a),
        type_name(b)
    )))
}

fn arithmetic(left: Value, right: Value, op: BinaryOp) -> Result<Value, ExprError> {
    // String concatenation is the one non-numeric case.
    if op == BinaryOp::Add {
        if let (Value::String(a), Value::String(b)) = (&left, &right) {
            return Ok(Value::String(format!("{a}{b}")));
        }
    }

    let (a, b) = match (as_number(&left), as_number(&right)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(ExprError::Type(format!(
                "arithmetic requires numbers, got {} and {}",
                type_name(&left),
                type_name(&right)
            )))
        }
    };

    match (op, a, b) {
        (BinaryOp::Add, Num::Int(x), Num::Int(y)) => Ok(Value::from(x + y)),
        (BinaryOp::Sub, Num::Int(x), Num::Int(y)) => Ok(Value::from(x - y)),
        (BinaryOp::Mul, Num::Int(x), Num::Int(y)) => Ok(Value::from(x * y)),
        (BinaryOp::Div, _, b) if num_is_zero(&b) => Err(ExprError::DivisionByZero),
        (BinaryOp::Div, a, b) => Ok(Value::from(num_to_f64(&a) / num_to_f64(&b))),
        (op, a, b) => {
            let (x, y) = (num_to_f64(&a), num_to_f64(&b));
            let result = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                _ => unreachable!(),
            };
            Ok(Value::from(result))
        }
    }
}

fn num_is_zero(n: &Num) -> bool {
    match n {
        Num::Int(i) => *i == 0,
        Num::Float(f) => *f == 0.0,
    }
}

/// `needle in haystack`: list membership, or substring when both are strings.
fn contains(haystack: &Value, needle: &Value) -> Result<bool, ExprError> {
    match haystack {
        Value::Array(items) => Ok(items.iter().any(|item| values_equal(item, needle))),
        Value::String(s) => match needle {
            Value::String(sub) => Ok(s.contains(sub.as_str())),
            other => Err(ExprError::Type(format!(
                "'in' on a string requires a string needle, got {}",
                type_name(other)
            ))),
        },
        other => Err(ExprError::Type(format!(
            "'in' requires a list or string on the right, got {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

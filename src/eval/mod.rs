//! The embedded expression language of template directives.
//!
//! A deliberately small, side-effect-free subset: literals, identifiers,
//! member/index access, calls, arithmetic, comparisons, boolean logic and
//! the ternary. Identifiers resolve against the rendering scope's locals
//! first, then the owning component's state; reads through state register
//! fine-grained dependencies as they go. There is no access to anything
//! outside the component, and no assignment.

mod lexer;
mod parser;

use std::{cell::RefCell, rc::Rc};

use cairn_reactive::Value;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::warn;

use crate::component::Scope;
use crate::event::Event;

use parser::{BinaryOp, Expr, UnaryOp};

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("cannot parse `{src}`: {message}")]
    Parse { src: String, message: String },
    #[error("`{0}` is not a method of this component")]
    UnknownMethod(String),
    #[error("`{0}` is not callable here")]
    NotCallable(String),
}

impl EvalError {
    pub(crate) fn parse(src: &str, message: &str) -> EvalError {
        EvalError::Parse {
            src: src.to_string(),
            message: message.to_string(),
        }
    }
}

thread_local! {
    // templates re-evaluate the same sources on every pass
    static PARSED: RefCell<FxHashMap<String, Rc<Expr>>> = RefCell::new(FxHashMap::default());
}

fn parsed(src: &str) -> Result<Rc<Expr>, EvalError> {
    if let Some(hit) = PARSED.with(|cache| cache.borrow().get(src).cloned()) {
        return Ok(hit);
    }
    let tokens = lexer::tokenize(src)?;
    let expr = Rc::new(parser::parse(src, &tokens)?);
    PARSED.with(|cache| {
        cache
            .borrow_mut()
            .insert(src.to_string(), expr.clone())
    });
    Ok(expr)
}

/// Evaluate `src` in `scope`.
pub fn evaluate(scope: &Scope, src: &str) -> Result<Value, EvalError> {
    let expr = parsed(src)?;
    Interp { scope, event: None }.eval(&expr).map(|out| out.value)
}

/// Evaluate a handler expression with `event` bound.
pub(crate) fn evaluate_with_event(
    scope: &Scope,
    src: &str,
    event: &Event,
) -> Result<Value, EvalError> {
    let expr = parsed(src)?;
    Interp {
        scope,
        event: Some(event),
    }
    .eval(&expr)
    .map(|out| out.value)
}

/// Evaluate, logging and yielding `Null` on failure. A broken expression
/// must never take down a render pass.
pub(crate) fn evaluate_or_null(scope: &Scope, src: &str) -> Value {
    match evaluate(scope, src) {
        Ok(value) => value,
        Err(error) => {
            warn!(expression = src, %error, "expression failed");
            Value::Null
        }
    }
}

/// Evaluate and report the state path the result was read from, when the
/// expression is a plain member/index chain. Loops use the path to give
/// each iteration variable its provenance.
pub(crate) fn evaluate_traced(scope: &Scope, src: &str) -> (Value, Option<String>) {
    let expr = match parsed(src) {
        Ok(expr) => expr,
        Err(error) => {
            warn!(expression = src, %error, "expression failed");
            return (Value::Null, None);
        }
    };
    match (Interp { scope, event: None }).eval(&expr) {
        Ok(out) => (out.value, out.path),
        Err(error) => {
            warn!(expression = src, %error, "expression failed");
            (Value::Null, None)
        }
    }
}

/// `Some(name)` when `src` is nothing but one identifier, the shorthand
/// handler form (`@click="increment"`).
pub(crate) fn bare_ident(src: &str) -> Option<&str> {
    let name = src.trim();
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return None;
    }
    match name {
        "true" | "false" | "null" | "undefined" | "event" => None,
        _ => Some(name),
    }
}

/// A value plus the state path it was read from, when it still names one.
struct Outcome {
    value: Value,
    path: Option<String>,
}

impl Outcome {
    fn plain(value: Value) -> Outcome {
        Outcome { value, path: None }
    }
}

struct Interp<'a> {
    scope: &'a Scope,
    event: Option<&'a Event>,
}

impl Interp<'_> {
    fn eval(&self, expr: &Expr) -> Result<Outcome, EvalError> {
        match expr {
            Expr::Null => Ok(Outcome::plain(Value::Null)),
            Expr::Bool(b) => Ok(Outcome::plain(Value::Bool(*b))),
            Expr::Int(n) => Ok(Outcome::plain(Value::Int(*n))),
            Expr::Float(f) => Ok(Outcome::plain(Value::Float(*f))),
            Expr::Str(s) => Ok(Outcome::plain(Value::str(s))),
            Expr::Ident(name) => Ok(self.ident(name)),
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| Ok(self.eval(item)?.value))
                    .collect::<Result<Vec<_>, EvalError>>()?;
                Ok(Outcome::plain(Value::list(values)))
            }
            Expr::Object(entries) => {
                let mut map = indexmap::IndexMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value)?.value);
                }
                Ok(Outcome::plain(Value::map(map)))
            }
            Expr::Member(base, key) => {
                let base = self.eval(base)?;
                Ok(self.member(base, key))
            }
            Expr::Index(base, index) => {
                let base = self.eval(base)?;
                let key = self.eval(index)?.value.display_string();
                Ok(self.member(base, &key))
            }
            Expr::Call(callee, args) => self.call(callee, args),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?.value;
                Ok(Outcome::plain(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => match value {
                        Value::Int(n) => Value::Int(-n),
                        other => Value::Float(-other.as_f64().unwrap_or(f64::NAN)),
                    },
                }))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?.value;
                let right = self.eval(right)?.value;
                Ok(Outcome::plain(binary(*op, left, right)))
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if !left.value.truthy() {
                    return Ok(left);
                }
                self.eval(right)
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.value.truthy() {
                    return Ok(left);
                }
                self.eval(right)
            }
            Expr::Ternary(condition, then, otherwise) => {
                if self.eval(condition)?.value.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn ident(&self, name: &str) -> Outcome {
        if name == "event" {
            if let Some(event) = self.event {
                return Outcome::plain(event.to_value());
            }
        }
        if let Some(local) = self.scope.lookup_local(name) {
            if let (Some(path), Some(store)) = (&local.path, self.scope.store()) {
                store.track(path);
            }
            return Outcome {
                value: local.value,
                path: local.path.as_ref().map(|p| p.to_string()),
            };
        }
        match self.scope.store() {
            Some(store) => Outcome {
                value: store.get(name),
                path: Some(name.to_string()),
            },
            None => Outcome::plain(Value::Null),
        }
    }

    /// Member access extends the provenance path and registers the read.
    fn member(&self, base: Outcome, key: &str) -> Outcome {
        let path = base.path.map(|p| format!("{p}/{key}"));
        if let (Some(path), Some(store)) = (&path, self.scope.store()) {
            store.track(path);
        }
        Outcome {
            value: base.value.get_member(key),
            path,
        }
    }

    fn call(&self, callee: &Expr, args: &[Expr]) -> Result<Outcome, EvalError> {
        // event.preventDefault() / event.stopPropagation()
        if let Expr::Member(base, method) = callee {
            if matches!(base.as_ref(), Expr::Ident(name) if name == "event") {
                if let Some(event) = self.event {
                    match method.as_str() {
                        "preventDefault" => {
                            event.prevent_default();
                            return Ok(Outcome::plain(Value::Null));
                        }
                        "stopPropagation" => {
                            event.stop_propagation();
                            return Ok(Outcome::plain(Value::Null));
                        }
                        _ => {}
                    }
                }
            }
        }
        let values = args
            .iter()
            .map(|arg| Ok(self.eval(arg)?.value))
            .collect::<Result<Vec<_>, EvalError>>()?;
        match callee {
            Expr::Ident(name) => {
                if self.scope.has_method(name) {
                    return Ok(Outcome::plain(self.scope.call_method(name, &values)));
                }
                Err(EvalError::UnknownMethod(name.clone()))
            }
            Expr::Member(base, method) => {
                let receiver = self.eval(base)?.value;
                value_method(&receiver, method, &values)
                    .map(Outcome::plain)
                    .ok_or_else(|| EvalError::NotCallable(method.clone()))
            }
            _ => Err(EvalError::NotCallable("expression".to_string())),
        }
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Value {
    match op {
        BinaryOp::Eq => Value::Bool(left == right),
        BinaryOp::NotEq => Value::Bool(left != right),
        BinaryOp::Add => {
            if left.as_str().is_some() || right.as_str().is_some() {
                Value::str(format!("{}{}", left.display_string(), right.display_string()))
            } else {
                numeric(left, right, |a, b| a + b, |a, b| a.checked_add(b))
            }
        }
        BinaryOp::Sub => numeric(left, right, |a, b| a - b, |a, b| a.checked_sub(b)),
        BinaryOp::Mul => numeric(left, right, |a, b| a * b, |a, b| a.checked_mul(b)),
        BinaryOp::Rem => numeric(left, right, |a, b| a % b, |a, b| a.checked_rem(b)),
        BinaryOp::Div => {
            let (a, b) = (
                left.as_f64().unwrap_or(f64::NAN),
                right.as_f64().unwrap_or(f64::NAN),
            );
            if let (Value::Int(ai), Value::Int(bi)) = (&left, &right) {
                if *bi != 0 && ai % bi == 0 {
                    return Value::Int(ai / bi);
                }
            }
            Value::Float(a / b)
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => Some(left.display_string().cmp(&right.display_string())),
            };
            let Some(ordering) = ordering else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}

fn numeric(
    left: Value,
    right: Value,
    float_op: fn(f64, f64) -> f64,
    int_op: fn(i64, i64) -> Option<i64>,
) -> Value {
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        if let Some(n) = int_op(*a, *b) {
            return Value::Int(n);
        }
    }
    Value::Float(float_op(
        left.as_f64().unwrap_or(f64::NAN),
        right.as_f64().unwrap_or(f64::NAN),
    ))
}

/// The handful of host-object methods templates lean on.
fn value_method(receiver: &Value, method: &str, args: &[Value]) -> Option<Value> {
    match (receiver, method) {
        (Value::Str(s), "toUpperCase") => Some(Value::str(s.to_uppercase())),
        (Value::Str(s), "toLowerCase") => Some(Value::str(s.to_lowercase())),
        (Value::Str(s), "trim") => Some(Value::str(s.trim())),
        (Value::Str(s), "includes") => {
            let needle = args.first().map(Value::display_string).unwrap_or_default();
            Some(Value::Bool(s.contains(&needle)))
        }
        (Value::List(items), "includes") => {
            let needle = args.first().cloned().unwrap_or(Value::Null);
            Some(Value::Bool(items.borrow().iter().any(|v| *v == needle)))
        }
        (Value::List(items), "join") => {
            let separator = args
                .first()
                .map(Value::display_string)
                .unwrap_or_else(|| ",".to_string());
            Some(Value::str(
                items
                    .borrow()
                    .iter()
                    .map(Value::display_string)
                    .collect::<Vec<_>>()
                    .join(&separator),
            ))
        }
        (Value::List(items), "indexOf") => {
            let needle = args.first().cloned().unwrap_or(Value::Null);
            Some(Value::Int(
                items
                    .borrow()
                    .iter()
                    .position(|v| *v == needle)
                    .map(|i| i as i64)
                    .unwrap_or(-1),
            ))
        }
        _ => None,
    }
}

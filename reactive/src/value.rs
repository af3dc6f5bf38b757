use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// A dynamic value held in a component's observable state bag.
///
/// Containers are `Rc`-shared with interior mutability so a value read out
/// of the store aliases the stored data: mutating through a path is visible
/// to every holder, and container identity (`Rc` pointer) survives reads,
/// which is what object identity tokens and `==` on containers rely on.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<IndexMap<String, Value>>>),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: IndexMap<String, Value>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn empty_map() -> Value {
        Value::Map(Rc::new(RefCell::new(IndexMap::new())))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            // containers are always truthy, empty or not
            Value::List(_) | Value::Map(_) => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) => Some(*f as i64),
            Value::Bool(b) => Some(*b as i64),
            Value::Str(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string an attribute or text node receives for this value.
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_f64(*f),
            Value::Str(s) => s.to_string(),
            Value::List(items) => items
                .borrow()
                .iter()
                .map(Value::display_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Map(_) => "[object Object]".to_string(),
        }
    }

    /// Member access without dependency side effects. Lists answer numeric
    /// keys and `length`; strings answer `length`.
    pub fn get_member(&self, key: &str) -> Value {
        match self {
            Value::Map(map) => map.borrow().get(key).cloned().unwrap_or(Value::Null),
            Value::List(items) => {
                if key == "length" {
                    Value::Int(items.borrow().len() as i64)
                } else if let Ok(index) = key.parse::<usize>() {
                    items.borrow().get(index).cloned().unwrap_or(Value::Null)
                } else {
                    Value::Null
                }
            }
            Value::Str(s) => {
                if key == "length" {
                    Value::Int(s.chars().count() as i64)
                } else {
                    Value::Null
                }
            }
            _ => Value::Null,
        }
    }

    /// Write a member in place. Returns false when the value is not a
    /// container or the list index is out of range.
    pub fn set_member(&self, key: &str, value: Value) -> bool {
        match self {
            Value::Map(map) => {
                map.borrow_mut().insert(key.to_string(), value);
                true
            }
            Value::List(items) => {
                let Ok(index) = key.parse::<usize>() else {
                    return false;
                };
                let mut items = items.borrow_mut();
                if index < items.len() {
                    items[index] = value;
                    true
                } else if index == items.len() {
                    items.push(value);
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => {
                serde_json::Value::Array(items.borrow().iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::str(s),
            serde_json::Value::Array(items) => {
                Value::list(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(Rc::new(RefCell::new(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ))),
        }
    }
}

fn format_f64(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{f}")
    }
}

impl PartialEq for Value {
    /// Loose equality: numbers compare across `Int`/`Float`, containers
    /// compare by identity (matching host-language `==` on objects).
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Value {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::list(items)
    }
}

enum WeakContainer {
    List(Weak<RefCell<Vec<Value>>>),
    Map(Weak<RefCell<IndexMap<String, Value>>>),
}

impl WeakContainer {
    fn alive(&self) -> bool {
        match self {
            WeakContainer::List(w) => w.strong_count() > 0,
            WeakContainer::Map(w) => w.strong_count() > 0,
        }
    }
}

thread_local! {
    static IDENTITY: RefCell<IdentityMap> = RefCell::new(IdentityMap::default());
}

#[derive(Default)]
struct IdentityMap {
    tokens: FxHashMap<usize, (WeakContainer, u64)>,
    next: u64,
}

/// A stable, opaque token for a container value, so the DOM can carry a
/// reference marker for objects in an attribute. Tokens are held weakly and
/// lapse with the container.
pub fn identity_token(value: &Value) -> Option<String> {
    let (addr, weak) = match value {
        Value::List(rc) => (Rc::as_ptr(rc) as usize, WeakContainer::List(Rc::downgrade(rc))),
        Value::Map(rc) => (Rc::as_ptr(rc) as usize, WeakContainer::Map(Rc::downgrade(rc))),
        _ => return None,
    };
    IDENTITY.with(|identity| {
        let mut identity = identity.borrow_mut();
        match identity.tokens.get(&addr) {
            // an allocation can be reused after its container dies
            Some((weak_held, token)) if weak_held.alive() => Some(format!("obj-{token}")),
            _ => {
                identity.next += 1;
                let token = identity.next;
                identity.tokens.insert(addr, (weak, token));
                Some(format!("obj-{token}"))
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containers_share_on_clone() {
        let list = Value::list(vec![Value::Int(1)]);
        let alias = list.clone();
        alias.set_member("0", Value::Int(5));
        assert_eq!(list.get_member("0"), Value::Int(5));
    }

    #[test]
    fn identity_tokens_are_stable_per_object() {
        let a = Value::empty_map();
        let b = Value::empty_map();
        let ta = identity_token(&a).unwrap();
        assert_eq!(identity_token(&a).unwrap(), ta);
        assert_ne!(identity_token(&b).unwrap(), ta);
        assert!(identity_token(&Value::Int(3)).is_none());
    }

    #[test]
    fn loose_numeric_equality() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::str("2"), Value::Int(2));
    }

    #[test]
    fn json_round_trip() {
        let v = Value::map(
            [
                ("title".to_string(), Value::str("hi")),
                ("count".to_string(), Value::Int(3)),
                ("tags".to_string(), Value::list(vec![Value::str("a")])),
            ]
            .into_iter()
            .collect(),
        );
        let back = Value::from_json(&v.to_json());
        assert_eq!(back.get_member("title"), Value::str("hi"));
        assert_eq!(back.get_member("tags").get_member("length"), Value::Int(1));
    }
}

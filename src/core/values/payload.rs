use super::typed_value::OpaqueValue;
use crate::core::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type InvokeFn = dyn Fn(&[Payload]) -> Result<Payload> + Send + Sync;

/// Shared invocable payload (a loss function, an activation, a model factory)
#[derive(Clone)]
pub struct Callable {
    name: String,
    func: Arc<InvokeFn>,
}

impl Callable {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Payload]) -> Result<Payload> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Payload]) -> Result<Payload> {
        (self.func)(args)
    }

    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Callable({})", self.name)
    }
}

/// Data carried by a value. The engine treats it as opaque except for
/// bounds checks, residuals and arithmetic on the numeric variants.
#[derive(Debug, Clone)]
pub enum Payload {
    Bool(bool),
    Int(i64),
    Float(f64),
    Array(Vec<f64>),
    Text(String),
    Json(serde_json::Value),
    Callable(Callable),
    Opaque(OpaqueValue),
}

/// Payload variant tag, used for port type constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Bool,
    Int,
    Float,
    Array,
    Text,
    Json,
    Callable,
    Opaque,
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub(crate) fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "**",
        }
    }

    fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }

    fn apply_int(&self, a: i64, b: i64) -> Option<i64> {
        match self {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div | BinaryOp::Pow => None,
        }
    }
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Bool(_) => PayloadKind::Bool,
            Payload::Int(_) => PayloadKind::Int,
            Payload::Float(_) => PayloadKind::Float,
            Payload::Array(_) => PayloadKind::Array,
            Payload::Text(_) => PayloadKind::Text,
            Payload::Json(_) => PayloadKind::Json,
            Payload::Callable(_) => PayloadKind::Callable,
            Payload::Opaque(_) => PayloadKind::Opaque,
        }
    }

    pub fn opaque<T: Send + Sync + 'static>(value: T) -> Self {
        Payload::Opaque(OpaqueValue::new(value))
    }

    pub fn callable<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Payload]) -> Result<Payload> + Send + Sync + 'static,
    {
        Payload::Callable(Callable::new(name, func))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Payload::Callable(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Payload::Int(_) | Payload::Float(_) | Payload::Array(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Payload::Int(v) => Some(*v as f64),
            Payload::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[f64]> {
        match self {
            Payload::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Every numeric component, for bounds checks
    pub(crate) fn numeric_components(&self) -> Option<Vec<f64>> {
        match self {
            Payload::Int(v) => Some(vec![*v as f64]),
            Payload::Float(v) => Some(vec![*v]),
            Payload::Array(values) => Some(values.clone()),
            _ => None,
        }
    }

    pub(crate) fn binary(&self, op: BinaryOp, rhs: &Payload) -> Result<Payload> {
        if self.is_callable() || rhs.is_callable() {
            return Err(EngineError::unsupported(
                op.symbol(),
                "operands holding invocable payloads cannot be composed",
            ));
        }

        match (self, rhs) {
            (Payload::Int(a), Payload::Int(b)) => Ok(op
                .apply_int(*a, *b)
                .map(Payload::Int)
                .unwrap_or_else(|| Payload::Float(op.apply(*a as f64, *b as f64)))),
            (Payload::Array(a), Payload::Array(b)) => {
                if a.len() != b.len() {
                    return Err(EngineError::unsupported(
                        op.symbol(),
                        format!("array lengths differ ({} vs {})", a.len(), b.len()),
                    ));
                }
                Ok(Payload::Array(
                    a.iter().zip(b).map(|(x, y)| op.apply(*x, *y)).collect(),
                ))
            }
            (Payload::Array(a), scalar) => {
                let b = scalar.as_f64().ok_or_else(|| Self::not_numeric(op, scalar))?;
                Ok(Payload::Array(a.iter().map(|x| op.apply(*x, b)).collect()))
            }
            (scalar, Payload::Array(b)) => {
                let a = scalar.as_f64().ok_or_else(|| Self::not_numeric(op, scalar))?;
                Ok(Payload::Array(b.iter().map(|y| op.apply(a, *y)).collect()))
            }
            (lhs, rhs) => {
                let a = lhs.as_f64().ok_or_else(|| Self::not_numeric(op, lhs))?;
                let b = rhs.as_f64().ok_or_else(|| Self::not_numeric(op, rhs))?;
                Ok(Payload::Float(op.apply(a, b)))
            }
        }
    }

    pub(crate) fn negate(&self) -> Result<Payload> {
        match self {
            Payload::Int(v) => Ok(v
                .checked_neg()
                .map(Payload::Int)
                .unwrap_or(Payload::Float(-(*v as f64)))),
            Payload::Float(v) => Ok(Payload::Float(-v)),
            Payload::Array(values) => Ok(Payload::Array(values.iter().map(|v| -v).collect())),
            other => Err(EngineError::unsupported(
                "neg",
                format!("{} payload is not numeric", other.kind()),
            )),
        }
    }

    pub(crate) fn absolute(&self) -> Result<Payload> {
        match self {
            Payload::Int(v) => Ok(v
                .checked_abs()
                .map(Payload::Int)
                .unwrap_or(Payload::Float((*v as f64).abs()))),
            Payload::Float(v) => Ok(Payload::Float(v.abs())),
            Payload::Array(values) => Ok(Payload::Array(values.iter().map(|v| v.abs()).collect())),
            other => Err(EngineError::unsupported(
                "abs",
                format!("{} payload is not numeric", other.kind()),
            )),
        }
    }

    fn not_numeric(op: BinaryOp, payload: &Payload) -> EngineError {
        EngineError::unsupported(
            op.symbol(),
            format!("{} payload is not numeric", payload.kind()),
        )
    }

    /// Equality used to detect converged propagation: like `==`, but a NaN
    /// float matches a NaN float, element by element for arrays
    pub fn same_as(&self, other: &Payload) -> bool {
        fn same_float(a: f64, b: f64) -> bool {
            a == b || (a.is_nan() && b.is_nan())
        }
        match (self, other) {
            (Payload::Float(a), Payload::Float(b)) => same_float(*a, *b),
            (Payload::Array(a), Payload::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_float(*x, *y))
            }
            _ => self == other,
        }
    }

    /// Short human-readable rendering for logs and error messages
    pub fn describe(&self) -> String {
        match self {
            Payload::Bool(v) => v.to_string(),
            Payload::Int(v) => v.to_string(),
            Payload::Float(v) => v.to_string(),
            Payload::Array(values) => format!("{:?}", values),
            Payload::Text(text) => text.clone(),
            Payload::Json(json) => json.to_string(),
            Payload::Callable(callable) => format!("<callable {}>", callable.name()),
            Payload::Opaque(opaque) => format!("<{}>", opaque.type_name()),
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::Bool(a), Payload::Bool(b)) => a == b,
            (Payload::Int(a), Payload::Int(b)) => a == b,
            (Payload::Float(a), Payload::Float(b)) => a == b,
            (Payload::Int(a), Payload::Float(b)) | (Payload::Float(b), Payload::Int(a)) => {
                *a as f64 == *b
            }
            (Payload::Array(a), Payload::Array(b)) => a == b,
            (Payload::Text(a), Payload::Text(b)) => a == b,
            (Payload::Json(a), Payload::Json(b)) => a == b,
            (Payload::Callable(a), Payload::Callable(b)) => a.ptr_eq(b),
            (Payload::Opaque(a), Payload::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl PartialOrd for Payload {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Payload::Text(a), Payload::Text(b)) => a.partial_cmp(b),
            (Payload::Bool(a), Payload::Bool(b)) => a.partial_cmp(b),
            (Payload::Array(a), Payload::Array(b)) => a.partial_cmp(b),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }
}

impl From<bool> for Payload {
    fn from(v: bool) -> Self {
        Payload::Bool(v)
    }
}

impl From<i64> for Payload {
    fn from(v: i64) -> Self {
        Payload::Int(v)
    }
}

impl From<i32> for Payload {
    fn from(v: i32) -> Self {
        Payload::Int(v as i64)
    }
}

impl From<f64> for Payload {
    fn from(v: f64) -> Self {
        Payload::Float(v)
    }
}

impl From<Vec<f64>> for Payload {
    fn from(v: Vec<f64>) -> Self {
        Payload::Array(v)
    }
}

impl From<&str> for Payload {
    fn from(v: &str) -> Self {
        Payload::Text(v.to_string())
    }
}

impl From<String> for Payload {
    fn from(v: String) -> Self {
        Payload::Text(v)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(v: serde_json::Value) -> Self {
        Payload::Json(v)
    }
}

/// Serializable form of a payload. Callables and opaque objects have none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum PayloadRecord {
    Bool(bool),
    Int(i64),
    Float(f64),
    Array(Vec<f64>),
    Text(String),
    Json(serde_json::Value),
}

impl PayloadRecord {
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Bool(v) => Some(PayloadRecord::Bool(*v)),
            Payload::Int(v) => Some(PayloadRecord::Int(*v)),
            Payload::Float(v) => Some(PayloadRecord::Float(*v)),
            Payload::Array(v) => Some(PayloadRecord::Array(v.clone())),
            Payload::Text(v) => Some(PayloadRecord::Text(v.clone())),
            Payload::Json(v) => Some(PayloadRecord::Json(v.clone())),
            Payload::Callable(_) | Payload::Opaque(_) => None,
        }
    }

    pub fn into_payload(self) -> Payload {
        match self {
            PayloadRecord::Bool(v) => Payload::Bool(v),
            PayloadRecord::Int(v) => Payload::Int(v),
            PayloadRecord::Float(v) => Payload::Float(v),
            PayloadRecord::Array(v) => Payload::Array(v),
            PayloadRecord::Text(v) => Payload::Text(v),
            PayloadRecord::Json(v) => Payload::Json(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_arithmetic_stays_integral() {
        let sum = Payload::Int(2).binary(BinaryOp::Add, &Payload::Int(3)).unwrap();
        assert_eq!(sum, Payload::Int(5));
        let quotient = Payload::Int(3).binary(BinaryOp::Div, &Payload::Int(2)).unwrap();
        assert_eq!(quotient, Payload::Float(1.5));
    }

    #[test]
    fn test_array_broadcast() {
        let scaled = Payload::Array(vec![1.0, 2.0])
            .binary(BinaryOp::Mul, &Payload::Float(2.0))
            .unwrap();
        assert_eq!(scaled, Payload::Array(vec![2.0, 4.0]));

        let mismatch = Payload::Array(vec![1.0]).binary(BinaryOp::Add, &Payload::Array(vec![1.0, 2.0]));
        assert!(mismatch.is_err());
    }

    #[test]
    fn test_callable_operands_rejected() {
        let f = Payload::callable("identity", |args| Ok(args[0].clone()));
        let err = f.binary(BinaryOp::Add, &Payload::Int(1)).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_text_is_not_numeric() {
        assert!(Payload::from("abc").binary(BinaryOp::Sub, &Payload::Int(1)).is_err());
        assert!(Payload::from("abc").negate().is_err());
    }

    #[test]
    fn test_same_as_matches_nan() {
        assert_ne!(Payload::Float(f64::NAN), Payload::Float(f64::NAN));
        assert!(Payload::Float(f64::NAN).same_as(&Payload::Float(f64::NAN)));
        assert!(Payload::Array(vec![1.0, f64::NAN]).same_as(&Payload::Array(vec![1.0, f64::NAN])));
        assert!(!Payload::Array(vec![1.0, f64::NAN]).same_as(&Payload::Array(vec![2.0, f64::NAN])));
        assert!(!Payload::Float(f64::NAN).same_as(&Payload::Float(1.0)));
        assert!(Payload::Int(2).same_as(&Payload::Float(2.0)));
    }

    #[test]
    fn test_record_skips_callables() {
        let f = Payload::callable("noop", |_| Ok(Payload::Bool(true)));
        assert!(PayloadRecord::from_payload(&f).is_none());
        let record = PayloadRecord::from_payload(&Payload::Float(2.5)).unwrap();
        assert_eq!(record.into_payload(), Payload::Float(2.5));
    }
}

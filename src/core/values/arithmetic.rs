//! Arithmetic composition of values.
//!
//! Every operator builds a new anonymous `Calculated` value. Its spec is
//! derived from the operands:
//! - `+`/`-` keep an identical spec, keep only the dimension when the specs
//!   differ but the dimensions agree, and are untyped otherwise;
//! - `*`/`/` combine dimensions symbolically as `(a)*(b)` and `(a)/(b)`,
//!   collapsing equal dimensions to `1` on division;
//! - `**` requires a dimensionless exponent.

use super::payload::{BinaryOp, Payload};
use super::status::ValueSpec;
use super::value::Value;
use crate::core::error::{EngineError, Result};

fn shared_domain(a: &ValueSpec, b: &ValueSpec) -> Option<String> {
    if a.physics_domain == b.physics_domain {
        a.physics_domain.clone()
    } else {
        None
    }
}

fn additive_spec(a: &ValueSpec, b: &ValueSpec) -> ValueSpec {
    if a == b {
        return a.clone();
    }
    let mut spec = ValueSpec::untyped();
    if a.dimension.is_some() && a.dimension == b.dimension {
        spec.dimension = a.dimension.clone();
        spec.physics_domain = shared_domain(a, b);
    }
    spec
}

fn multiplicative_spec(a: &ValueSpec, b: &ValueSpec, op: BinaryOp) -> ValueSpec {
    let dimension = match (a.dimension.as_deref(), b.dimension.as_deref(), op) {
        (Some(x), Some(y), BinaryOp::Div) if x == y => Some("1".to_string()),
        (Some(x), Some(y), BinaryOp::Div) => Some(format!("({})/({})", x, y)),
        (Some(x), Some(y), _) => Some(format!("({})*({})", x, y)),
        (None, Some(y), BinaryOp::Div) => Some(format!("1/({})", y)),
        (Some(x), None, _) => Some(x.to_string()),
        (None, Some(y), _) => Some(y.to_string()),
        (None, None, _) => None,
    };

    ValueSpec {
        semantic_name: format!("{}{}{}", a.semantic_name, op.symbol(), b.semantic_name),
        physics_domain: shared_domain(a, b),
        dimension,
    }
}

fn power_spec(base: &ValueSpec, exponent: &Payload) -> ValueSpec {
    let dimension = base.dimension.as_ref().map(|d| match exponent.as_f64() {
        Some(n) => format!("({})^{}", d, n),
        None => format!("({})^n", d),
    });
    ValueSpec {
        semantic_name: base.semantic_name.clone(),
        physics_domain: base.physics_domain.clone(),
        dimension,
    }
}

fn operands<'a>(lhs: &'a Value, rhs: &'a Value, op: BinaryOp) -> Result<(&'a Payload, &'a Payload)> {
    if lhs.is_callable() || rhs.is_callable() {
        return Err(EngineError::unsupported(
            op.symbol(),
            "values holding invocable payloads cannot be composed",
        ));
    }
    let missing = |v: &Value| {
        EngineError::unsupported(op.symbol(), format!("value '{}' has no payload", v.name()))
    };
    let a = lhs.payload().ok_or_else(|| missing(lhs))?;
    let b = rhs.payload().ok_or_else(|| missing(rhs))?;
    Ok((a, b))
}

fn combine(lhs: &Value, rhs: &Value, op: BinaryOp) -> Result<Value> {
    let (a, b) = operands(lhs, rhs, op)?;
    let spec = match op {
        BinaryOp::Add | BinaryOp::Sub => additive_spec(lhs.spec(), rhs.spec()),
        BinaryOp::Mul | BinaryOp::Div => multiplicative_spec(lhs.spec(), rhs.spec(), op),
        BinaryOp::Pow => {
            if !rhs.spec().is_dimensionless() {
                return Err(EngineError::unsupported(
                    op.symbol(),
                    format!("exponent '{}' is not dimensionless", rhs.spec()),
                ));
            }
            power_spec(lhs.spec(), b)
        }
    };
    Ok(Value::new_derived(spec, a.binary(op, b)?))
}

impl Value {
    /// Raise to a dimensionless power
    pub fn pow(&self, exponent: &Value) -> Result<Value> {
        combine(self, exponent, BinaryOp::Pow)
    }

    pub fn abs(&self) -> Result<Value> {
        let payload = self
            .payload()
            .ok_or_else(|| EngineError::unsupported("abs", "value has no payload"))?;
        Ok(Value::new_derived(self.spec().clone(), payload.absolute()?))
    }
}

macro_rules! impl_value_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait for &Value {
            type Output = Result<Value>;

            fn $method(self, rhs: &Value) -> Result<Value> {
                combine(self, rhs, $op)
            }
        }
    };
}

impl_value_op!(Add, add, BinaryOp::Add);
impl_value_op!(Sub, sub, BinaryOp::Sub);
impl_value_op!(Mul, mul, BinaryOp::Mul);
impl_value_op!(Div, div, BinaryOp::Div);

impl std::ops::Neg for &Value {
    type Output = Result<Value>;

    fn neg(self) -> Result<Value> {
        let payload = self
            .payload()
            .ok_or_else(|| EngineError::unsupported("neg", "value has no payload"))?;
        Ok(Value::new_derived(self.spec().clone(), payload.negate()?))
    }
}

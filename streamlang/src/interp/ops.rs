//! Operator semantics on runtime values

use std::cmp::Ordering;

use super::{InterpResult, RuntimeError, Signal};
use crate::ast::{BinOp, UnOp};
use crate::types::{TypeDescriptor, TypeRegistry, Value};

/// Widen a numeric operand to `f64` through the registry conversion.
fn float_operand(value: &Value, registry: &TypeRegistry) -> Option<f64> {
    match registry.widen(value.clone(), &TypeDescriptor::Float) {
        Value::Float(x) => Some(x),
        _ => None,
    }
}

fn operand_error(expected: &str, op: BinOp, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::type_error(
        expected,
        &format!("{} {op} {}", left.type_name(), right.type_name()),
    )
}

fn raise_division_by_zero(registry: &TypeRegistry) -> InterpResult<Signal> {
    Ok(Signal::Raised(registry.exception("DivisionByZeroError", "division by zero")?))
}

/// Evaluate a binary operation on two evaluated operands.
///
/// Division by zero completes with a raised `DivisionByZeroError`; operand
/// type mismatches are faults.
pub fn eval_binary(op: BinOp, left: Value, right: Value, registry: &TypeRegistry) -> InterpResult<Signal> {
    if op.is_arithmetic() {
        return eval_arithmetic(op, left, right, registry);
    }
    if op.is_comparison() {
        return eval_comparison(op, &left, &right, registry).map(|b| Signal::value(Value::Boolean(b)));
    }
    if op.is_stream() {
        return match (&left, &right) {
            (Value::Stream(_), Value::Stream(_)) => {
                Err(RuntimeError::unsupported(&format!("stream operator {op}")))
            }
            _ => Err(operand_error("Stream", op, &left, &right)),
        };
    }
    match (op, &left, &right) {
        (BinOp::And, Value::Boolean(a), Value::Boolean(b)) => Ok(Signal::value(Value::Boolean(*a && *b))),
        (BinOp::Or, Value::Boolean(a), Value::Boolean(b)) => Ok(Signal::value(Value::Boolean(*a || *b))),
        _ => Err(operand_error("Boolean", op, &left, &right)),
    }
}

fn eval_arithmetic(op: BinOp, left: Value, right: Value, registry: &TypeRegistry) -> InterpResult<Signal> {
    let result = match (op, &left, &right) {
        (BinOp::Add, Value::String(a), Value::String(b)) => Value::string(&format!("{a}{b}")),
        (BinOp::Add, Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_add(*b)),
        (BinOp::Sub, Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_sub(*b)),
        (BinOp::Mul, Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_mul(*b)),
        (BinOp::Div, Value::Integer(_), Value::Integer(0)) => return raise_division_by_zero(registry),
        // true division
        (BinOp::Div, Value::Integer(a), Value::Integer(b)) => Value::Float(*a as f64 / *b as f64),
        _ => {
            let (Some(a), Some(b)) = (float_operand(&left, registry), float_operand(&right, registry)) else {
                let expected = if op == BinOp::Add { "numeric or String" } else { "numeric" };
                return Err(operand_error(expected, op, &left, &right));
            };
            match op {
                BinOp::Add => Value::Float(a + b),
                BinOp::Sub => Value::Float(a - b),
                BinOp::Mul => Value::Float(a * b),
                _ if b == 0.0 => return raise_division_by_zero(registry),
                _ => Value::Float(a / b),
            }
        }
    };
    Ok(Signal::value(result))
}

fn eval_comparison(op: BinOp, left: &Value, right: &Value, registry: &TypeRegistry) -> InterpResult<bool> {
    let ordering = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        _ => match (float_operand(left, registry), float_operand(right, registry)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    let numeric = left.type_descriptor().is_numeric() && right.type_descriptor().is_numeric();
    match op {
        BinOp::Eq | BinOp::Ne => {
            let equal = if numeric {
                ordering == Some(Ordering::Equal)
            } else if left.type_descriptor().is_compatible_with(&right.type_descriptor()) {
                left == right
            } else {
                return Err(operand_error("comparable operands", op, left, right));
            };
            Ok(if op == BinOp::Eq { equal } else { !equal })
        }
        _ => {
            let ordered = matches!(
                (left, right),
                (Value::String(_), Value::String(_)) | (Value::Boolean(_), Value::Boolean(_))
            ) || numeric;
            if !ordered {
                return Err(operand_error("numeric or String", op, left, right));
            }
            // NaN compares false under every ordering
            let Some(ordering) = ordering else { return Ok(false) };
            Ok(match op {
                BinOp::Lt => ordering == Ordering::Less,
                BinOp::Gt => ordering == Ordering::Greater,
                BinOp::Le => ordering != Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

/// Evaluate a unary operation
pub fn eval_unary(op: UnOp, operand: Value) -> InterpResult<Value> {
    match (op, &operand) {
        (UnOp::Plus, Value::Integer(_) | Value::Float(_)) => Ok(operand),
        (UnOp::Neg, Value::Integer(n)) => Ok(Value::Integer(n.wrapping_neg())),
        (UnOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnOp::Not, _) => Err(RuntimeError::type_error("Boolean", operand.type_name())),
        _ => Err(RuntimeError::type_error("numeric", operand.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::ErrorKind;

    fn binary(op: BinOp, left: Value, right: Value) -> InterpResult<Signal> {
        eval_binary(op, left, right, &TypeRegistry::new())
    }

    fn value(op: BinOp, left: Value, right: Value) -> Value {
        match binary(op, left, right).unwrap() {
            Signal::Normal(Some(v)) => v,
            other => panic!("expected a value, got {other:?}"),
        }
    }

    #[test]
    fn test_integer_division_widens() {
        assert_eq!(value(BinOp::Div, Value::Integer(6), Value::Integer(3)), Value::Float(2.0));
        assert_eq!(value(BinOp::Div, Value::Integer(7), Value::Integer(2)), Value::Float(3.5));
    }

    #[test]
    fn test_mixed_arithmetic_is_float() {
        assert_eq!(value(BinOp::Add, Value::Integer(1), Value::Float(0.5)), Value::Float(1.5));
        assert_eq!(value(BinOp::Mul, Value::Float(2.0), Value::Integer(3)), Value::Float(6.0));
        assert_eq!(value(BinOp::Sub, Value::Integer(5), Value::Integer(7)), Value::Integer(-2));
    }

    #[test]
    fn test_integer_overflow_wraps() {
        assert_eq!(value(BinOp::Add, Value::Integer(i64::MAX), Value::Integer(1)), Value::Integer(i64::MIN));
    }

    #[test]
    fn test_division_by_zero_raises() {
        for (left, right) in [
            (Value::Integer(1), Value::Integer(0)),
            (Value::Float(1.0), Value::Float(0.0)),
            (Value::Integer(1), Value::Float(0.0)),
        ] {
            match binary(BinOp::Div, left, right).unwrap() {
                Signal::Raised(exc) => assert_eq!(exc.type_name(), "DivisionByZeroError"),
                other => panic!("expected a raise, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(value(BinOp::Add, Value::string("ab"), Value::string("cd")), Value::string("abcd"));
        let err = binary(BinOp::Sub, Value::string("a"), Value::string("b")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_arithmetic_type_error_message() {
        let err = binary(BinOp::Add, Value::string("a"), Value::Integer(1)).unwrap_err();
        insta::assert_snapshot!(err.message, @"type error: expected numeric or String, got String + Integer");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(value(BinOp::Lt, Value::Integer(1), Value::Float(1.5)), Value::Boolean(true));
        assert_eq!(value(BinOp::Eq, Value::Integer(2), Value::Float(2.0)), Value::Boolean(true));
        assert_eq!(value(BinOp::Ge, Value::string("b"), Value::string("a")), Value::Boolean(true));
        assert_eq!(value(BinOp::Ne, Value::Boolean(true), Value::Boolean(false)), Value::Boolean(true));
        assert_eq!(value(BinOp::Le, Value::Float(f64::NAN), Value::Float(1.0)), Value::Boolean(false));
    }

    #[test]
    fn test_incompatible_comparison_faults() {
        let err = binary(BinOp::Eq, Value::string("1"), Value::Integer(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        let err = binary(BinOp::Lt, Value::Void, Value::Void).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_stream_operators() {
        let stream = || Value::Stream(std::rc::Rc::new(Vec::new()));
        let err = binary(BinOp::Chain, stream(), stream()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
        let err = binary(BinOp::Merge, stream(), Value::Integer(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_unary() {
        assert_eq!(eval_unary(UnOp::Neg, Value::Float(1.5)).unwrap(), Value::Float(-1.5));
        assert_eq!(eval_unary(UnOp::Plus, Value::Integer(3)).unwrap(), Value::Integer(3));
        assert_eq!(eval_unary(UnOp::Not, Value::Boolean(false)).unwrap(), Value::Boolean(true));
        assert_eq!(eval_unary(UnOp::Not, Value::Integer(0)).unwrap_err().kind, ErrorKind::TypeError);
        assert_eq!(eval_unary(UnOp::Neg, Value::string("x")).unwrap_err().kind, ErrorKind::TypeError);
    }
}

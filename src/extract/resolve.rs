//! Literal resolution of assignment values
//!
//! [`resolve`] never fails: anything it cannot reduce to a literal comes back
//! as the expression's source text. [`literal_eval`] is the strict variant
//! used for containers and by the fallback extractor, and rejects anything
//! that is not built purely from constants.

use super::value::{Mapping, ResolvedValue, Scalar};
use crate::syntax::{Constant, Expr, ExprKind, FStringPart, UnaryOp};
use thiserror::Error;
use tracing::trace;

/// Call names treated as environment/default lookups.
const LOOKUP_CALLS: &[&str] = &["get", "getenv"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LiteralError {
    #[error("malformed node: {0} is not a literal")]
    NotLiteral(&'static str),

    #[error("unsupported dictionary key")]
    UnsupportedKey,

    #[error("value cannot be represented: {0}")]
    Unrepresentable(String),
}

/// Best-effort value of `expr`, whose spans point into `source`.
pub fn resolve(expr: &Expr, source: &str) -> ResolvedValue {
    match &expr.kind {
        ExprKind::Constant(constant) => {
            constant_value(constant).unwrap_or_else(|_| source_text(expr, source))
        }
        ExprKind::Dict(_) | ExprKind::List(_) | ExprKind::Tuple(_) | ExprKind::Set(_) => {
            match literal_eval(expr) {
                Ok(value) => value,
                Err(e) => {
                    trace!(error = %e, "container is not a pure literal, keeping source text");
                    source_text(expr, source)
                }
            }
        }
        ExprKind::JoinedStr(parts) => ResolvedValue::str(join_fstring(parts)),
        ExprKind::Call { func, args, .. } => match (callee_name(func), args.as_slice()) {
            (Some(name), [first, rest @ ..]) if LOOKUP_CALLS.contains(&name) => {
                resolve(rest.first().unwrap_or(first), source)
            }
            _ => source_text(expr, source),
        },
        _ => source_text(expr, source),
    }
}

/// Strictly evaluate a literal: constants, signed numbers and nested
/// dict/list/tuple/set displays. Dict keys are rendered as strings.
pub fn literal_eval(expr: &Expr) -> Result<ResolvedValue, LiteralError> {
    match &expr.kind {
        ExprKind::Constant(constant) => constant_value(constant),
        ExprKind::UnaryOp { op, operand } => signed_number(*op, operand),
        ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Set(items) => items
            .iter()
            .map(literal_eval)
            .collect::<Result<Vec<_>, _>>()
            .map(ResolvedValue::Sequence),
        ExprKind::Dict(items) => {
            let mut mapping = Mapping::new();
            for item in items {
                let key = item.key.as_ref().ok_or(LiteralError::NotLiteral("**"))?;
                let key = dict_key(&literal_eval(key)?)?;
                mapping.insert(key, literal_eval(&item.value)?);
            }
            Ok(ResolvedValue::Mapping(mapping))
        }
        ExprKind::JoinedStr(_) => Err(LiteralError::NotLiteral("f-string")),
        ExprKind::Name(_) => Err(LiteralError::NotLiteral("name")),
        ExprKind::Call { .. } => Err(LiteralError::NotLiteral("call")),
        _ => Err(LiteralError::NotLiteral("expression")),
    }
}

fn constant_value(constant: &Constant) -> Result<ResolvedValue, LiteralError> {
    let scalar = match constant {
        Constant::Str(s) => Scalar::Str(s.clone()),
        Constant::Int(text) => {
            Scalar::Int(parse_int(text).ok_or_else(|| LiteralError::Unrepresentable(text.clone()))?)
        }
        Constant::Float(text) => Scalar::Float(
            parse_float(text).ok_or_else(|| LiteralError::Unrepresentable(text.clone()))?,
        ),
        Constant::Bool(b) => Scalar::Bool(*b),
        Constant::None => Scalar::Null,
        Constant::Bytes(_) => return Err(LiteralError::Unrepresentable("bytes".into())),
        Constant::Imag(text) => return Err(LiteralError::Unrepresentable(text.clone())),
        Constant::Ellipsis => return Err(LiteralError::Unrepresentable("...".into())),
    };
    Ok(ResolvedValue::Scalar(scalar))
}

fn signed_number(op: UnaryOp, operand: &Expr) -> Result<ResolvedValue, LiteralError> {
    let negate = match op {
        UnaryOp::Neg => true,
        UnaryOp::Pos => false,
        _ => return Err(LiteralError::NotLiteral("operator")),
    };
    let value = match &operand.kind {
        ExprKind::Constant(c @ (Constant::Int(_) | Constant::Float(_))) => constant_value(c)?,
        ExprKind::UnaryOp { op, operand } => signed_number(*op, operand)?,
        _ => return Err(LiteralError::NotLiteral("operator")),
    };
    Ok(match (negate, value) {
        (true, ResolvedValue::Scalar(Scalar::Int(i))) => ResolvedValue::Scalar(Scalar::Int(
            i.checked_neg()
                .ok_or_else(|| LiteralError::Unrepresentable(format!("-{}", i)))?,
        )),
        (true, ResolvedValue::Scalar(Scalar::Float(f))) => ResolvedValue::Scalar(Scalar::Float(-f)),
        (_, value) => value,
    })
}

fn dict_key(key: &ResolvedValue) -> Result<String, LiteralError> {
    match key {
        ResolvedValue::Scalar(Scalar::Str(s)) => Ok(s.clone()),
        ResolvedValue::Scalar(Scalar::Int(i)) => Ok(i.to_string()),
        ResolvedValue::Scalar(Scalar::Float(f)) => Ok(format!("{:?}", f)),
        ResolvedValue::Scalar(Scalar::Bool(b)) => Ok(b.to_string()),
        ResolvedValue::Scalar(Scalar::Null) => Ok("null".to_string()),
        _ => Err(LiteralError::UnsupportedKey),
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let digits = text.replace('_', "").to_ascii_lowercase();
    let (radix, body) = match digits.get(..2) {
        Some("0x") => (16, &digits[2..]),
        Some("0o") => (8, &digits[2..]),
        Some("0b") => (2, &digits[2..]),
        _ => (10, digits.as_str()),
    };
    i64::from_str_radix(body, radix).ok()
}

fn parse_float(text: &str) -> Option<f64> {
    let value: f64 = text.replace('_', "").parse().ok()?;
    value.is_finite().then_some(value)
}

fn join_fstring(parts: &[FStringPart]) -> String {
    parts
        .iter()
        .map(|part| match part {
            FStringPart::Literal(text) => text.clone(),
            FStringPart::Expr { text } => format!("{{{}}}", text),
        })
        .collect()
}

fn callee_name(func: &Expr) -> Option<&str> {
    match &func.kind {
        ExprKind::Name(name) => Some(name),
        ExprKind::Attribute { attr, .. } => Some(attr),
        _ => None,
    }
}

fn source_text(expr: &Expr, source: &str) -> ResolvedValue {
    match expr.span.text(source) {
        Some(text) => ResolvedValue::RawText(text.trim().to_string()),
        None => ResolvedValue::Absent,
    }
}

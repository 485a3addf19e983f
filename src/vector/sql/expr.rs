use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use crate::errors::*;
use crate::vector::{Defn, Feature, FieldType, FieldValue};

/// A value produced while evaluating an expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truth value in a filter. Null and non-boolean values are false, except
    /// non-zero numbers.
    pub fn is_true(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Integer(v) => *v != 0,
            Value::Real(v) => *v != 0.0,
            _ => false,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    /// Total order used by `ORDER BY`, `MIN` and `MAX`: nulls first, then
    /// numbers, then strings.
    pub(crate) fn sort_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) | Value::Integer(_) | Value::Real(_) => 1,
                Value::String(_) => 2,
            }
        }
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (a, b) if rank(a) == 1 && rank(b) == 1 => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }

    /// Convert to the value of a field of type `field_type`.
    pub(crate) fn into_field_value(self, field_type: FieldType) -> Option<FieldValue> {
        let value = match self {
            Value::Null => return None,
            Value::Bool(b) => FieldValue::IntegerValue(b as i32),
            Value::Integer(v) => match i32::try_from(v) {
                Ok(v) => FieldValue::IntegerValue(v),
                Err(_) => FieldValue::Integer64Value(v),
            },
            Value::Real(v) => FieldValue::RealValue(v),
            Value::String(s) => FieldValue::StringValue(s),
        };
        value.convert_to(field_type)
    }

    /// Field type a column holding this value would have.
    pub(crate) fn field_type(&self) -> FieldType {
        match self {
            Value::Bool(_) => FieldType::Integer,
            Value::Integer(v) if i32::try_from(*v).is_ok() => FieldType::Integer,
            Value::Integer(_) => FieldType::Integer64,
            Value::Real(_) => FieldType::Real,
            Value::Null | Value::String(_) => FieldType::String,
        }
    }
}

impl From<&FieldValue> for Value {
    fn from(value: &FieldValue) -> Value {
        match value {
            FieldValue::IntegerValue(v) => Value::Integer(*v as i64),
            FieldValue::Integer64Value(v) => Value::Integer(*v),
            FieldValue::RealValue(v) => Value::Real(*v),
            FieldValue::StringValue(s) => Value::String(s.clone()),
            other => Value::String(other.clone().into_string().unwrap_or_default()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", if *b { 1 } else { 0 }),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Function {
    Concat,
    Substr,
    Upper,
    Lower,
    Cast(FieldType),
}

/// Expression tree of a `WHERE` clause or a selected column.
///
/// `Column` nodes are names as written; [`Expr::bind`] resolves them against
/// a layer definition into `Field` indices or the `Fid` pseudo column.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Column(String),
    Field(usize),
    Fid,
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Call(Function, Vec<Expr>),
}

fn eval_error(msg: impl Into<String>) -> GeoError {
    GeoError::SqlError {
        position: 0,
        msg: msg.into(),
    }
}

impl Expr {
    /// Resolve column names against `defn`. `FID` refers to the feature id
    /// unless the layer has a field of that name.
    pub(crate) fn bind(self, defn: &Defn, layer: &str) -> Result<Expr> {
        let bind = |e: Box<Expr>| -> Result<Box<Expr>> { Ok(Box::new(e.bind(defn, layer)?)) };
        Ok(match self {
            Expr::Column(name) => match defn.field_index(&name) {
                Ok(idx) => Expr::Field(idx),
                Err(_) if name.eq_ignore_ascii_case("FID") => Expr::Fid,
                Err(_) => {
                    return Err(GeoError::UnknownField {
                        field: name,
                        layer: layer.to_string(),
                    })
                }
            },
            Expr::Unary(op, e) => Expr::Unary(op, bind(e)?),
            Expr::Binary(op, l, r) => Expr::Binary(op, bind(l)?, bind(r)?),
            Expr::Like {
                expr,
                pattern,
                negated,
            } => Expr::Like {
                expr: bind(expr)?,
                pattern: bind(pattern)?,
                negated,
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => Expr::InList {
                expr: bind(expr)?,
                list: list
                    .into_iter()
                    .map(|e| e.bind(defn, layer))
                    .collect::<Result<_>>()?,
                negated,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Expr::Between {
                expr: bind(expr)?,
                low: bind(low)?,
                high: bind(high)?,
                negated,
            },
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: bind(expr)?,
                negated,
            },
            Expr::Call(func, args) => Expr::Call(
                func,
                args.into_iter()
                    .map(|e| e.bind(defn, layer))
                    .collect::<Result<_>>()?,
            ),
            other => other,
        })
    }

    /// Evaluate against a feature. Unbound columns and type mismatches are
    /// errors; nulls propagate through operators.
    pub(crate) fn eval(&self, feature: &Feature) -> Result<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Column(name) => Err(eval_error(format!("unbound column '{name}'"))),
            Expr::Field(idx) => Ok(feature.field_by_index(*idx).map_or(Value::Null, Value::from)),
            Expr::Fid => Ok(feature
                .fid()
                .map_or(Value::Null, |fid| Value::Integer(fid as i64))),
            Expr::Unary(op, e) => {
                let v = e.eval(feature)?;
                match (op, v) {
                    (_, Value::Null) => Ok(Value::Null),
                    (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_true())),
                    (UnaryOp::Neg, Value::Integer(v)) => Ok(Value::Integer(-v)),
                    (UnaryOp::Neg, Value::Real(v)) => Ok(Value::Real(-v)),
                    (UnaryOp::Neg, v) => Err(eval_error(format!("cannot negate '{v}'"))),
                }
            }
            Expr::Binary(BinaryOp::And, l, r) => {
                let l = l.eval(feature)?;
                if !l.is_null() && !l.is_true() {
                    return Ok(Value::Bool(false));
                }
                let r = r.eval(feature)?;
                Ok(match (l.is_null(), r.is_null()) {
                    (_, false) if !r.is_true() => Value::Bool(false),
                    (false, false) => Value::Bool(true),
                    _ => Value::Null,
                })
            }
            Expr::Binary(BinaryOp::Or, l, r) => {
                let l = l.eval(feature)?;
                if l.is_true() {
                    return Ok(Value::Bool(true));
                }
                let r = r.eval(feature)?;
                Ok(if r.is_true() {
                    Value::Bool(true)
                } else if l.is_null() || r.is_null() {
                    Value::Null
                } else {
                    Value::Bool(false)
                })
            }
            Expr::Binary(op, l, r) => binary(*op, l.eval(feature)?, r.eval(feature)?),
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let (v, p) = (expr.eval(feature)?, pattern.eval(feature)?);
                if v.is_null() || p.is_null() {
                    return Ok(Value::Null);
                }
                let matched = like(&v.to_string(), &p.to_string());
                Ok(Value::Bool(matched != *negated))
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let v = expr.eval(feature)?;
                if v.is_null() {
                    return Ok(Value::Null);
                }
                let mut found = false;
                for item in list {
                    if compare(&v, &item.eval(feature)?)? == Some(Ordering::Equal) {
                        found = true;
                        break;
                    }
                }
                Ok(Value::Bool(found != *negated))
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let v = expr.eval(feature)?;
                let (lo, hi) = (compare(&v, &low.eval(feature)?)?, compare(&v, &high.eval(feature)?)?);
                Ok(match (lo, hi) {
                    (Some(lo), Some(hi)) => {
                        Value::Bool((lo != Ordering::Less && hi != Ordering::Greater) != *negated)
                    }
                    _ => Value::Null,
                })
            }
            Expr::IsNull { expr, negated } => {
                Ok(Value::Bool(expr.eval(feature)?.is_null() != *negated))
            }
            Expr::Call(func, args) => {
                let args = args
                    .iter()
                    .map(|a| a.eval(feature))
                    .collect::<Result<Vec<_>>>()?;
                call(*func, args)
            }
        }
    }

    /// `true` if the expression evaluates to true; errors and nulls are false.
    pub(crate) fn matches(&self, feature: &Feature) -> bool {
        self.eval(feature).is_ok_and(|v| v.is_true())
    }

    /// Type of the column produced by this expression, used to build result
    /// schemas.
    pub(crate) fn field_type(&self, defn: &Defn) -> FieldType {
        match self {
            Expr::Literal(v) => v.field_type(),
            Expr::Field(idx) => defn
                .field(*idx)
                .map_or(FieldType::String, |f| f.field_type()),
            Expr::Fid => FieldType::Integer64,
            Expr::Unary(UnaryOp::Neg, e) => e.field_type(defn),
            Expr::Binary(BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Mod, l, r) => {
                match (l.field_type(defn), r.field_type(defn)) {
                    (FieldType::Integer, FieldType::Integer) => FieldType::Integer,
                    (
                        FieldType::Integer | FieldType::Integer64,
                        FieldType::Integer | FieldType::Integer64,
                    ) => FieldType::Integer64,
                    _ => FieldType::Real,
                }
            }
            Expr::Binary(BinaryOp::Div, ..) => FieldType::Real,
            Expr::Call(Function::Cast(ty), _) => *ty,
            Expr::Call(..) => FieldType::String,
            _ => FieldType::Integer,
        }
    }
}

/// Compare two values; `None` if either is null.
fn compare(a: &Value, b: &Value) -> Result<Option<Ordering>> {
    if a.is_null() || b.is_null() {
        return Ok(None);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(Some(x.cmp(y))),
        (Value::Integer(x), Value::Integer(y)) => Ok(Some(x.cmp(y))),
        (Value::String(s), n) | (n, Value::String(s)) => {
            let parsed: f64 = s
                .trim()
                .parse()
                .map_err(|_| eval_error(format!("cannot compare '{s}' with {n}")))?;
            let n = n.as_f64().unwrap_or(0.0);
            let ord = if matches!(a, Value::String(_)) {
                parsed.partial_cmp(&n)
            } else {
                n.partial_cmp(&parsed)
            };
            Ok(ord)
        }
        (x, y) => Ok(x.as_f64().zip(y.as_f64()).and_then(|(x, y)| x.partial_cmp(&y))),
    }
}

fn binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    let cmp = |pred: fn(Ordering) -> bool| -> Result<Value> {
        Ok(compare(&l, &r)?.map_or(Value::Null, |o| Value::Bool(pred(o))))
    };
    match op {
        BinaryOp::Eq => cmp(|o| o == Ordering::Equal),
        BinaryOp::Ne => cmp(|o| o != Ordering::Equal),
        BinaryOp::Lt => cmp(|o| o == Ordering::Less),
        BinaryOp::Le => cmp(|o| o != Ordering::Greater),
        BinaryOp::Gt => cmp(|o| o == Ordering::Greater),
        BinaryOp::Ge => cmp(|o| o != Ordering::Less),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, l, r)
        }
        BinaryOp::And | BinaryOp::Or => Err(eval_error("logical operator evaluated as arithmetic")),
    }
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Integer(a), Value::Integer(b)) = (&l, &r) {
        let (a, b) = (*a, *b);
        let v = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div if b == 0 => return Err(eval_error("division by zero")),
            BinaryOp::Div => return Ok(Value::Real(a as f64 / b as f64)),
            BinaryOp::Mod if b == 0 => return Err(eval_error("division by zero")),
            BinaryOp::Mod => a.checked_rem(b),
            _ => None,
        };
        return v
            .map(Value::Integer)
            .ok_or_else(|| eval_error("integer overflow"));
    }
    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return Err(eval_error(format!("non-numeric operands '{l}' and '{r}'")));
    };
    Ok(Value::Real(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b == 0.0 => return Err(eval_error("division by zero")),
        BinaryOp::Div => a / b,
        BinaryOp::Mod if b == 0.0 => return Err(eval_error("division by zero")),
        _ => a % b,
    }))
}

fn call(func: Function, args: Vec<Value>) -> Result<Value> {
    match func {
        Function::Concat => Ok(Value::String(
            args.iter()
                .filter(|v| !v.is_null())
                .map(|v| v.to_string())
                .collect(),
        )),
        Function::Upper | Function::Lower => match args.as_slice() {
            [Value::Null] => Ok(Value::Null),
            [v] => {
                let s = v.to_string();
                Ok(Value::String(if func == Function::Upper {
                    s.to_uppercase()
                } else {
                    s.to_lowercase()
                }))
            }
            _ => Err(eval_error("expected one argument")),
        },
        Function::Substr => {
            let (s, start, len) = match args.as_slice() {
                [s, start] => (s, start, None),
                [s, start, len] => (s, start, Some(len)),
                _ => return Err(eval_error("SUBSTR expects 2 or 3 arguments")),
            };
            if s.is_null() {
                return Ok(Value::Null);
            }
            let chars: Vec<char> = s.to_string().chars().collect();
            let start = start
                .as_f64()
                .ok_or_else(|| eval_error("SUBSTR start must be numeric"))? as i64;
            // 1-based; negative counts from the end
            let begin = if start > 0 {
                (start - 1) as usize
            } else if start < 0 {
                chars.len().saturating_sub(start.unsigned_abs() as usize)
            } else {
                0
            };
            let begin = begin.min(chars.len());
            let end = match len {
                Some(len) => {
                    let len = len
                        .as_f64()
                        .ok_or_else(|| eval_error("SUBSTR length must be numeric"))?
                        .max(0.0) as usize;
                    begin.saturating_add(len).min(chars.len())
                }
                None => chars.len(),
            };
            Ok(Value::String(chars[begin..end].iter().collect()))
        }
        Function::Cast(ty) => {
            let [v] = <[Value; 1]>::try_from(args)
                .map_err(|_| eval_error("CAST expects one argument"))?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            Ok(match ty {
                FieldType::Integer | FieldType::Integer64 => Value::Integer(
                    FieldValue::StringValue(v.to_string())
                        .into_int64()
                        .unwrap_or(0),
                ),
                FieldType::Real => Value::Real(
                    v.as_f64()
                        .or_else(|| v.to_string().trim().parse().ok())
                        .unwrap_or(0.0),
                ),
                _ => Value::String(v.to_string()),
            })
        }
    }
}

/// Case-insensitive `LIKE` matching: `%` matches any run, `_` one character.
pub(crate) fn like(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let (mut v, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while v < value.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == value[v]) {
            v += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, v));
            p += 1;
        } else if let Some((bp, bv)) = backtrack {
            p = bp + 1;
            v = bv + 1;
            backtrack = Some((bp, bv + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like() {
        assert!(like("Pedestrian", "ped%"));
        assert!(like("abc", "a_c"));
        assert!(like("abc", "%"));
        assert!(like("", "%"));
        assert!(!like("abc", "a_"));
        assert!(like("35043411", "%4341%"));
        assert!(!like("abc", "%d%"));
    }

    #[test]
    fn test_compare_mixed() {
        assert_eq!(
            compare(&Value::Integer(2), &Value::Real(2.0)).unwrap(),
            Some(Ordering::Equal)
        );
        assert_eq!(
            compare(&Value::String("10".into()), &Value::Integer(9)).unwrap(),
            Some(Ordering::Greater)
        );
        assert!(compare(&Value::String("x".into()), &Value::Integer(9)).is_err());
        assert_eq!(compare(&Value::Null, &Value::Integer(9)).unwrap(), None);
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            arithmetic(BinaryOp::Add, Value::Integer(2), Value::Integer(3)).unwrap(),
            Value::Integer(5)
        );
        assert_eq!(
            arithmetic(BinaryOp::Div, Value::Integer(3), Value::Integer(2)).unwrap(),
            Value::Real(1.5)
        );
        assert!(arithmetic(BinaryOp::Div, Value::Real(1.0), Value::Integer(0)).is_err());
        assert_eq!(
            arithmetic(BinaryOp::Mul, Value::Null, Value::Integer(2)).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_functions() {
        assert_eq!(
            call(
                Function::Substr,
                vec![Value::String("abcdef".into()), Value::Integer(2), Value::Integer(3)]
            )
            .unwrap(),
            Value::String("bcd".into())
        );
        assert_eq!(
            call(
                Function::Concat,
                vec![Value::String("a".into()), Value::Integer(1), Value::Null]
            )
            .unwrap(),
            Value::String("a1".into())
        );
        assert_eq!(
            call(Function::Cast(FieldType::Integer), vec![Value::String("12.9".into())]).unwrap(),
            Value::Integer(12)
        );
    }
}

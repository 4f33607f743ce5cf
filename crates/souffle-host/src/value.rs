//! Scalar values and their conversion to attribute types.

use crate::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Primitive kind of an attribute, from the short half of its type signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    /// `i` - signed integer (`number` and subtypes)
    Signed,
    /// `u` - unsigned integer
    Unsigned,
    /// `f` - floating point
    Float,
    /// `s` - symbol
    Symbol,
    /// `r` - record reference
    Record,
    /// `+` - algebraic data type
    Adt,
}

impl AttrKind {
    /// Parse a short type code (`i`, `u`, `f`, `s`, `r`, `+`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "i" => Some(AttrKind::Signed),
            "u" => Some(AttrKind::Unsigned),
            "f" => Some(AttrKind::Float),
            "s" => Some(AttrKind::Symbol),
            "r" => Some(AttrKind::Record),
            "+" => Some(AttrKind::Adt),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            AttrKind::Signed => "i",
            AttrKind::Unsigned => "u",
            AttrKind::Float => "f",
            AttrKind::Symbol => "s",
            AttrKind::Record => "r",
            AttrKind::Adt => "+",
        }
    }

    /// Whether tuples with this kind can cross the host boundary.
    pub fn is_scalar(self) -> bool {
        !matches!(self, AttrKind::Record | AttrKind::Adt)
    }

    fn describe(self) -> &'static str {
        match self {
            AttrKind::Signed => "a signed integer",
            AttrKind::Unsigned => "an unsigned integer",
            AttrKind::Float => "a float",
            AttrKind::Symbol => "a symbol",
            AttrKind::Record => "a record",
            AttrKind::Adt => "an ADT value",
        }
    }
}

/// A single attribute value.
///
/// Values are totally ordered: first by kind (signed, unsigned, float,
/// symbol), then by value, floats by IEEE total order.
#[derive(Debug, Clone)]
pub enum Value {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Symbol(String),
}

impl Value {
    /// Kind this value naturally has.
    pub fn kind(&self) -> AttrKind {
        match self {
            Value::Signed(_) => AttrKind::Signed,
            Value::Unsigned(_) => AttrKind::Unsigned,
            Value::Float(_) => AttrKind::Float,
            Value::Symbol(_) => AttrKind::Symbol,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Signed(v) => Some(*v),
            Value::Unsigned(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Unsigned(v) => Some(*v),
            Value::Signed(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to `kind`, the way Souffle's host bindings cast values:
    /// integers widen to floats and cross signedness when in range; floats
    /// never narrow to integers; symbols only match symbols.
    pub fn conform(self, kind: AttrKind) -> Result<Value, String> {
        if self.kind() == kind {
            return Ok(self);
        }
        let converted = match (&self, kind) {
            (Value::Unsigned(_), AttrKind::Signed) => self.as_i64().map(Value::Signed),
            (Value::Signed(_), AttrKind::Unsigned) => self.as_u64().map(Value::Unsigned),
            (Value::Signed(v), AttrKind::Float) => Some(Value::Float(*v as f64)),
            (Value::Unsigned(v), AttrKind::Float) => Some(Value::Float(*v as f64)),
            _ => None,
        };
        converted.ok_or_else(|| format!("expected {}, got {}", kind.describe(), self.describe()))
    }

    /// Parse the textual form used in `.facts` files.
    pub fn parse(text: &str, kind: AttrKind) -> Result<Value, String> {
        let parsed = match kind {
            AttrKind::Signed => text.parse().map(Value::Signed).map_err(|e| e.to_string()),
            AttrKind::Unsigned => text.parse().map(Value::Unsigned).map_err(|e| e.to_string()),
            AttrKind::Float => text.parse().map(Value::Float).map_err(|e| e.to_string()),
            AttrKind::Symbol => Ok(Value::Symbol(text.to_string())),
            AttrKind::Record | AttrKind::Adt => Err(format!("cannot parse {}", kind.describe())),
        };
        parsed.map_err(|e| format!("'{text}' is not {}: {e}", kind.describe()))
    }

    fn describe(&self) -> String {
        match self {
            Value::Signed(v) => format!("signed integer {v}"),
            Value::Unsigned(v) => format!("unsigned integer {v}"),
            Value::Float(v) => format!("float {v}"),
            Value::Symbol(s) => format!("symbol {s:?}"),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Signed(_) => 0,
            Value::Unsigned(_) => 1,
            Value::Float(_) => 2,
            Value::Symbol(_) => 3,
        }
    }
}

/// Check a tuple against a relation's attribute kinds and convert each
/// element. This is the engine-side validation every engine applies before
/// touching storage.
pub fn conform_tuple(relation: &str, kinds: &[AttrKind], values: Vec<Value>) -> Result<Vec<Value>> {
    if values.len() != kinds.len() {
        return Err(Error::ArityMismatch {
            relation: relation.to_string(),
            expected: kinds.len(),
            actual: values.len(),
        });
    }

    values
        .into_iter()
        .zip(kinds)
        .enumerate()
        .map(|(index, (value, &kind))| {
            if !kind.is_scalar() {
                return Err(Error::InvariantViolation(format!(
                    "attribute {index} of relation {relation} has type '{}' which cannot be marshaled",
                    kind.code()
                )));
            }
            value.conform(kind).map_err(|message| Error::TypeConversion {
                relation: relation.to_string(),
                index,
                message,
            })
        })
        .collect()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Signed(a), Value::Signed(b)) => a.cmp(b),
            (Value::Unsigned(a), Value::Unsigned(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Symbol(a), Value::Symbol(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Signed(v) => v.hash(state),
            Value::Unsigned(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Symbol(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Signed(v) => write!(f, "{v}"),
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Symbol(s) => f.write_str(s),
        }
    }
}

macro_rules! impl_from {
    ($variant:ident as $target:ty: $($source:ty),*) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )*
    };
}

impl_from!(Signed as i64: i8, i16, i32, i64, isize);
impl_from!(Unsigned as u64: u8, u16, u32, u64, usize);
impl_from!(Float as f64: f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Symbol(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Symbol(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Symbol(s.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_cross_signedness_in_range() {
        assert_eq!(Value::from(3).conform(AttrKind::Unsigned), Ok(Value::Unsigned(3)));
        assert!(Value::from(-3).conform(AttrKind::Unsigned).is_err());
        assert_eq!(Value::from(7u32).conform(AttrKind::Signed), Ok(Value::Signed(7)));
        assert!(Value::Unsigned(u64::MAX).conform(AttrKind::Signed).is_err());
    }

    #[test]
    fn test_floats_do_not_narrow() {
        assert_eq!(Value::from(2).conform(AttrKind::Float), Ok(Value::Float(2.0)));
        let err = Value::from(2.5).conform(AttrKind::Signed).unwrap_err();
        assert_eq!(err, "expected a signed integer, got float 2.5");
    }

    #[test]
    fn test_symbols_only_match_symbols() {
        assert!(Value::from("Bye").conform(AttrKind::Signed).is_err());
        assert!(Value::from(1).conform(AttrKind::Symbol).is_err());
        assert_eq!(
            Value::from("Hi").conform(AttrKind::Symbol),
            Ok(Value::Symbol("Hi".into()))
        );
    }

    #[test]
    fn test_conform_tuple_reports_arity() {
        let kinds = [AttrKind::Signed, AttrKind::Symbol];
        let err = conform_tuple("A", &kinds, vec![1.into(), "Bye".into(), "x".into()]).unwrap_err();
        assert!(matches!(
            err,
            Error::ArityMismatch {
                expected: 2,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_conform_tuple_reports_position() {
        let kinds = [AttrKind::Signed, AttrKind::Symbol];
        let err = conform_tuple("A", &kinds, vec!["Bye".into(), 1.into()]).unwrap_err();
        assert!(matches!(err, Error::TypeConversion { index: 0, .. }));
        assert!(err.to_string().contains("Type conversion for tuple element 0"));
    }

    #[test]
    fn test_conform_tuple_rejects_records() {
        let err = conform_tuple("R", &[AttrKind::Record], vec![1.into()]).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn test_total_order() {
        let mut values = vec![
            Value::from("b"),
            Value::from(2.0),
            Value::from(1),
            Value::from("a"),
            Value::from(-1),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::from(-1),
                Value::from(1),
                Value::from(2.0),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(Value::parse("42", AttrKind::Signed), Ok(Value::Signed(42)));
        assert_eq!(Value::parse("x y", AttrKind::Symbol), Ok(Value::from("x y")));
        assert!(Value::parse("nope", AttrKind::Unsigned).is_err());
    }
}

//! Tuple representations handed to and returned from relations.

use crate::{Error, Result, Value};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// Field layout of a relation's tuples: the relation-specific named tuple
/// type. Built once per relation and shared by every decoded tuple.
#[derive(Debug, PartialEq, Eq)]
pub struct TupleShape {
    name: String,
    fields: Vec<String>,
}

impl TupleShape {
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Type name, `<relation>_tuple`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }
}

/// A tuple whose elements can be read by attribute name.
#[derive(Debug, Clone)]
pub struct NamedTuple {
    shape: Arc<TupleShape>,
    values: Vec<Value>,
}

impl NamedTuple {
    /// Positional assignment of `values` to the shape's fields.
    pub fn new(shape: Arc<TupleShape>, values: Vec<Value>) -> Self {
        Self { shape, values }
    }

    pub fn shape(&self) -> &TupleShape {
        &self.shape
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.shape.index_of(field).and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(field, value)` pairs in attribute order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.shape
            .fields
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Named tuples compare by value, like the plain tuples they stand for.
impl PartialEq for NamedTuple {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl PartialEq<[Value]> for NamedTuple {
    fn eq(&self, other: &[Value]) -> bool {
        self.values == other
    }
}

impl Index<usize> for NamedTuple {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

impl fmt::Display for NamedTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.shape.name)?;
        for (i, (field, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Value::Symbol(s) => write!(f, "{field}={s:?}")?,
                other => write!(f, "{field}={other}")?,
            }
        }
        f.write_str(")")
    }
}

/// Derivation metadata of a tuple in a relation with provenance columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Provenance {
    /// Identifier of the rule that derived the tuple (0 for facts).
    pub rule: i64,
    /// Height of the derivation tree.
    pub height: i64,
}

/// A data tuple together with its provenance, if the relation has any.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationTuple {
    pub data: NamedTuple,
    pub provenance: Option<Provenance>,
}

/// One item produced by [`crate::RelationView::iterate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Tuple(NamedTuple),
    WithProvenance(RelationTuple),
}

impl Row {
    /// The data part, whichever form the row has.
    pub fn data(&self) -> &NamedTuple {
        match self {
            Row::Tuple(t) => t,
            Row::WithProvenance(t) => &t.data,
        }
    }

    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            Row::Tuple(_) => None,
            Row::WithProvenance(t) => t.provenance,
        }
    }
}

/// A tuple supplied by the caller for `insert` or `contains`.
///
/// Either bare positional values or `(attribute, value)` pairs in any
/// order. Both are normalized to positional values before reaching the
/// engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TupleInput {
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

impl TupleInput {
    /// Build a named input from `(attribute, value)` pairs.
    pub fn named<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        TupleInput::Named(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Resolve to positional values for a relation with attributes `fields`.
    ///
    /// Positional input passes through untouched; arity is the engine's to
    /// check. Named input must name every attribute exactly once.
    pub fn into_positional(self, relation: &str, fields: &[String]) -> Result<Vec<Value>> {
        let pairs = match self {
            TupleInput::Positional(values) => return Ok(values),
            TupleInput::Named(pairs) => pairs,
        };

        if pairs.len() != fields.len() {
            return Err(Error::ArityMismatch {
                relation: relation.to_string(),
                expected: fields.len(),
                actual: pairs.len(),
            });
        }

        let mut slots: Vec<Option<Value>> = vec![None; fields.len()];
        for (name, value) in pairs {
            let index = fields.iter().position(|f| *f == name).ok_or_else(|| {
                Error::InvalidArgument(format!("relation {relation} has no attribute '{name}'"))
            })?;
            if slots[index].replace(value).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "attribute '{name}' of relation {relation} given twice"
                )));
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

impl From<Vec<Value>> for TupleInput {
    fn from(values: Vec<Value>) -> Self {
        TupleInput::Positional(values)
    }
}

impl From<&[Value]> for TupleInput {
    fn from(values: &[Value]) -> Self {
        TupleInput::Positional(values.to_vec())
    }
}

impl From<NamedTuple> for TupleInput {
    fn from(tuple: NamedTuple) -> Self {
        TupleInput::Positional(tuple.into_values())
    }
}

impl From<&NamedTuple> for TupleInput {
    fn from(tuple: &NamedTuple) -> Self {
        TupleInput::Positional(tuple.values().to_vec())
    }
}

macro_rules! impl_from_tuple {
    ($($name:ident),+) => {
        impl<$($name: Into<Value>),+> From<($($name,)+)> for TupleInput {
            #[allow(non_snake_case)]
            fn from(($($name,)+): ($($name,)+)) -> Self {
                TupleInput::Positional(vec![$($name.into()),+])
            }
        }
    };
}

impl_from_tuple!(A);
impl_from_tuple!(A, B);
impl_from_tuple!(A, B, C);
impl_from_tuple!(A, B, C, D);
impl_from_tuple!(A, B, C, D, E);
impl_from_tuple!(A, B, C, D, E, F);

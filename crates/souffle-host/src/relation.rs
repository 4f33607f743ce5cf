//! Typed view over one relation of a program.

use crate::codec::TypeCodec;
use crate::engine::EngineRelation;
use crate::tuple::{NamedTuple, Provenance, RelationTuple, Row, TupleInput, TupleShape};
use crate::value::{AttrKind, Value};
use crate::{Error, Result};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// One named relation of a loaded program.
///
/// Metadata is a snapshot taken when the view is built. Tuple counts and
/// contents are read from the engine on every call.
pub struct RelationView {
    relation: Rc<dyn EngineRelation>,
    name: String,
    primary_arity: usize,
    auxiliary_arity: usize,
    codec: TypeCodec,
}

impl RelationView {
    pub(crate) fn new(relation: Rc<dyn EngineRelation>) -> Result<Self> {
        let name = relation.name();
        let primary_arity = relation.primary_arity();
        let auxiliary_arity = relation.auxiliary_arity();
        let names = relation.attr_names();
        if names.len() != primary_arity + auxiliary_arity {
            return Err(Error::InvariantViolation(format!(
                "relation {name} reports {} attribute names for primary arity {primary_arity} \
                 and auxiliary arity {auxiliary_arity}",
                names.len()
            )));
        }
        let codec = TypeCodec::new(&name, names, &relation.attr_types(), primary_arity)?;
        Ok(Self {
            relation,
            name,
            primary_arity,
            auxiliary_arity,
            codec,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<short:long,...>` over every attribute.
    pub fn signature(&self) -> String {
        self.codec.signature()
    }

    /// Primary plus auxiliary arity.
    pub fn arity(&self) -> usize {
        self.primary_arity + self.auxiliary_arity
    }

    pub fn primary_arity(&self) -> usize {
        self.primary_arity
    }

    pub fn auxiliary_arity(&self) -> usize {
        self.auxiliary_arity
    }

    pub fn has_provenance(&self) -> bool {
        self.auxiliary_arity != 0
    }

    pub fn attribute_names(&self, data_only: bool) -> &[String] {
        self.codec.attribute_names(data_only)
    }

    /// Long type names of the data attributes (`number`, `symbol`, ...).
    pub fn attr_types(&self) -> Vec<&str> {
        self.codec.long_types(true)
    }

    pub fn short_attr_types(&self) -> Vec<&str> {
        self.codec.short_types(true)
    }

    /// `short:long` signatures of the data attributes.
    pub fn full_attr_types(&self) -> Vec<String> {
        self.codec
            .full_types(true)
            .iter()
            .map(|t| format!("{}:{}", t.short, t.long))
            .collect()
    }

    /// Shape of the data-only tuples this view produces.
    pub fn named_tuple_shape(&self) -> Arc<TupleShape> {
        self.codec.tuple_shape(true)
    }

    pub fn len(&self) -> Result<usize> {
        self.relation.len().map_err(|e| e.context("len", &self.name))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Whether a tuple with these data values is present.
    pub fn contains(&self, tuple: impl Into<TupleInput>) -> Result<bool> {
        let values = tuple
            .into()
            .into_positional(&self.name, self.codec.attribute_names(true))?;
        self.relation
            .contains(values)
            .map_err(|e| e.context("contains", &self.name))
    }

    /// Insert one tuple.
    pub fn insert(&self, tuple: impl Into<TupleInput>) -> Result<()> {
        self.insert_all([tuple])
    }

    /// Insert several tuples.
    ///
    /// Named elements are resolved before anything reaches the engine, so a
    /// bad field name inserts nothing. The engine then inserts in order and
    /// stops at the first element it rejects; earlier elements stay. Either
    /// way the error names the index of the offending element.
    pub fn insert_all<T: Into<TupleInput>>(&self, tuples: impl IntoIterator<Item = T>) -> Result<()> {
        let fields = self.codec.attribute_names(true);
        let batch = tuples
            .into_iter()
            .enumerate()
            .map(|(index, tuple)| {
                tuple
                    .into()
                    .into_positional(&self.name, fields)
                    .map_err(|e| Error::Insertion {
                        index,
                        source: Box::new(e),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        self.relation
            .insert(batch)
            .map_err(|e| e.context("insert", &self.name))
    }

    /// Delete every tuple of this relation. Relations derived from it keep
    /// their contents until the program runs again.
    pub fn purge(&self) -> Result<()> {
        self.relation
            .purge()
            .map_err(|e| e.context("purge", &self.name))
    }

    /// Iterate over the tuples present now.
    ///
    /// Without provenance, rows are [`Row::Tuple`]s of primary arity, or of
    /// full arity when `data_only` is false. With provenance, rows are
    /// [`Row::WithProvenance`] whose data part always has primary arity and
    /// whose provenance is `None` for relations without auxiliary columns.
    pub fn iterate(&self, data_only: bool, with_provenance: bool) -> Result<Rows> {
        if !with_provenance {
            let inner = self
                .relation
                .scan(data_only)
                .map_err(|e| e.context("iterate", &self.name))?;
            return Ok(Rows {
                inner,
                shape: self.codec.tuple_shape(data_only),
                mode: Mode::Plain,
                relation: self.name.clone(),
            });
        }

        match self.auxiliary_arity {
            0 | 2 => {}
            other => {
                return Err(Error::InvariantViolation(format!(
                    "relation {} has auxiliary arity {other}; provenance needs 0 or 2",
                    self.name
                )));
            }
        }
        let provenance_kinds = &self.codec.kinds(false)[self.primary_arity..];
        if let Some(kind) = provenance_kinds
            .iter()
            .find(|k| !matches!(k, AttrKind::Signed | AttrKind::Unsigned))
        {
            return Err(Error::InvariantViolation(format!(
                "relation {} has a '{}' provenance column; expected an integer",
                self.name,
                kind.code()
            )));
        }

        let inner = self
            .relation
            .scan(false)
            .map_err(|e| e.context("iterate", &self.name))?;
        Ok(Rows {
            inner,
            shape: self.codec.tuple_shape(true),
            mode: Mode::Split {
                primary: self.primary_arity,
                provenance: self.auxiliary_arity == 2,
            },
            relation: self.name.clone(),
        })
    }

    /// Data-only tuples, shaped.
    pub fn tuples(&self) -> Result<Vec<NamedTuple>> {
        self.iterate(true, false)?
            .map(|row| row.map(|r| r.data().clone()))
            .collect()
    }

    /// Data-only tuples as plain value vectors.
    pub fn raw_tuples(&self) -> Result<Vec<Vec<Value>>> {
        self.relation
            .scan(true)
            .map_err(|e| e.context("iterate", &self.name))?
            .map(|row| row.map_err(|e| e.context("iterate", &self.name)))
            .collect()
    }

    /// Data tuples paired with their provenance.
    pub fn provenance_tuples(&self) -> Result<Vec<RelationTuple>> {
        self.iterate(true, true)?
            .map(|row| {
                row.map(|r| match r {
                    Row::WithProvenance(t) => t,
                    Row::Tuple(data) => RelationTuple {
                        data,
                        provenance: None,
                    },
                })
            })
            .collect()
    }
}

impl fmt::Display for RelationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Relation {}({}) with ", self.name, self.signature())?;
        match self.len() {
            Ok(n) => write!(f, "{n} tuples"),
            Err(_) => f.write_str("an unknown number of tuples"),
        }
    }
}

impl fmt::Debug for RelationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationView")
            .field("name", &self.name)
            .field("primary_arity", &self.primary_arity)
            .field("auxiliary_arity", &self.auxiliary_arity)
            .finish_non_exhaustive()
    }
}

enum Mode {
    Plain,
    Split { primary: usize, provenance: bool },
}

/// Lazy rows of a relation, from [`RelationView::iterate`].
pub struct Rows {
    inner: Box<dyn Iterator<Item = Result<Vec<Value>>>>,
    shape: Arc<TupleShape>,
    mode: Mode,
    relation: String,
}

impl Rows {
    fn split(&self, mut values: Vec<Value>, primary: usize, provenance: bool) -> Result<Row> {
        if values.len() < primary {
            return Err(Error::InvariantViolation(format!(
                "relation {} produced a row of {} values, expected at least {primary}",
                self.relation,
                values.len()
            )));
        }
        let aux = values.split_off(primary);
        let provenance = if provenance {
            let [rule, height] = aux.as_slice() else {
                return Err(Error::InvariantViolation(format!(
                    "relation {} produced {} provenance values, expected 2",
                    self.relation,
                    aux.len()
                )));
            };
            Some(Provenance {
                rule: self.provenance_value(rule)?,
                height: self.provenance_value(height)?,
            })
        } else {
            None
        };
        Ok(Row::WithProvenance(RelationTuple {
            data: NamedTuple::new(Arc::clone(&self.shape), values),
            provenance,
        }))
    }

    fn provenance_value(&self, value: &Value) -> Result<i64> {
        value.as_i64().ok_or_else(|| {
            Error::InvariantViolation(format!(
                "relation {} produced provenance value {value} outside the integer range",
                self.relation
            ))
        })
    }
}

impl Iterator for Rows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let values = match self.inner.next()? {
            Ok(values) => values,
            Err(e) => return Some(Err(e.context("iterate", &self.relation))),
        };
        Some(match self.mode {
            Mode::Plain => Ok(Row::Tuple(NamedTuple::new(Arc::clone(&self.shape), values))),
            Mode::Split {
                primary,
                provenance,
            } => self.split(values, primary, provenance),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

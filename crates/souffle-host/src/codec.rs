//! Attribute type signatures and tuple shapes for one relation.

use crate::tuple::{NamedTuple, TupleShape};
use crate::value::{AttrKind, Value};
use crate::{Error, Result};
use std::cell::OnceCell;
use std::sync::Arc;

/// One attribute's type, split from its `short:long` signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrType {
    pub short: String,
    pub long: String,
}

impl AttrType {
    /// Split `"i:number"` into its two halves.
    pub fn parse(signature: &str) -> Result<Self> {
        let mut parts = signature.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(short), Some(long), None) => Ok(Self {
                short: short.to_string(),
                long: long.to_string(),
            }),
            _ => Err(Error::InvariantViolation(format!(
                "malformed attribute type signature '{signature}'"
            ))),
        }
    }
}

/// Decodes a relation's type metadata and materializes its tuples.
///
/// Everything is computed from the metadata the engine reported when the
/// relation was first enumerated; tuple shapes are built on first use and
/// shared afterwards.
#[derive(Debug)]
pub struct TypeCodec {
    relation: String,
    names: Vec<String>,
    types: Vec<AttrType>,
    kinds: Vec<AttrKind>,
    primary_arity: usize,
    data_shape: OnceCell<Arc<TupleShape>>,
    full_shape: OnceCell<Arc<TupleShape>>,
}

impl TypeCodec {
    pub fn new(
        relation: &str,
        names: Vec<String>,
        signatures: &[String],
        primary_arity: usize,
    ) -> Result<Self> {
        if names.len() != signatures.len() {
            return Err(Error::InvariantViolation(format!(
                "relation {relation} reports {} attribute names but {} types",
                names.len(),
                signatures.len()
            )));
        }
        if primary_arity > names.len() {
            return Err(Error::InvariantViolation(format!(
                "relation {relation} has primary arity {primary_arity} but only {} attributes",
                names.len()
            )));
        }

        let types = signatures
            .iter()
            .map(|s| AttrType::parse(s))
            .collect::<Result<Vec<_>>>()?;
        let kinds = types
            .iter()
            .map(|t| {
                AttrKind::from_code(&t.short).ok_or_else(|| {
                    Error::InvariantViolation(format!(
                        "relation {relation} uses unknown attribute type '{}:{}'",
                        t.short, t.long
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            relation: relation.to_string(),
            names,
            types,
            kinds,
            primary_arity,
            data_shape: OnceCell::new(),
            full_shape: OnceCell::new(),
        })
    }

    fn arity(&self, data_only: bool) -> usize {
        if data_only {
            self.primary_arity
        } else {
            self.names.len()
        }
    }

    pub fn attribute_names(&self, data_only: bool) -> &[String] {
        &self.names[..self.arity(data_only)]
    }

    pub fn long_types(&self, data_only: bool) -> Vec<&str> {
        self.types[..self.arity(data_only)]
            .iter()
            .map(|t| t.long.as_str())
            .collect()
    }

    pub fn short_types(&self, data_only: bool) -> Vec<&str> {
        self.types[..self.arity(data_only)]
            .iter()
            .map(|t| t.short.as_str())
            .collect()
    }

    pub fn full_types(&self, data_only: bool) -> &[AttrType] {
        &self.types[..self.arity(data_only)]
    }

    pub fn kinds(&self, data_only: bool) -> &[AttrKind] {
        &self.kinds[..self.arity(data_only)]
    }

    /// `<i:number,s:symbol>` over every attribute, provenance included.
    pub fn signature(&self) -> String {
        let parts: Vec<String> = self
            .types
            .iter()
            .map(|t| format!("{}:{}", t.short, t.long))
            .collect();
        format!("<{}>", parts.join(","))
    }

    pub fn tuple_shape(&self, data_only: bool) -> Arc<TupleShape> {
        let cell = if data_only {
            &self.data_shape
        } else {
            &self.full_shape
        };
        cell.get_or_init(|| {
            Arc::new(TupleShape::new(
                format!("{}_tuple", self.relation),
                self.attribute_names(data_only).to_vec(),
            ))
        })
        .clone()
    }

    pub fn decode(&self, values: Vec<Value>, data_only: bool) -> NamedTuple {
        NamedTuple::new(self.tuple_shape(data_only), values)
    }
}

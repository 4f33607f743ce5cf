//! Scalar and category encodings shared with the artifact.

use std::os::raw::c_char;
use std::ptr;

/// Attribute kind tag of a [`RawValue`].
///
/// Mirrors the short type codes Souffle reports for attributes
/// (`i`, `u`, `f`, `s`).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawKind {
    /// `i` - RamSigned
    Signed = 0,
    /// `u` - RamUnsigned
    Unsigned = 1,
    /// `f` - RamFloat
    Float = 2,
    /// `s` - symbol table entry
    Symbol = 3,
}

/// One scalar crossing the boundary.
///
/// Only the field selected by `kind` (a [`RawKind`] discriminant) is
/// meaningful. `symbol` is borrowed:
/// when passed into the artifact it is valid for the duration of the call,
/// when written by `iter_next` it is valid until the next `iter_next` or
/// `iter_free` on the same iterator.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawValue {
    pub kind: u8,
    pub signed: i64,
    pub unsigned: u64,
    pub float: f64,
    pub symbol: *const c_char,
}

impl RawValue {
    pub fn signed(value: i64) -> Self {
        Self {
            kind: RawKind::Signed as u8,
            signed: value,
            ..Self::empty()
        }
    }

    pub fn unsigned(value: u64) -> Self {
        Self {
            kind: RawKind::Unsigned as u8,
            unsigned: value,
            ..Self::empty()
        }
    }

    pub fn float(value: f64) -> Self {
        Self {
            kind: RawKind::Float as u8,
            float: value,
            ..Self::empty()
        }
    }

    /// Wrap a borrowed symbol. The caller keeps `symbol` alive for as long
    /// as the artifact may read it.
    pub fn symbol(symbol: *const c_char) -> Self {
        Self {
            kind: RawKind::Symbol as u8,
            symbol,
            ..Self::empty()
        }
    }

    /// Zeroed slot, used to size output buffers for `iter_next`.
    pub fn empty() -> Self {
        Self {
            kind: RawKind::Signed as u8,
            signed: 0,
            unsigned: 0,
            float: 0.0,
            symbol: ptr::null(),
        }
    }
}

impl RawValue {
    /// Decode the tag written by the artifact.
    pub fn raw_kind(&self) -> Option<RawKind> {
        match self.kind {
            0 => Some(RawKind::Signed),
            1 => Some(RawKind::Unsigned),
            2 => Some(RawKind::Float),
            3 => Some(RawKind::Symbol),
            _ => None,
        }
    }
}

impl Default for RawValue {
    fn default() -> Self {
        Self::empty()
    }
}

/// Relation category selector for enumeration and bulk purge.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawCategory {
    Input = 0,
    Output = 1,
    Internal = 2,
    /// Enumeration only; the artifact has no bulk purge for it.
    All = 3,
}

//! C ABI for compiled Souffle program artifacts.
//!
//! This crate defines the interface between the souffle-host front end and a
//! program artifact (a `.so`/`.dylib`/`.dll` produced by the Souffle compiler).
//! The artifact exports one symbol, [`ENTRY_SYMBOL`], returning a pointer to a
//! static [`EngineVTable`].
//!
//! This crate does not ship the C++ side of the table. Stock Souffle
//! generators do not emit it, so artifacts come from a Souffle build or a
//! compiler wrapper whose `-s` generator (`native` by default, see the
//! host's `compiler.format` setting) links an implementation of this table
//! next to the generated program.
//!
//! # Architecture
//!
//! ```text
//! souffle-host (Program, RelationView) -> EngineVTable -> SouffleProgram / Relation (C++)
//! ```
//!
//! Everything crossing the boundary is `#[repr(C)]`: programs, relations and
//! iterators are opaque pointers owned by the artifact, scalars travel as
//! [`RawValue`], strings as NUL-terminated `char` pointers borrowed for the
//! duration of the call.

mod raw;
mod vtable;

pub use raw::{RawCategory, RawKind, RawValue};
pub use vtable::{
    ABI_VERSION, ENTRY_SYMBOL, EngineEntryFn, EngineVTable, IteratorPtr, ProgramPtr, RelationPtr,
    STATUS_OK,
};

//! Function table exported by a program artifact.

use crate::{RawCategory, RawValue};
use std::os::raw::{c_char, c_int, c_void};

/// Opaque `SouffleProgram*` owned by the artifact.
pub type ProgramPtr = *mut c_void;
/// Opaque `Relation*`, valid while its program instance lives.
pub type RelationPtr = *mut c_void;
/// Opaque tuple iterator created by `iter_begin`.
pub type IteratorPtr = *mut c_void;

/// Name of the symbol every artifact exports.
pub const ENTRY_SYMBOL: &[u8] = b"souffle_host_engine\0";

/// Signature of [`ENTRY_SYMBOL`].
pub type EngineEntryFn = unsafe extern "C" fn() -> *const EngineVTable;

/// Version of [`EngineVTable`]. Bumped on any layout change.
pub const ABI_VERSION: u32 = 1;

/// Status returned by fallible entry points on success. Any other value means
/// failure and `last_error` holds the message.
pub const STATUS_OK: c_int = 0;

/// Entry points of a program artifact.
///
/// Relation pointers returned by `relation_at` stay valid until the owning
/// program is released with `free_instance`. Strings returned by metadata
/// calls live as long as the relation.
#[repr(C)]
pub struct EngineVTable {
    /// Must equal [`ABI_VERSION`].
    pub abi_version: u32,

    /// Instantiate the program registered under `name`; null if this artifact
    /// does not provide it.
    pub new_instance: unsafe extern "C" fn(name: *const c_char) -> ProgramPtr,
    pub free_instance: unsafe extern "C" fn(program: ProgramPtr),
    /// Message for the most recent failed call on `program` (or null).
    pub last_error: unsafe extern "C" fn(program: ProgramPtr) -> *const c_char,

    pub run: unsafe extern "C" fn(program: ProgramPtr) -> c_int,
    /// Empty strings select the engine's default directories.
    pub run_all: unsafe extern "C" fn(
        program: ProgramPtr,
        input_dir: *const c_char,
        output_dir: *const c_char,
    ) -> c_int,
    pub load_all: unsafe extern "C" fn(program: ProgramPtr, input_dir: *const c_char) -> c_int,
    pub print_all: unsafe extern "C" fn(program: ProgramPtr, output_dir: *const c_char) -> c_int,
    pub num_threads: unsafe extern "C" fn(program: ProgramPtr) -> usize,
    pub set_num_threads: unsafe extern "C" fn(program: ProgramPtr, threads: usize),

    pub relation_count: unsafe extern "C" fn(program: ProgramPtr, category: RawCategory) -> usize,
    pub relation_at:
        unsafe extern "C" fn(program: ProgramPtr, category: RawCategory, index: usize) -> RelationPtr,
    /// `RawCategory::All` is not accepted.
    pub purge_category: unsafe extern "C" fn(program: ProgramPtr, category: RawCategory) -> c_int,

    pub relation_name: unsafe extern "C" fn(relation: RelationPtr) -> *const c_char,
    /// Full arity, primary plus auxiliary columns.
    pub arity: unsafe extern "C" fn(relation: RelationPtr) -> usize,
    pub auxiliary_arity: unsafe extern "C" fn(relation: RelationPtr) -> usize,
    pub attr_name: unsafe extern "C" fn(relation: RelationPtr, index: usize) -> *const c_char,
    /// `short:long` signature of one attribute, e.g. `i:number`.
    pub attr_type: unsafe extern "C" fn(relation: RelationPtr, index: usize) -> *const c_char,
    pub size: unsafe extern "C" fn(relation: RelationPtr) -> usize,

    /// `values` holds exactly the primary arity; the artifact fills the
    /// provenance columns itself.
    pub contains: unsafe extern "C" fn(
        program: ProgramPtr,
        relation: RelationPtr,
        values: *const RawValue,
        len: usize,
        found: *mut bool,
    ) -> c_int,
    pub insert: unsafe extern "C" fn(
        program: ProgramPtr,
        relation: RelationPtr,
        values: *const RawValue,
        len: usize,
    ) -> c_int,
    pub purge: unsafe extern "C" fn(program: ProgramPtr, relation: RelationPtr) -> c_int,

    pub iter_begin: unsafe extern "C" fn(relation: RelationPtr) -> IteratorPtr,
    /// Writes one full-arity row into `out` (capacity `len`) and returns
    /// true, or returns false at the end of the relation.
    pub iter_next: unsafe extern "C" fn(iter: IteratorPtr, out: *mut RawValue, len: usize) -> bool,
    pub iter_free: unsafe extern "C" fn(iter: IteratorPtr),
}

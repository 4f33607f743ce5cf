//! Engine over compiled artifacts, through the `souffle-host-abi` table.

use super::{Category, Engine, EngineProgram, EngineRelation};
use crate::codec::AttrType;
use crate::value::{AttrKind, Value, conform_tuple};
use crate::{Error, Result};
use libloading::Library;
use souffle_host_abi::{
    ABI_VERSION, ENTRY_SYMBOL, EngineEntryFn, EngineVTable, IteratorPtr, ProgramPtr, RawCategory,
    RawKind, RawValue, RelationPtr, STATUS_OK,
};
use souffle_host_loader::DylibLoader;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

/// Creates programs from the artifacts a [`DylibLoader`] has opened.
///
/// Libraries are searched in load order; the first whose factory knows the
/// requested name wins.
pub struct NativeEngine {
    loader: Arc<DylibLoader>,
}

impl NativeEngine {
    pub fn new(loader: Arc<DylibLoader>) -> Self {
        Self { loader }
    }

    /// Engine over the libraries opened by the global loader.
    pub fn global() -> Self {
        Self::new(DylibLoader::global())
    }
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::global()
    }
}

impl Engine for NativeEngine {
    fn create(&self, name: &str) -> Result<Rc<dyn EngineProgram>> {
        let c_name = to_cstring(name, "program name")?;

        for library in self.loader.libraries() {
            // SAFETY: artifacts export ENTRY_SYMBOL with the EngineEntryFn
            // signature. Libraries without it are skipped.
            let entry: EngineEntryFn = match unsafe { library.get::<EngineEntryFn>(ENTRY_SYMBOL) } {
                Ok(symbol) => *symbol,
                Err(_) => continue,
            };
            // SAFETY: the entry point takes no arguments and returns null or a
            // pointer to a static table inside `library`.
            let vtable = unsafe { entry() };
            // SAFETY: the table lives as long as `library`, which the instance keeps.
            if let Some(program) = unsafe { instantiate(vtable, &c_name, Some(library))? } {
                tracing::debug!(program = name, "created native program instance");
                return Ok(program);
            }
        }

        Err(Error::UnknownProgram(name.to_string()))
    }
}

/// Create `name` from one artifact table. `Ok(None)` when the table is null
/// or does not provide the program.
///
/// # Safety
///
/// `vtable` is null or points to a table valid for as long as `library`
/// lives (for the whole process when `library` is `None`).
unsafe fn instantiate(
    vtable: *const EngineVTable,
    name: &CStr,
    library: Option<Arc<Library>>,
) -> Result<Option<Rc<dyn EngineProgram>>> {
    if vtable.is_null() {
        return Ok(None);
    }
    // SAFETY: non-null and valid per the caller.
    let table = unsafe { &*vtable };
    if table.abi_version != ABI_VERSION {
        return Err(Error::InvariantViolation(format!(
            "artifact speaks ABI version {}, expected {ABI_VERSION}",
            table.abi_version
        )));
    }
    // SAFETY: `name` is a valid NUL-terminated string for the call.
    let program = unsafe { (table.new_instance)(name.as_ptr()) };
    if program.is_null() {
        return Ok(None);
    }
    let instance = Rc::new(Instance {
        vtable,
        program,
        _library: library,
    });
    Ok(Some(Rc::new(NativeProgram { instance })))
}

/// A program instance and the library whose code it runs.
struct Instance {
    vtable: *const EngineVTable,
    program: ProgramPtr,
    /// `None` for tables linked into this binary.
    _library: Option<Arc<Library>>,
}

impl Instance {
    fn vt(&self) -> &EngineVTable {
        // SAFETY: checked non-null at creation; `_library` keeps it mapped.
        unsafe { &*self.vtable }
    }

    fn check(&self, status: c_int) -> Result<()> {
        if status == STATUS_OK {
            return Ok(());
        }
        // SAFETY: `program` is live until drop.
        let message = unsafe { read_str((self.vt().last_error)(self.program)) };
        Err(Error::Engine(
            message.unwrap_or_else(|| format!("engine call failed with status {status}")),
        ))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // SAFETY: `program` came from `new_instance` and is released once.
        unsafe { (self.vt().free_instance)(self.program) }
    }
}

struct NativeProgram {
    instance: Rc<Instance>,
}

fn raw_category(category: Category) -> RawCategory {
    match category {
        Category::Input => RawCategory::Input,
        Category::Output => RawCategory::Output,
        Category::Internal => RawCategory::Internal,
        Category::All => RawCategory::All,
    }
}

impl EngineProgram for NativeProgram {
    fn run(&self) -> Result<()> {
        let i = &self.instance;
        // SAFETY: live program pointer.
        i.check(unsafe { (i.vt().run)(i.program) })
    }

    fn run_all(&self, input_dir: Option<&Path>, output_dir: Option<&Path>) -> Result<()> {
        let input = dir_cstring(input_dir)?;
        let output = dir_cstring(output_dir)?;
        let i = &self.instance;
        // SAFETY: both strings outlive the call.
        i.check(unsafe { (i.vt().run_all)(i.program, input.as_ptr(), output.as_ptr()) })
    }

    fn load_all(&self, input_dir: Option<&Path>) -> Result<()> {
        let input = dir_cstring(input_dir)?;
        let i = &self.instance;
        // SAFETY: `input` outlives the call.
        i.check(unsafe { (i.vt().load_all)(i.program, input.as_ptr()) })
    }

    fn print_all(&self, output_dir: Option<&Path>) -> Result<()> {
        let output = dir_cstring(output_dir)?;
        let i = &self.instance;
        // SAFETY: `output` outlives the call.
        i.check(unsafe { (i.vt().print_all)(i.program, output.as_ptr()) })
    }

    fn num_threads(&self) -> usize {
        let i = &self.instance;
        // SAFETY: live program pointer.
        unsafe { (i.vt().num_threads)(i.program) }
    }

    fn set_num_threads(&self, threads: usize) {
        let i = &self.instance;
        // SAFETY: live program pointer.
        unsafe { (i.vt().set_num_threads)(i.program, threads) }
    }

    fn relations(&self, category: Category) -> Result<Vec<Rc<dyn EngineRelation>>> {
        let i = &self.instance;
        let raw = raw_category(category);
        // SAFETY: live program pointer.
        let count = unsafe { (i.vt().relation_count)(i.program, raw) };
        (0..count)
            .map(|index| {
                // SAFETY: `index` is below the count just reported.
                let relation = unsafe { (i.vt().relation_at)(i.program, raw, index) };
                if relation.is_null() {
                    return Err(Error::InvariantViolation(format!(
                        "artifact returned no relation at index {index} of {count}"
                    )));
                }
                let relation = NativeRelation::new(Rc::clone(i), relation)?;
                Ok(Rc::new(relation) as Rc<dyn EngineRelation>)
            })
            .collect()
    }

    fn purge(&self, category: Category) -> Result<()> {
        let i = &self.instance;
        if category == Category::All {
            for category in [Category::Input, Category::Output, Category::Internal] {
                self.purge(category)?;
            }
            return Ok(());
        }
        // SAFETY: live program pointer; `All` handled above.
        i.check(unsafe { (i.vt().purge_category)(i.program, raw_category(category)) })
    }
}

/// Relation metadata is read once, when the relation is enumerated.
struct NativeRelation {
    instance: Rc<Instance>,
    relation: RelationPtr,
    name: String,
    names: Vec<String>,
    types: Vec<String>,
    kinds: Rc<[AttrKind]>,
    auxiliary_arity: usize,
}

impl NativeRelation {
    fn new(instance: Rc<Instance>, relation: RelationPtr) -> Result<Self> {
        let vt = instance.vt();
        let missing = |what: &str| Error::InvariantViolation(format!("artifact returned no {what}"));

        // SAFETY: `relation` is a live relation of `instance`; the returned
        // strings live as long as the relation.
        let name = unsafe { read_str((vt.relation_name)(relation)) }
            .ok_or_else(|| missing("relation name"))?;
        // SAFETY: as above.
        let arity = unsafe { (vt.arity)(relation) };
        // SAFETY: as above.
        let auxiliary_arity = unsafe { (vt.auxiliary_arity)(relation) };
        if auxiliary_arity > arity {
            return Err(Error::InvariantViolation(format!(
                "relation {name} has auxiliary arity {auxiliary_arity} above its arity {arity}"
            )));
        }

        let mut names = Vec::with_capacity(arity);
        let mut types = Vec::with_capacity(arity);
        let mut kinds = Vec::with_capacity(arity);
        for index in 0..arity {
            // SAFETY: `index` is below the reported arity.
            let attr = unsafe { read_str((vt.attr_name)(relation, index)) }
                .ok_or_else(|| missing("attribute name"))?;
            // SAFETY: as above.
            let signature = unsafe { read_str((vt.attr_type)(relation, index)) }
                .ok_or_else(|| missing("attribute type"))?;
            let kind = AttrKind::from_code(&AttrType::parse(&signature)?.short).ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "relation {name} uses unknown attribute type '{signature}'"
                ))
            })?;
            names.push(attr);
            types.push(signature);
            kinds.push(kind);
        }

        Ok(Self {
            instance,
            relation,
            name,
            names,
            types,
            kinds: kinds.into(),
            auxiliary_arity,
        })
    }

    fn primary_kinds(&self) -> &[AttrKind] {
        &self.kinds[..self.kinds.len() - self.auxiliary_arity]
    }
}

impl EngineRelation for NativeRelation {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn arity(&self) -> usize {
        self.kinds.len()
    }

    fn primary_arity(&self) -> usize {
        self.kinds.len() - self.auxiliary_arity
    }

    fn auxiliary_arity(&self) -> usize {
        self.auxiliary_arity
    }

    fn attr_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn attr_types(&self) -> Vec<String> {
        self.types.clone()
    }

    fn len(&self) -> Result<usize> {
        // SAFETY: live relation pointer.
        Ok(unsafe { (self.instance.vt().size)(self.relation) })
    }

    fn contains(&self, tuple: Vec<Value>) -> Result<bool> {
        let tuple = conform_tuple(&self.name, self.primary_kinds(), tuple)?;
        let encoded = Encoded::new(&tuple)?;
        let i = &self.instance;
        let mut found = false;
        // SAFETY: `encoded` (and the symbols it points to) outlives the call.
        let status = unsafe {
            (i.vt().contains)(
                i.program,
                self.relation,
                encoded.raw.as_ptr(),
                encoded.raw.len(),
                &mut found,
            )
        };
        i.check(status)?;
        Ok(found)
    }

    fn insert(&self, tuples: Vec<Vec<Value>>) -> Result<()> {
        let i = &self.instance;
        for (index, tuple) in tuples.into_iter().enumerate() {
            let wrap = |source: Error| Error::Insertion {
                index,
                source: Box::new(source),
            };
            let tuple = conform_tuple(&self.name, self.primary_kinds(), tuple).map_err(wrap)?;
            let encoded = Encoded::new(&tuple).map_err(wrap)?;
            // SAFETY: `encoded` outlives the call.
            let status = unsafe {
                (i.vt().insert)(i.program, self.relation, encoded.raw.as_ptr(), encoded.raw.len())
            };
            i.check(status).map_err(wrap)?;
        }
        Ok(())
    }

    fn purge(&self) -> Result<()> {
        let i = &self.instance;
        // SAFETY: live program and relation pointers.
        i.check(unsafe { (i.vt().purge)(i.program, self.relation) })
    }

    fn scan(&self, data_only: bool) -> Result<Box<dyn Iterator<Item = Result<Vec<Value>>>>> {
        let i = &self.instance;
        // SAFETY: live relation pointer.
        let remaining = unsafe { (i.vt().size)(self.relation) };
        // SAFETY: as above.
        let iter = unsafe { (i.vt().iter_begin)(self.relation) };
        if iter.is_null() {
            return Err(Error::InvariantViolation(format!(
                "artifact could not iterate relation {}",
                self.name
            )));
        }
        let width = if data_only {
            self.primary_arity()
        } else {
            self.arity()
        };
        Ok(Box::new(NativeRows {
            instance: Rc::clone(i),
            iter,
            buffer: vec![RawValue::empty(); self.kinds.len()],
            kinds: Rc::clone(&self.kinds),
            width,
            remaining,
            relation: self.name.clone(),
        }))
    }
}

/// Lazy scan, bounded by the relation size when it started.
struct NativeRows {
    instance: Rc<Instance>,
    iter: IteratorPtr,
    buffer: Vec<RawValue>,
    kinds: Rc<[AttrKind]>,
    width: usize,
    remaining: usize,
    relation: String,
}

impl Iterator for NativeRows {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        // SAFETY: `iter` is live until drop and `buffer` holds full arity.
        let more = unsafe {
            (self.instance.vt().iter_next)(self.iter, self.buffer.as_mut_ptr(), self.buffer.len())
        };
        if !more {
            self.remaining = 0;
            return None;
        }
        self.remaining -= 1;
        Some(
            self.buffer[..self.width]
                .iter()
                .zip(self.kinds.iter())
                .map(|(raw, &kind)| decode(raw, kind, &self.relation))
                .collect(),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl Drop for NativeRows {
    fn drop(&mut self) {
        // SAFETY: `iter` came from `iter_begin` and is freed once.
        unsafe { (self.instance.vt().iter_free)(self.iter) }
    }
}

/// Values laid out for one call, with the symbol strings they borrow.
struct Encoded {
    raw: Vec<RawValue>,
    _symbols: Vec<CString>,
}

impl Encoded {
    fn new(values: &[Value]) -> Result<Self> {
        let mut raw = Vec::with_capacity(values.len());
        let mut symbols = Vec::new();
        for value in values {
            raw.push(match value {
                Value::Signed(v) => RawValue::signed(*v),
                Value::Unsigned(v) => RawValue::unsigned(*v),
                Value::Float(v) => RawValue::float(*v),
                Value::Symbol(s) => {
                    let symbol = to_cstring(s, "symbol")?;
                    // The CString's heap buffer does not move when pushed.
                    let ptr = symbol.as_ptr();
                    symbols.push(symbol);
                    RawValue::symbol(ptr)
                }
            });
        }
        Ok(Self {
            raw,
            _symbols: symbols,
        })
    }
}

fn decode(raw: &RawValue, kind: AttrKind, relation: &str) -> Result<Value> {
    let expected = match kind {
        AttrKind::Signed => RawKind::Signed,
        AttrKind::Unsigned => RawKind::Unsigned,
        AttrKind::Float => RawKind::Float,
        AttrKind::Symbol => RawKind::Symbol,
        AttrKind::Record | AttrKind::Adt => {
            return Err(Error::InvariantViolation(format!(
                "relation {relation} has a '{}' attribute which cannot be marshaled",
                kind.code()
            )));
        }
    };
    if raw.raw_kind() != Some(expected) {
        return Err(Error::InvariantViolation(format!(
            "artifact wrote tag {} for a '{}' attribute of relation {relation}",
            raw.kind,
            kind.code()
        )));
    }
    Ok(match expected {
        RawKind::Signed => Value::Signed(raw.signed),
        RawKind::Unsigned => Value::Unsigned(raw.unsigned),
        RawKind::Float => Value::Float(raw.float),
        // SAFETY: symbols written by `iter_next` are valid until the next
        // call on the iterator; the string is copied out here.
        RawKind::Symbol => Value::Symbol(unsafe { read_str(raw.symbol) }.ok_or_else(|| {
            Error::InvariantViolation(format!("artifact wrote a null symbol for relation {relation}"))
        })?),
    })
}

fn to_cstring(text: &str, what: &str) -> Result<CString> {
    CString::new(text)
        .map_err(|_| Error::InvalidArgument(format!("{what} {text:?} contains a NUL byte")))
}

/// Directory argument; empty selects the engine default.
fn dir_cstring(dir: Option<&Path>) -> Result<CString> {
    let Some(dir) = dir else {
        return Ok(CString::default());
    };
    let text = dir.to_str().ok_or_else(|| {
        Error::InvalidArgument(format!("directory '{}' is not valid UTF-8", dir.display()))
    })?;
    to_cstring(text, "directory")
}

/// Copy a borrowed C string; `None` for null.
///
/// # Safety
///
/// `ptr` is null or points to a NUL-terminated string valid for this call.
unsafe fn read_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

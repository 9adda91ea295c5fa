// quill-embed - The Context: one complete Quill instance
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The `Context` owns one of everything — package registry, code store,
//! reader, compiler, VM — and is the host's entry point.
//!
//! # Thread safety
//!
//! **`Context` is NOT thread-safe.** It uses `Rc` and `RefCell` internally.
//! Run independent contexts on separate threads instead; they share no
//! packages, environments, or code.
//!
//! # Logging
//!
//! Per-form compile/execute summaries are emitted at `log::debug!` and the
//! VM's instruction tracer at `log::trace!`; install whatever `log` sink
//! the host prefers.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use thiserror::Error;

use quill_reader::{
    CodeHandle, PackageRegistry, QuillVal, ReadError, Reader,
};
use quill_vm::{
    install, register_defaults, CodeBlock, CodeStore, CompileError, Compiler, Primitive,
    RuntimeError, Vm,
};

use crate::convert::IntoQuillVal;

/// The standard library, compiled through the ordinary pipeline by
/// [`Context::new`].
const PRELUDE: &str = include_str!("../../quill-std/prelude.qll");

/// Any failure surfaced to the host: reading, compiling, or executing.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("symbol '{0}' is not bound")]
    Unbound(String),
    #[error("cannot convert {got} to {expected}")]
    Conversion {
        expected: &'static str,
        got: String,
    },
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of one top-level form.
#[derive(Debug, Clone)]
pub struct FormResult {
    /// The source text the form was read from.
    pub source: String,
    /// Code blocks newly registered while compiling it (top block last).
    pub blocks: Vec<CodeHandle>,
    /// The value the form evaluated to.
    pub value: QuillVal,
    /// Wall-clock execution time.
    pub elapsed: Duration,
}

/// One complete Quill instance.
pub struct Context {
    registry: PackageRegistry,
    store: Rc<RefCell<CodeStore>>,
    reader: Reader,
    compiler: Compiler,
    vm: Vm,
}

impl Context {
    /// A context with the core primitives and the in-language standard
    /// library (`let`, `cond`, records, …) loaded.
    pub fn new() -> Result<Self> {
        let mut context = Self::new_bare();
        context.compile_and_execute(PRELUDE)?;
        Ok(context)
    }

    /// A context with only the core primitives; no standard library.
    #[must_use]
    pub fn new_bare() -> Self {
        let registry = PackageRegistry::new();
        let store = Rc::new(RefCell::new(CodeStore::new()));
        let vm = Vm::new(registry.clone(), Rc::clone(&store));
        register_defaults(&vm);
        Context {
            reader: Reader::new(registry.clone()),
            compiler: Compiler::new(registry.clone(), Rc::clone(&store)),
            vm,
            registry,
            store,
        }
    }

    /// Feed source text and run every complete form in it, returning one
    /// [`FormResult`] per form.
    ///
    /// Forms are read, compiled, and executed strictly in order, so a
    /// form's side effects (package switches, macro definitions) are in
    /// force while the next form is read. An error aborts the remainder;
    /// already-executed forms stay in effect.
    pub fn compile_and_execute(&mut self, source: &str) -> Result<Vec<FormResult>> {
        self.reader.feed(source);
        let mut results = Vec::new();
        while let Some(form) = self.reader.read_next()? {
            let started = Instant::now();
            let compiled = self.compiler.compile_top(&self.vm, &form.value)?;
            let value = self.vm.execute(&compiled.closure, &[])?;
            let elapsed = started.elapsed();
            log::debug!(
                "{} => {} ({} blocks, {:?})",
                form.text.trim(),
                value,
                compiled.new_blocks.len(),
                elapsed
            );
            results.push(FormResult {
                source: form.text,
                blocks: compiled.new_blocks,
                value,
                elapsed,
            });
        }
        Ok(results)
    }

    /// Evaluate source and return the last form's value (nil for empty
    /// input).
    pub fn eval(&mut self, source: &str) -> Result<QuillVal> {
        Ok(self
            .compile_and_execute(source)?
            .pop()
            .map(|result| result.value)
            .unwrap_or(QuillVal::Nil))
    }

    /// The value bound to `name`, resolved through the current package's
    /// import chain.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<QuillVal> {
        let sym = self.registry.current().resolve(name)?;
        sym.package()?.get(&sym)
    }

    /// Bind `name` in the current package.
    pub fn set(&self, name: &str, value: impl IntoQuillVal) -> Result<()> {
        let current = self.registry.current();
        let sym = current.intern(name);
        current
            .set(&sym, value.into_quill_val())
            .map_err(RuntimeError::from)?;
        Ok(())
    }

    /// Call the closure bound to `name` with `args`.
    pub fn call(&self, name: &str, args: &[QuillVal]) -> Result<QuillVal> {
        let callable = self
            .get(name)
            .ok_or_else(|| Error::Unbound(name.to_string()))?;
        Ok(self.vm.execute(&callable, args)?)
    }

    /// Register a host primitive: added to the dispatch table, and (for a
    /// new name) bound as an exported stub closure in `core`.
    pub fn register_primitive(&self, primitive: Primitive) {
        install(&self.vm, primitive);
    }

    /// All live code blocks, for debugging.
    #[must_use]
    pub fn code_blocks(&self) -> Vec<Rc<CodeBlock>> {
        let store = self.store.borrow();
        store
            .handles()
            .into_iter()
            .filter_map(|handle| store.get(handle))
            .collect()
    }

    /// Pretty-printed listing of one code block.
    #[must_use]
    pub fn disassemble(&self, handle: CodeHandle) -> Option<String> {
        self.store.borrow().get(handle).map(|block| block.to_string())
    }

    /// The package registry.
    #[must_use]
    pub fn registry(&self) -> &PackageRegistry {
        &self.registry
    }

    /// The virtual machine (tracer toggles, stack diagnostics).
    #[must_use]
    pub fn vm(&self) -> &Vm {
        &self.vm
    }
}

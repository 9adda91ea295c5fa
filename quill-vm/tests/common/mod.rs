// quill-vm - Shared test fixture
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Minimal read→compile→execute pipeline for integration tests.

use std::cell::RefCell;
use std::rc::Rc;

use quill_reader::{PackageRegistry, QuillVal, Reader};
use quill_vm::{register_defaults, CodeStore, CompiledForm, Compiler, Vm};

pub struct Fixture {
    pub reader: Reader,
    pub compiler: Compiler,
    pub vm: Vm,
    pub store: Rc<RefCell<CodeStore>>,
}

impl Fixture {
    pub fn new() -> Self {
        let registry = PackageRegistry::new();
        let store = Rc::new(RefCell::new(CodeStore::new()));
        let vm = Vm::new(registry.clone(), Rc::clone(&store));
        register_defaults(&vm);
        Fixture {
            reader: Reader::new(registry.clone()),
            compiler: Compiler::new(registry, Rc::clone(&store)),
            vm,
            store,
        }
    }

    /// Compile one form without executing it.
    pub fn compile(&mut self, source: &str) -> Result<CompiledForm, String> {
        self.reader.feed(source);
        let form = self
            .reader
            .read_next()
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "incomplete form".to_string())?;
        self.compiler
            .compile_top(&self.vm, &form.value)
            .map_err(|e| e.to_string())
    }

    /// Read, compile, and execute every form; return each form's value.
    pub fn eval_all(&mut self, source: &str) -> Result<Vec<QuillVal>, String> {
        self.reader.feed(source);
        let mut results = Vec::new();
        while let Some(form) = self.reader.read_next().map_err(|e| e.to_string())? {
            let compiled = self
                .compiler
                .compile_top(&self.vm, &form.value)
                .map_err(|e| e.to_string())?;
            results.push(
                self.vm
                    .execute(&compiled.closure, &[])
                    .map_err(|e| e.to_string())?,
            );
        }
        Ok(results)
    }

    /// Evaluate and return the last form's value.
    pub fn eval(&mut self, source: &str) -> Result<QuillVal, String> {
        self.eval_all(source)?
            .pop()
            .ok_or_else(|| "no complete forms in input".to_string())
    }
}

/// Assert that evaluating `source` prints `expected`.
#[macro_export]
macro_rules! assert_prints {
    ($fixture:expr, $source:expr, $expected:expr) => {
        let result = $fixture.eval($source);
        assert!(
            result.is_ok(),
            "failed to evaluate '{}': {:?}",
            $source,
            result.err()
        );
        assert_eq!(
            result.unwrap().to_string(),
            $expected,
            "evaluation of '{}' printed differently",
            $source
        );
    };
}

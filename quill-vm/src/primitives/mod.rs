// quill-vm - Built-in primitives for the Quill programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Built-in functions callable from bytecode.
//!
//! A primitive is dispatched by `(name, argument count)`: exact-arity
//! primitives match their count exactly, varargs primitives accept any
//! count at or above their minimum. Every registered name also gets a
//! synthetic one-instruction stub closure (`CALL_PRIMOP name; RETURN_VAL`)
//! bound to an exported symbol in the `core` package, so ordinary
//! function-call code paths treat primitives like any other closure.

mod arithmetic;
mod lists;
mod packages;
mod predicates;
mod reflect;
mod strings;
mod vectors;

use std::collections::HashMap;
use std::rc::Rc;

use quill_reader::{Closure, QuillVal};

use crate::env::Env;
use crate::instruction::{Instruction, Op};
use crate::vm::{Result, Vm};

use arithmetic::{
    builtin_add, builtin_div, builtin_ge, builtin_gt, builtin_le, builtin_lt, builtin_mul,
    builtin_ne, builtin_num_eq, builtin_sub,
};
use lists::{
    builtin_append, builtin_cadr, builtin_caddr, builtin_car, builtin_cddr, builtin_cdddr,
    builtin_cdr, builtin_cons, builtin_length, builtin_list, builtin_map, builtin_nth,
    builtin_nth_cons, builtin_nth_tail,
};
use packages::{
    builtin_package_export, builtin_package_exports, builtin_package_get, builtin_package_import,
    builtin_package_imports, builtin_package_set,
};
use predicates::{
    builtin_atom_p, builtin_boolean_p, builtin_cons_p, builtin_equal_p, builtin_not,
    builtin_null_p, builtin_number_p, builtin_string_p, builtin_vector_p,
};
use reflect::{builtin_gensym, builtin_mx, builtin_mx1, builtin_trace};
use strings::{builtin_string_append, builtin_string_to_symbol, builtin_symbol_to_string};
use vectors::{
    builtin_vector, builtin_vector_length, builtin_vector_ref, builtin_vector_set,
};

/// The Rust side of a primitive. Receives the VM so list and reflection
/// primitives can re-enter `execute`.
pub type PrimitiveFn = Rc<dyn Fn(&Vm, &[QuillVal]) -> Result<QuillVal>>;

/// How a primitive's arity is matched at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArityKind {
    /// The argument count must equal `min_arity`.
    Exact,
    /// The argument count must be at least `min_arity`.
    Varargs,
}

/// A registered built-in function.
#[derive(Clone)]
pub struct Primitive {
    pub name: Rc<str>,
    pub min_arity: usize,
    pub kind: ArityKind,
    pub side_effects: bool,
    func: PrimitiveFn,
}

impl Primitive {
    /// A primitive requiring exactly `arity` arguments.
    pub fn exact(
        name: &str,
        arity: usize,
        func: impl Fn(&Vm, &[QuillVal]) -> Result<QuillVal> + 'static,
    ) -> Self {
        Primitive {
            name: Rc::from(name),
            min_arity: arity,
            kind: ArityKind::Exact,
            side_effects: false,
            func: Rc::new(func),
        }
    }

    /// A primitive accepting `min` or more arguments.
    pub fn varargs(
        name: &str,
        min: usize,
        func: impl Fn(&Vm, &[QuillVal]) -> Result<QuillVal> + 'static,
    ) -> Self {
        Primitive {
            name: Rc::from(name),
            min_arity: min,
            kind: ArityKind::Varargs,
            side_effects: false,
            func: Rc::new(func),
        }
    }

    /// Mark this primitive as mutating observable state.
    #[must_use]
    pub fn with_side_effects(mut self) -> Self {
        self.side_effects = true;
        self
    }

    /// Whether this primitive accepts `argc` arguments.
    #[inline]
    #[must_use]
    pub fn accepts(&self, argc: usize) -> bool {
        match self.kind {
            ArityKind::Exact => argc == self.min_arity,
            ArityKind::Varargs => argc >= self.min_arity,
        }
    }

    /// Invoke the primitive.
    pub fn call(&self, vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
        (self.func)(vm, args)
    }
}

impl std::fmt::Debug for Primitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Primitive({}, {:?} {})",
            self.name, self.kind, self.min_arity
        )
    }
}

/// Dispatch table: name → arity-ordered candidates.
#[derive(Debug, Default)]
pub struct PrimitiveTable {
    entries: HashMap<String, Vec<Primitive>>,
}

impl PrimitiveTable {
    /// Add a primitive under its name.
    pub fn insert(&mut self, primitive: Primitive) {
        self.entries
            .entry(primitive.name.to_string())
            .or_default()
            .push(primitive);
    }

    /// The primitive matching `(name, argc)`, if any. The same instance is
    /// returned for a given pair no matter the call path.
    #[must_use]
    pub fn lookup(&self, name: &str, argc: usize) -> Option<Primitive> {
        self.entries
            .get(name)?
            .iter()
            .find(|p| p.accepts(argc))
            .cloned()
    }

    /// Whether any primitive is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Register `primitive` in the table and, for the first primitive of its
/// name, emit the stub closure and bind it (exported) in `core`.
pub fn install(vm: &Vm, primitive: Primitive) {
    let name = primitive.name.clone();
    let already_known = vm.primitives().borrow().contains(&name);
    vm.primitives().borrow_mut().insert(primitive);
    if already_known {
        return;
    }

    let code = vec![
        Instruction::with_first(Op::CallPrimop, QuillVal::string(&*name)),
        Instruction::new(Op::ReturnVal),
    ];
    let handle = vm
        .store()
        .borrow_mut()
        .insert(code, format!("primitive {}", name));
    let stub = QuillVal::closure(Closure {
        code: handle,
        env: Env::empty().erase(),
        params: QuillVal::nil(),
        name: Some(name.clone()),
    });

    let core = vm.registry().core();
    let sym = core.intern(&name);
    sym.set_exported(true);
    core.set(&sym, stub)
        .expect("core package owns its own symbols");
}

/// Register the full default primitive set.
pub fn register_defaults(vm: &Vm) {
    // Arithmetic and comparison.
    install(vm, Primitive::varargs("+", 2, builtin_add));
    install(vm, Primitive::exact("-", 2, builtin_sub));
    install(vm, Primitive::varargs("*", 2, builtin_mul));
    install(vm, Primitive::exact("/", 2, builtin_div));
    install(vm, Primitive::exact("=", 2, builtin_num_eq));
    install(vm, Primitive::exact("!=", 2, builtin_ne));
    install(vm, Primitive::exact("<", 2, builtin_lt));
    install(vm, Primitive::exact("<=", 2, builtin_le));
    install(vm, Primitive::exact(">", 2, builtin_gt));
    install(vm, Primitive::exact(">=", 2, builtin_ge));

    // Lists.
    install(vm, Primitive::exact("cons", 2, builtin_cons));
    install(vm, Primitive::varargs("list", 0, builtin_list));
    install(vm, Primitive::varargs("append", 0, builtin_append));
    install(vm, Primitive::exact("length", 1, builtin_length));
    install(vm, Primitive::exact("car", 1, builtin_car));
    install(vm, Primitive::exact("cdr", 1, builtin_cdr));
    install(vm, Primitive::exact("cadr", 1, builtin_cadr));
    install(vm, Primitive::exact("cddr", 1, builtin_cddr));
    install(vm, Primitive::exact("caddr", 1, builtin_caddr));
    install(vm, Primitive::exact("cdddr", 1, builtin_cdddr));
    install(vm, Primitive::exact("nth", 2, builtin_nth));
    install(vm, Primitive::exact("nth-tail", 2, builtin_nth_tail));
    install(vm, Primitive::exact("nth-cons", 2, builtin_nth_cons));
    install(vm, Primitive::exact("map", 2, builtin_map));

    // Predicates.
    install(vm, Primitive::exact("not", 1, builtin_not));
    install(vm, Primitive::exact("null?", 1, builtin_null_p));
    install(vm, Primitive::exact("cons?", 1, builtin_cons_p));
    install(vm, Primitive::exact("atom?", 1, builtin_atom_p));
    install(vm, Primitive::exact("string?", 1, builtin_string_p));
    install(vm, Primitive::exact("number?", 1, builtin_number_p));
    install(vm, Primitive::exact("boolean?", 1, builtin_boolean_p));
    install(vm, Primitive::exact("vector?", 1, builtin_vector_p));
    install(vm, Primitive::exact("equal?", 2, builtin_equal_p));

    // Strings and symbols.
    install(vm, Primitive::varargs("string-append", 0, builtin_string_append));
    install(vm, Primitive::exact("symbol->string", 1, builtin_symbol_to_string));
    install(vm, Primitive::exact("string->symbol", 1, builtin_string_to_symbol));

    // Vectors.
    install(vm, Primitive::varargs("vector", 0, builtin_vector));
    install(vm, Primitive::exact("vector-length", 1, builtin_vector_length));
    install(vm, Primitive::exact("vector-ref", 2, builtin_vector_ref));
    install(
        vm,
        Primitive::exact("vector-set!", 3, builtin_vector_set).with_side_effects(),
    );

    // Compiler reflection.
    install(vm, Primitive::exact("mx1", 1, builtin_mx1));
    install(vm, Primitive::exact("mx", 1, builtin_mx));
    install(vm, Primitive::exact("gensym", 0, builtin_gensym).with_side_effects());
    install(vm, Primitive::exact("gensym", 1, builtin_gensym).with_side_effects());
    install(vm, Primitive::exact("trace", 1, builtin_trace).with_side_effects());

    // Package control.
    install(
        vm,
        Primitive::exact("package-set", 1, builtin_package_set).with_side_effects(),
    );
    install(vm, Primitive::exact("package-get", 0, builtin_package_get));
    install(
        vm,
        Primitive::exact("package-import", 1, builtin_package_import).with_side_effects(),
    );
    install(vm, Primitive::exact("package-imports", 0, builtin_package_imports));
    install(
        vm,
        Primitive::varargs("package-export", 1, builtin_package_export).with_side_effects(),
    );
    install(vm, Primitive::exact("package-exports", 0, builtin_package_exports));
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quill_reader::PackageRegistry;
    use std::cell::RefCell;

    use crate::code::CodeStore;

    fn machine() -> Vm {
        let vm = Vm::new(
            PackageRegistry::new(),
            Rc::new(RefCell::new(CodeStore::new())),
        );
        register_defaults(&vm);
        vm
    }

    #[test]
    fn dispatch_is_by_name_and_argc() {
        let vm = machine();
        let table = vm.primitives().borrow();
        assert!(table.lookup("+", 2).is_some());
        assert!(table.lookup("+", 5).is_some());
        assert!(table.lookup("+", 1).is_none());
        assert!(table.lookup("car", 1).is_some());
        assert!(table.lookup("car", 2).is_none());
        assert!(table.lookup("no-such", 1).is_none());
    }

    #[test]
    fn stub_closures_are_bound_and_exported_in_core() {
        let vm = machine();
        let core = vm.registry().core();
        let sym = core.find_symbol("cons").expect("cons interned");
        assert!(sym.is_exported());
        let stub = core.get(&sym).expect("cons bound");
        assert!(stub.as_closure().is_some());
        // Stubs execute like any closure.
        let pair = vm
            .execute(&stub, &[QuillVal::int(1), QuillVal::int(2)])
            .unwrap();
        assert_eq!(pair.to_string(), "(1 . 2)");
    }

    #[test]
    fn stub_and_table_agree() {
        let vm = machine();
        // The table entry the stub's CALL_PRIMOP resolves is the same
        // instance a direct lookup returns.
        let direct = vm.primitives().borrow().lookup("length", 1).unwrap();
        let again = vm.primitives().borrow().lookup("length", 1).unwrap();
        assert!(Rc::ptr_eq(&direct.func, &again.func));
    }

    #[test]
    fn every_required_primitive_is_registered() {
        let vm = machine();
        let names = vm.primitives().borrow().names();
        for required in [
            "+", "-", "*", "/", "=", "!=", "<", "<=", ">", ">=", "cons", "list", "append",
            "length", "car", "cdr", "cadr", "cddr", "caddr", "cdddr", "nth", "nth-tail",
            "nth-cons", "map", "not", "null?", "cons?", "atom?", "string?", "number?",
            "boolean?", "mx1", "mx", "gensym", "trace", "package-set", "package-get",
            "package-import", "package-imports", "package-export", "package-exports",
        ] {
            assert!(names.iter().any(|n| n == required), "missing {}", required);
        }
    }

    #[test]
    fn gensym_has_two_arities() {
        let vm = machine();
        let table = vm.primitives().borrow();
        assert!(table.lookup("gensym", 0).is_some());
        assert!(table.lookup("gensym", 1).is_some());
        assert!(table.lookup("gensym", 2).is_none());
    }
}

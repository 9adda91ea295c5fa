// quill-vm - Package-control primitives
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! `package-set package-get package-import package-imports package-export
//! package-exports`, all operating on the registry's current package.

use quill_reader::QuillVal;

use crate::vm::{Result, RuntimeError, Vm};

/// `(package-set "name")` makes the named package current (creating it if
/// needed); `(package-set ())` returns to the global package. Returns its
/// argument.
pub(crate) fn builtin_package_set(vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    match &args[0] {
        QuillVal::Str(name) => {
            let package = vm.registry().find_or_create(name);
            vm.registry().set_current(&package);
            Ok(args[0].clone())
        }
        QuillVal::Nil => {
            let global = vm.registry().global();
            vm.registry().set_current(&global);
            Ok(QuillVal::Nil)
        }
        other => Err(RuntimeError::type_error("string or nil", other.type_name())),
    }
}

/// The current package's name, or nil when the global package is current.
pub(crate) fn builtin_package_get(vm: &Vm, _args: &[QuillVal]) -> Result<QuillVal> {
    let current = vm.registry().current();
    if current.is_global() {
        Ok(QuillVal::Nil)
    } else {
        Ok(QuillVal::string(&*current.name()))
    }
}

pub(crate) fn builtin_package_import(vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    match &args[0] {
        QuillVal::Str(name) => {
            let imported = vm.registry().find_or_create(name);
            vm.registry().current().import(&imported);
            Ok(QuillVal::Nil)
        }
        other => Err(RuntimeError::type_error("string", other.type_name())),
    }
}

pub(crate) fn builtin_package_imports(vm: &Vm, _args: &[QuillVal]) -> Result<QuillVal> {
    let names = vm
        .registry()
        .current()
        .imports()
        .into_iter()
        .map(|pkg| QuillVal::string(&*pkg.name()))
        .collect();
    Ok(QuillVal::list(names))
}

/// Mark symbols (given as symbols or name strings) exported from the
/// current package.
pub(crate) fn builtin_package_export(vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let current = vm.registry().current();
    for arg in args {
        match arg {
            QuillVal::Symbol(sym) => {
                sym.set_exported(true);
            }
            QuillVal::Str(name) => {
                current.intern(name).set_exported(true);
            }
            other => {
                return Err(RuntimeError::type_error(
                    "symbol or string",
                    other.type_name(),
                ))
            }
        }
    }
    Ok(QuillVal::Nil)
}

pub(crate) fn builtin_package_exports(vm: &Vm, _args: &[QuillVal]) -> Result<QuillVal> {
    let symbols = vm
        .registry()
        .current()
        .exports()
        .into_iter()
        .map(QuillVal::symbol)
        .collect();
    Ok(QuillVal::list(symbols))
}

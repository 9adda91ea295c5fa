// quill-vm - String and symbol primitives
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! `string-append`, `symbol->string`, `string->symbol`.
//!
//! `string->symbol` interns through the current package's import chain,
//! the same way the reader treats a bare name.

use quill_reader::QuillVal;

use crate::vm::{Result, RuntimeError, Vm};

pub(crate) fn builtin_string_append(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let mut out = String::new();
    for arg in args {
        match arg {
            QuillVal::Str(s) => out.push_str(s),
            other => return Err(RuntimeError::type_error("string", other.type_name())),
        }
    }
    Ok(QuillVal::string(out))
}

/// The symbol's bare name, without any package prefix.
pub(crate) fn builtin_symbol_to_string(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    match &args[0] {
        QuillVal::Symbol(sym) => Ok(QuillVal::string(sym.name())),
        other => Err(RuntimeError::type_error("symbol", other.type_name())),
    }
}

pub(crate) fn builtin_string_to_symbol(vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    match &args[0] {
        QuillVal::Str(s) => {
            let current = vm.registry().current();
            let sym = current.resolve(s).unwrap_or_else(|| current.intern(s));
            Ok(QuillVal::symbol(sym))
        }
        other => Err(RuntimeError::type_error("string", other.type_name())),
    }
}

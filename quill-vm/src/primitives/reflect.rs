// quill-vm - Compiler-reflection primitives
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! `mx1` (one macro-expansion step), `mx` (head fixed point), `gensym`,
//! and `trace`.

use quill_reader::QuillVal;

use crate::compiler::expand::{macroexpand, macroexpand_1};
use crate::vm::{Result, RuntimeError, Vm};

/// One expansion step; a form whose head is not a macro passes through
/// unchanged.
pub(crate) fn builtin_mx1(vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(macroexpand_1(vm, &args[0])?.unwrap_or_else(|| args[0].clone()))
}

/// The fixed point of iterated `mx1`.
pub(crate) fn builtin_mx(vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    macroexpand(vm, &args[0])
}

/// A fresh symbol in the current package, optionally with a prefix.
pub(crate) fn builtin_gensym(vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let prefix = match args.first() {
        None => "g".to_string(),
        Some(QuillVal::Str(s)) => s.to_string(),
        Some(QuillVal::Symbol(sym)) => sym.name().to_string(),
        Some(other) => {
            return Err(RuntimeError::type_error(
                "string or symbol prefix",
                other.type_name(),
            ))
        }
    };
    let current = vm.registry().current();
    loop {
        let name = format!("{}#{}", prefix, vm.gensym_next());
        if current.find_symbol(&name).is_none() {
            return Ok(QuillVal::symbol(current.intern(&name)));
        }
    }
}

/// Toggle per-instruction tracing; returns the previous setting.
pub(crate) fn builtin_trace(vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(vm.set_trace(args[0].is_truthy())))
}

// quill-vm - Predicate primitives
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Type and truth predicates: `not null? cons? atom? string? number?
//! boolean?`, plus structural `equal?`.

use quill_reader::QuillVal;

use crate::vm::{Result, Vm};

pub(crate) fn builtin_not(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(!args[0].is_truthy()))
}

pub(crate) fn builtin_null_p(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(args[0].is_nil()))
}

pub(crate) fn builtin_cons_p(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(args[0].as_cons().is_some()))
}

/// Anything that is not a cons cell is an atom.
pub(crate) fn builtin_atom_p(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(args[0].as_cons().is_none()))
}

pub(crate) fn builtin_string_p(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(matches!(args[0], QuillVal::Str(_))))
}

pub(crate) fn builtin_number_p(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(matches!(
        args[0],
        QuillVal::Int(_) | QuillVal::Float(_)
    )))
}

pub(crate) fn builtin_boolean_p(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(matches!(args[0], QuillVal::Bool(_))))
}

pub(crate) fn builtin_vector_p(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(matches!(args[0], QuillVal::Vector(_))))
}

pub(crate) fn builtin_equal_p(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(args[0].deep_eq(&args[1])))
}

// ============================================================================
// Tests
// ============================================================================

// quill-vm - Vector primitives
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Mutable vectors: `vector vector-length vector-ref vector-set!`.

use std::cell::RefCell;
use std::rc::Rc;

use quill_reader::QuillVal;

use crate::vm::{Result, RuntimeError, Vm};

fn vector_of(val: &QuillVal) -> Result<&Rc<RefCell<Vec<QuillVal>>>> {
    match val {
        QuillVal::Vector(items) => Ok(items),
        other => Err(RuntimeError::type_error("vector", other.type_name())),
    }
}

fn index_of(val: &QuillVal, length: usize) -> Result<usize> {
    match val {
        QuillVal::Int(n) if *n >= 0 && (*n as usize) < length => Ok(*n as usize),
        QuillVal::Int(n) => Err(RuntimeError::IndexOutOfBounds {
            index: i64::from(*n),
            length,
        }),
        other => Err(RuntimeError::type_error("integer index", other.type_name())),
    }
}

pub(crate) fn builtin_vector(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::vector(args.to_vec()))
}

pub(crate) fn builtin_vector_length(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let items = vector_of(&args[0])?;
    Ok(QuillVal::int(items.borrow().len() as i32))
}

pub(crate) fn builtin_vector_ref(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let items = vector_of(&args[0])?;
    let items = items.borrow();
    let idx = index_of(&args[1], items.len())?;
    Ok(items[idx].clone())
}

/// Returns the mutated vector.
pub(crate) fn builtin_vector_set(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let items = vector_of(&args[0])?;
    {
        let mut items = items.borrow_mut();
        let idx = index_of(&args[1], items.len())?;
        items[idx] = args[2].clone();
    }
    Ok(args[0].clone())
}

// ============================================================================
// Tests
// ============================================================================

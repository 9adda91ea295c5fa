// quill-vm - Arithmetic and comparison primitives
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Arithmetic (`+ - * /`) and numeric comparison (`= != < <= > >=`).
//!
//! Promotion rule: int op int stays int; if either side is a float both
//! sides promote to float. Integer division by zero and integer overflow
//! are language errors.

use std::cmp::Ordering;

use quill_reader::QuillVal;

use crate::vm::{Result, RuntimeError, Vm};

#[derive(Clone, Copy)]
enum Num {
    Int(i32),
    Float(f32),
}

fn num(val: &QuillVal, who: &'static str) -> Result<Num> {
    match val {
        QuillVal::Int(n) => Ok(Num::Int(*n)),
        QuillVal::Float(x) => Ok(Num::Float(*x)),
        other => Err(RuntimeError::type_error(
            format!("number for '{}'", who),
            other.type_name(),
        )),
    }
}

fn value(n: Num) -> QuillVal {
    match n {
        Num::Int(i) => QuillVal::int(i),
        Num::Float(x) => QuillVal::float(x),
    }
}

fn binary(
    a: Num,
    b: Num,
    who: &'static str,
    int_op: impl Fn(i32, i32) -> Option<i32>,
    float_op: impl Fn(f32, f32) -> f32,
) -> Result<Num> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_op(x, y)
            .map(Num::Int)
            .ok_or(RuntimeError::IntegerOverflow(who)),
        (x, y) => Ok(Num::Float(float_op(as_float(x), as_float(y)))),
    }
}

fn as_float(n: Num) -> f32 {
    match n {
        Num::Int(i) => i as f32,
        Num::Float(x) => x,
    }
}

fn fold(
    args: &[QuillVal],
    who: &'static str,
    int_op: impl Fn(i32, i32) -> Option<i32> + Copy,
    float_op: impl Fn(f32, f32) -> f32 + Copy,
) -> Result<QuillVal> {
    let mut acc = num(&args[0], who)?;
    for arg in &args[1..] {
        acc = binary(acc, num(arg, who)?, who, int_op, float_op)?;
    }
    Ok(value(acc))
}

pub(crate) fn builtin_add(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    fold(args, "+", i32::checked_add, |a, b| a + b)
}

pub(crate) fn builtin_sub(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    fold(args, "-", i32::checked_sub, |a, b| a - b)
}

pub(crate) fn builtin_mul(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    fold(args, "*", i32::checked_mul, |a, b| a * b)
}

pub(crate) fn builtin_div(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let a = num(&args[0], "/")?;
    let b = num(&args[1], "/")?;
    if let (Num::Int(_), Num::Int(0)) = (a, b) {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(value(binary(a, b, "/", i32::checked_div, |x, y| x / y)?))
}

// ============================================================================
// Comparison
// ============================================================================

fn compare(args: &[QuillVal], who: &'static str) -> Result<Option<Ordering>> {
    let a = num(&args[0], who)?;
    let b = num(&args[1], who)?;
    Ok(match (a, b) {
        (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
        (x, y) => as_float(x).partial_cmp(&as_float(y)),
    })
}

pub(crate) fn builtin_num_eq(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(compare(args, "=")? == Some(Ordering::Equal)))
}

pub(crate) fn builtin_ne(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(compare(args, "!=")? != Some(Ordering::Equal)))
}

pub(crate) fn builtin_lt(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(compare(args, "<")? == Some(Ordering::Less)))
}

pub(crate) fn builtin_le(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(matches!(
        compare(args, "<=")?,
        Some(Ordering::Less | Ordering::Equal)
    )))
}

pub(crate) fn builtin_gt(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(compare(args, ">")? == Some(Ordering::Greater)))
}

pub(crate) fn builtin_ge(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::bool(matches!(
        compare(args, ">=")?,
        Some(Ordering::Greater | Ordering::Equal)
    )))
}

// ============================================================================
// Tests
// ============================================================================

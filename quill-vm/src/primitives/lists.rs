// quill-vm - List primitives
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! List construction and traversal: `cons list append length car cdr cadr
//! cddr caddr cdddr nth nth-tail nth-cons map`.

use quill_reader::QuillVal;

use crate::vm::{Result, RuntimeError, Vm};

fn take_car(val: &QuillVal) -> Result<QuillVal> {
    val.car()
        .ok_or_else(|| RuntimeError::type_error("cons", val.type_name()))
}

fn take_cdr(val: &QuillVal) -> Result<QuillVal> {
    val.cdr()
        .ok_or_else(|| RuntimeError::type_error("cons", val.type_name()))
}

fn proper_list(val: &QuillVal, who: &'static str) -> Result<Vec<QuillVal>> {
    val.elements().ok_or_else(|| {
        RuntimeError::type_error(format!("proper list for '{}'", who), val.type_name())
    })
}

fn index(val: &QuillVal) -> Result<usize> {
    match val {
        QuillVal::Int(n) if *n >= 0 => Ok(*n as usize),
        QuillVal::Int(n) => Err(RuntimeError::IndexOutOfBounds {
            index: i64::from(*n),
            length: 0,
        }),
        other => Err(RuntimeError::type_error("integer index", other.type_name())),
    }
}

pub(crate) fn builtin_cons(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::cons(args[0].clone(), args[1].clone()))
}

pub(crate) fn builtin_list(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    Ok(QuillVal::list(args.to_vec()))
}

/// All arguments but the last must be proper lists; the result shares the
/// last argument as its tail.
pub(crate) fn builtin_append(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let Some((last, front)) = args.split_last() else {
        return Ok(QuillVal::Nil);
    };
    let mut result = last.clone();
    for arg in front.iter().rev() {
        let items = proper_list(arg, "append")?;
        for item in items.into_iter().rev() {
            result = QuillVal::cons(item, result);
        }
    }
    Ok(result)
}

pub(crate) fn builtin_length(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let items = proper_list(&args[0], "length")?;
    Ok(QuillVal::int(items.len() as i32))
}

pub(crate) fn builtin_car(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    take_car(&args[0])
}

pub(crate) fn builtin_cdr(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    take_cdr(&args[0])
}

pub(crate) fn builtin_cadr(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    take_car(&take_cdr(&args[0])?)
}

pub(crate) fn builtin_cddr(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    take_cdr(&take_cdr(&args[0])?)
}

pub(crate) fn builtin_caddr(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    take_car(&take_cdr(&take_cdr(&args[0])?)?)
}

pub(crate) fn builtin_cdddr(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    take_cdr(&take_cdr(&take_cdr(&args[0])?)?)
}

/// `(nth lst n)` — the element at position `n`.
pub(crate) fn builtin_nth(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let n = index(&args[1])?;
    let mut cursor = args[0].clone();
    for _ in 0..n {
        cursor = cursor.cdr().ok_or(RuntimeError::IndexOutOfBounds {
            index: n as i64,
            length: args[0].list_len(),
        })?;
    }
    cursor.car().ok_or(RuntimeError::IndexOutOfBounds {
        index: n as i64,
        length: args[0].list_len(),
    })
}

/// `(nth-tail lst n)` — the chain after dropping `n` leading cells.
pub(crate) fn builtin_nth_tail(_vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let n = index(&args[1])?;
    let mut cursor = args[0].clone();
    for _ in 0..n {
        cursor = cursor.cdr().ok_or(RuntimeError::IndexOutOfBounds {
            index: n as i64,
            length: args[0].list_len(),
        })?;
    }
    Ok(cursor)
}

/// `(nth-cons lst n)` — the `n`th cons cell itself.
pub(crate) fn builtin_nth_cons(vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let tail = builtin_nth_tail(vm, args)?;
    if tail.as_cons().is_some() {
        Ok(tail)
    } else {
        Err(RuntimeError::IndexOutOfBounds {
            index: index(&args[1])? as i64,
            length: args[0].list_len(),
        })
    }
}

/// `(map f lst)` — apply `f` to each element, collecting the results.
pub(crate) fn builtin_map(vm: &Vm, args: &[QuillVal]) -> Result<QuillVal> {
    let f = &args[0];
    let items = proper_list(&args[1], "map")?;
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        results.push(vm.execute(f, &[item])?);
    }
    Ok(QuillVal::list(results))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::CodeStore;
    use quill_reader::PackageRegistry;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn vm() -> Vm {
        Vm::new(
            PackageRegistry::new(),
            Rc::new(RefCell::new(CodeStore::new())),
        )
    }

    fn ints(ns: &[i32]) -> QuillVal {
        QuillVal::list(ns.iter().map(|n| QuillVal::int(*n)).collect())
    }

    #[test]
    fn cons_and_list() {
        let vm = vm();
        assert_eq!(
            builtin_cons(&vm, &[QuillVal::int(1), QuillVal::int(2)])
                .unwrap()
                .to_string(),
            "(1 . 2)"
        );
        assert_eq!(builtin_list(&vm, &[]).unwrap(), QuillVal::Nil);
        assert_eq!(
            builtin_list(&vm, &[QuillVal::int(1), QuillVal::int(2)])
                .unwrap()
                .to_string(),
            "(1 2)"
        );
    }

    #[test]
    fn append_shares_the_final_tail() {
        let vm = vm();
        assert_eq!(builtin_append(&vm, &[]).unwrap(), QuillVal::Nil);
        let tail = ints(&[3, 4]);
        let result = builtin_append(&vm, &[ints(&[1, 2]), tail.clone()]).unwrap();
        assert_eq!(result.to_string(), "(1 2 3 4)");
        // The tail is the same cons chain, not a copy.
        assert_eq!(result.cdr().unwrap().cdr().unwrap(), tail);
        // A single argument passes through.
        let single = builtin_append(&vm, &[tail.clone()]).unwrap();
        assert_eq!(single, tail);
        // Non-list in a front position fails.
        assert!(builtin_append(&vm, &[QuillVal::int(1), ints(&[2])]).is_err());
    }

    #[test]
    fn accessors() {
        let vm = vm();
        let l = ints(&[1, 2, 3, 4]);
        assert_eq!(builtin_car(&vm, &[l.clone()]).unwrap(), QuillVal::int(1));
        assert_eq!(builtin_cadr(&vm, &[l.clone()]).unwrap(), QuillVal::int(2));
        assert_eq!(builtin_caddr(&vm, &[l.clone()]).unwrap(), QuillVal::int(3));
        assert_eq!(builtin_cddr(&vm, &[l.clone()]).unwrap().to_string(), "(3 4)");
        assert_eq!(builtin_cdddr(&vm, &[l.clone()]).unwrap().to_string(), "(4)");
        // car/cdr of nil are out-of-bounds accesses.
        assert!(builtin_car(&vm, &[QuillVal::Nil]).is_err());
        assert!(builtin_cdr(&vm, &[QuillVal::Nil]).is_err());
    }

    #[test]
    fn nth_family() {
        let vm = vm();
        let l = ints(&[10, 20, 30]);
        assert_eq!(
            builtin_nth(&vm, &[l.clone(), QuillVal::int(1)]).unwrap(),
            QuillVal::int(20)
        );
        assert!(builtin_nth(&vm, &[l.clone(), QuillVal::int(3)]).is_err());
        assert_eq!(
            builtin_nth_tail(&vm, &[l.clone(), QuillVal::int(2)])
                .unwrap()
                .to_string(),
            "(30)"
        );
        assert_eq!(
            builtin_nth_tail(&vm, &[l.clone(), QuillVal::int(3)]).unwrap(),
            QuillVal::Nil
        );
        assert!(builtin_nth_tail(&vm, &[l.clone(), QuillVal::int(4)]).is_err());
        assert_eq!(
            builtin_nth_cons(&vm, &[l.clone(), QuillVal::int(2)])
                .unwrap()
                .to_string(),
            "(30)"
        );
        assert!(builtin_nth_cons(&vm, &[l.clone(), QuillVal::int(3)]).is_err());
        assert!(builtin_nth(&vm, &[l, QuillVal::int(-1)]).is_err());
    }

    #[test]
    fn length_counts_proper_lists() {
        let vm = vm();
        assert_eq!(
            builtin_length(&vm, &[ints(&[1, 2, 3])]).unwrap(),
            QuillVal::int(3)
        );
        assert_eq!(builtin_length(&vm, &[QuillVal::Nil]).unwrap(), QuillVal::int(0));
        let dotted = QuillVal::cons(QuillVal::int(1), QuillVal::int(2));
        assert!(builtin_length(&vm, &[dotted]).is_err());
    }
}

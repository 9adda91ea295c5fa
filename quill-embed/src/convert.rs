// quill-embed - Type conversion traits
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Conversion between Rust and Quill values.
//!
//! # Built-in conversions
//!
//! | Rust type | Quill type |
//! |-----------|------------|
//! | `()` | nil |
//! | `bool` | bool |
//! | `i32` | int |
//! | `f32` | float |
//! | `String`, `&str` | string |
//! | `Vec<T>` | vector |
//! | `Option<T>` | `T` or nil |
//!
//! Implement the traits for your own types to pass them through
//! [`crate::Context::set`] and friends.

use quill_reader::QuillVal;

use crate::context::{Error, Result};

/// Convert a Rust value into a Quill value.
pub trait IntoQuillVal {
    fn into_quill_val(self) -> QuillVal;
}

/// Convert a Quill value into a Rust value.
pub trait FromQuillVal: Sized {
    fn from_quill_val(val: &QuillVal) -> Result<Self>;
}

fn conversion_error(expected: &'static str, got: &QuillVal) -> Error {
    Error::Conversion {
        expected,
        got: got.type_name().to_string(),
    }
}

// ============================================================================
// IntoQuillVal
// ============================================================================

impl IntoQuillVal for QuillVal {
    fn into_quill_val(self) -> QuillVal {
        self
    }
}

impl IntoQuillVal for () {
    fn into_quill_val(self) -> QuillVal {
        QuillVal::Nil
    }
}

impl IntoQuillVal for bool {
    fn into_quill_val(self) -> QuillVal {
        QuillVal::bool(self)
    }
}

impl IntoQuillVal for i32 {
    fn into_quill_val(self) -> QuillVal {
        QuillVal::int(self)
    }
}

impl IntoQuillVal for f32 {
    fn into_quill_val(self) -> QuillVal {
        QuillVal::float(self)
    }
}

impl IntoQuillVal for String {
    fn into_quill_val(self) -> QuillVal {
        QuillVal::string(self)
    }
}

impl IntoQuillVal for &str {
    fn into_quill_val(self) -> QuillVal {
        QuillVal::string(self)
    }
}

impl<T: IntoQuillVal> IntoQuillVal for Vec<T> {
    fn into_quill_val(self) -> QuillVal {
        QuillVal::vector(self.into_iter().map(IntoQuillVal::into_quill_val).collect())
    }
}

impl<T: IntoQuillVal> IntoQuillVal for Option<T> {
    fn into_quill_val(self) -> QuillVal {
        match self {
            Some(value) => value.into_quill_val(),
            None => QuillVal::Nil,
        }
    }
}

// ============================================================================
// FromQuillVal
// ============================================================================

impl FromQuillVal for QuillVal {
    fn from_quill_val(val: &QuillVal) -> Result<Self> {
        Ok(val.clone())
    }
}

impl FromQuillVal for bool {
    fn from_quill_val(val: &QuillVal) -> Result<Self> {
        match val {
            QuillVal::Bool(b) => Ok(*b),
            other => Err(conversion_error("bool", other)),
        }
    }
}

impl FromQuillVal for i32 {
    fn from_quill_val(val: &QuillVal) -> Result<Self> {
        match val {
            QuillVal::Int(n) => Ok(*n),
            other => Err(conversion_error("int", other)),
        }
    }
}

impl FromQuillVal for f32 {
    fn from_quill_val(val: &QuillVal) -> Result<Self> {
        match val {
            QuillVal::Float(x) => Ok(*x),
            QuillVal::Int(n) => Ok(*n as f32),
            other => Err(conversion_error("float", other)),
        }
    }
}

impl FromQuillVal for String {
    fn from_quill_val(val: &QuillVal) -> Result<Self> {
        match val {
            QuillVal::Str(s) => Ok(s.to_string()),
            other => Err(conversion_error("string", other)),
        }
    }
}

impl<T: FromQuillVal> FromQuillVal for Vec<T> {
    fn from_quill_val(val: &QuillVal) -> Result<Self> {
        match val {
            QuillVal::Vector(items) => items
                .borrow()
                .iter()
                .map(T::from_quill_val)
                .collect(),
            other => match other.elements() {
                Some(items) => items.iter().map(T::from_quill_val).collect(),
                None => Err(conversion_error("vector or list", other)),
            },
        }
    }
}

impl<T: FromQuillVal> FromQuillVal for Option<T> {
    fn from_quill_val(val: &QuillVal) -> Result<Self> {
        match val {
            QuillVal::Nil => Ok(None),
            other => T::from_quill_val(other).map(Some),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

// quill-embed - Embedding API for the Quill programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # quill-embed
//!
//! High-level embedding surface for Quill: construct a [`Context`], feed
//! it source text, and get per-form results back.
//!
//! ```rust
//! use quill_embed::Context;
//!
//! let mut context = Context::new().unwrap();
//! let value = context.eval("(let ((a 2) (b 3)) (* a b))").unwrap();
//! assert_eq!(value.to_string(), "6");
//! ```

pub mod context;
pub mod convert;

pub use context::{Context, Error, FormResult, Result};
pub use convert::{FromQuillVal, IntoQuillVal};
pub use quill_reader::{CodeHandle, NativeObject, PackageRegistry, QuillVal, Symbol};
pub use quill_vm::{ArityKind, Primitive, Vm};

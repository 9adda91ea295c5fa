// quill-reader - Reader and data model for the Quill programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # quill-reader
//!
//! Reading layer for the Quill programming language: the tagged value
//! type, per-package symbol interning, the package registry, the buffered
//! input stream, and the s-expression reader (with quote and quasiquote
//! rewriting). Produces `QuillVal` forms from source text; compilation and
//! execution live in `quill-vm`.

pub mod package;
pub mod reader;
pub mod stream;
pub mod symbol;
pub mod value;

pub use package::{
    MacroDef, Package, PackageError, PackageRegistry, CORE_PACKAGE, GLOBAL_PACKAGE,
    KEYWORD_PACKAGE,
};
pub use reader::{Form, ReadError, ReadErrorKind, Reader, RESERVED_WORDS};
pub use stream::{InputStream, EOF_CHAR};
pub use symbol::Symbol;
pub use value::{Closure, CodeHandle, ConsCell, NativeObject, QuillVal, ReturnAddress};

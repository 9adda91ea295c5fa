// quill-vm - Bytecode compiler and virtual machine for the Quill programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # quill-vm
//!
//! Execution layer for the Quill programming language: lexical
//! environments, the instruction set, the handle-addressed code store, the
//! bytecode compiler (with macro expansion and tail-call elimination), the
//! stack VM, and the built-in primitives.
//!
//! The embedding surface that ties this to source text lives in
//! `quill-embed`.

pub mod code;
pub mod compiler;
pub mod env;
pub mod instruction;
pub mod primitives;
pub mod vm;

pub use code::{CodeBlock, CodeStore};
pub use compiler::{CompileError, CompiledForm, Compiler};
pub use env::{param_symbols, Env, VarPos};
pub use instruction::{Instruction, Op};
pub use primitives::{install, register_defaults, ArityKind, Primitive, PrimitiveTable};
pub use vm::{closure_env, RuntimeError, ValueStack, Vm};

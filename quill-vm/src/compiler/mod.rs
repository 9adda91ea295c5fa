// quill-vm - Bytecode compiler for the Quill programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The bytecode compiler: parsed forms in, assembled code blocks out.
//!
//! Every recursive compile carries a flow state saying whether the value
//! is consumed and whether it sits in tail position. Tail calls compile to
//! a bare `JMP_CLOSURE` with no saved return address, which is what makes
//! deep tail recursion run in constant stack depth.
//!
//! Macros expand before application dispatch by executing their bodies on
//! the VM (the VM is reentrant, so this happens mid-compilation), and
//! `defmacro` installs into the name's package immediately.

pub mod assemble;
pub mod expand;

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use quill_reader::{
    Closure, CodeHandle, MacroDef, PackageRegistry, QuillVal, Symbol,
};

use crate::code::CodeStore;
use crate::env::{param_symbols, Env};
use crate::instruction::{Instruction, Op};
use crate::vm::{RuntimeError, Vm};

/// Error aborting the compilation of one top-level form. Previously
/// compiled and executed forms remain in effect.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("'{form}' does not take {got} arguments")]
    SpecialFormArity { form: &'static str, got: usize },
    #[error("set! target must be a symbol, got {0}")]
    SetTargetNotSymbol(String),
    #[error("defmacro name must be a symbol, got {0}")]
    MacroNameNotSymbol(String),
    #[error("'{0}' names a macro and cannot be redefined with set!")]
    MacroRedefinition(String),
    #[error("invalid parameter list {0}")]
    InvalidParameterList(String),
    #[error("expected a proper list, got {0}")]
    ImproperForm(String),
    #[error("unresolved jump label '{0}'")]
    UnresolvedLabel(String),
    #[error("macro expansion of '{name}' failed: {source}")]
    MacroExpansion {
        name: String,
        #[source]
        source: RuntimeError,
    },
    #[error("internal compiler error: {0}")]
    Internal(String),
}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

/// What a top-level compile produced: the executable closure and the code
/// blocks newly registered for it (innermost first, the top block last).
#[derive(Debug, Clone)]
pub struct CompiledForm {
    pub closure: QuillVal,
    pub new_blocks: Vec<CodeHandle>,
}

/// Where a compiled value flows: consumed or discarded, tail or not.
/// `used == false && tail == true` cannot occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Flow {
    used: bool,
    tail: bool,
}

impl Flow {
    /// The value is the enclosing function's return value.
    const TAIL: Flow = Flow {
        used: true,
        tail: true,
    };
    /// The value is consumed by an enclosing expression.
    const USED: Flow = Flow {
        used: true,
        tail: false,
    };
    /// The value is discarded (middle of a `begin`).
    const DISCARD: Flow = Flow {
        used: false,
        tail: false,
    };
}

/// The Quill bytecode compiler.
pub struct Compiler {
    registry: PackageRegistry,
    store: Rc<RefCell<CodeStore>>,
    label_counter: u32,
    new_blocks: Vec<CodeHandle>,
}

impl Compiler {
    /// Create a compiler emitting into `store` and resolving names
    /// against `registry`.
    #[must_use]
    pub fn new(registry: PackageRegistry, store: Rc<RefCell<CodeStore>>) -> Self {
        Compiler {
            registry,
            store,
            label_counter: 0,
            new_blocks: Vec::new(),
        }
    }

    /// The registry this compiler resolves against.
    #[must_use]
    pub fn registry(&self) -> &PackageRegistry {
        &self.registry
    }

    /// Compile one top-level form into a zero-argument closure over the
    /// empty environment.
    pub fn compile_top(&mut self, vm: &Vm, form: &QuillVal) -> Result<CompiledForm> {
        self.new_blocks.clear();
        let mut out = Vec::new();
        self.compile_form(vm, form, &Env::empty(), Flow::TAIL, &mut out)?;
        let code = assemble::assemble(out)?;
        let handle = self.add_block(code, describe(form));
        let closure = QuillVal::closure(Closure {
            code: handle,
            env: Env::empty().erase(),
            params: QuillVal::nil(),
            name: None,
        });
        Ok(CompiledForm {
            closure,
            new_blocks: std::mem::take(&mut self.new_blocks),
        })
    }

    fn add_block(&mut self, code: Vec<Instruction>, debug: String) -> CodeHandle {
        let handle = self.store.borrow_mut().insert(code, debug);
        log::debug!("compiled block {}", handle);
        self.new_blocks.push(handle);
        handle
    }

    fn fresh_label(&mut self) -> String {
        self.label_counter += 1;
        format!("L{}", self.label_counter)
    }

    // ========================================================================
    // Form dispatch
    // ========================================================================

    fn compile_form(
        &mut self,
        vm: &Vm,
        form: &QuillVal,
        env: &Env,
        flow: Flow,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        match form {
            QuillVal::Cons(_) => self.compile_list(vm, form, env, flow, out),
            QuillVal::Symbol(sym) => {
                if !flow.used {
                    return Ok(());
                }
                self.compile_symbol(sym, env, out);
                finish(out, flow);
                Ok(())
            }
            constant => {
                if !flow.used {
                    return Ok(());
                }
                out.push(Instruction::with_first(Op::PushConst, constant.clone()));
                finish(out, flow);
                Ok(())
            }
        }
    }

    fn compile_symbol(&self, sym: &Symbol, env: &Env, out: &mut Vec<Instruction>) {
        // Keyword symbols evaluate to themselves.
        if sym.is_keyword() {
            out.push(Instruction::with_first(
                Op::PushConst,
                QuillVal::symbol(sym.clone()),
            ));
            return;
        }
        match env.lookup(sym) {
            Some(pos) => out.push(Instruction::with_operands(
                Op::LocalGet,
                QuillVal::int(pos.depth as i32),
                QuillVal::int(pos.slot as i32),
            )),
            // Globals are late-bound: no compile-time lookup.
            None => out.push(Instruction::with_first(
                Op::GlobalGet,
                QuillVal::symbol(sym.clone()),
            )),
        }
    }

    fn compile_list(
        &mut self,
        vm: &Vm,
        form: &QuillVal,
        env: &Env,
        flow: Flow,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        let cell = form.as_cons().cloned().ok_or_else(|| {
            CompileError::Internal("compile_list on a non-cons form".into())
        })?;
        if let Some(sym) = cell.first.as_symbol() {
            if sym.is_global() {
                match sym.name() {
                    "quote" => return self.compile_quote(&cell.rest, flow, out),
                    "begin" => {
                        let forms = proper(&cell.rest)?;
                        return self.compile_begin(vm, &forms, env, flow, out);
                    }
                    "set!" => return self.compile_set(vm, &cell.rest, env, flow, out),
                    "if" => return self.compile_if(vm, &cell.rest, env, flow, out),
                    "if*" => return self.compile_if_star(vm, &cell.rest, env, flow, out),
                    "while" => return self.compile_while(vm, &cell.rest, env, flow, out),
                    "lambda" => return self.compile_lambda_form(vm, &cell.rest, env, flow, out),
                    "defmacro" => return self.compile_defmacro(vm, &cell.rest, env, flow, out),
                    _ => {}
                }
            }
        }
        self.compile_application(vm, form, env, flow, out)
    }

    // ========================================================================
    // Special forms
    // ========================================================================

    fn compile_quote(
        &mut self,
        rest: &QuillVal,
        flow: Flow,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        let args = proper(rest)?;
        if args.len() != 1 {
            return Err(CompileError::SpecialFormArity {
                form: "quote",
                got: args.len(),
            });
        }
        if flow.used {
            out.push(Instruction::with_first(Op::PushConst, args[0].clone()));
            finish(out, flow);
        }
        Ok(())
    }

    fn compile_begin(
        &mut self,
        vm: &Vm,
        forms: &[QuillVal],
        env: &Env,
        flow: Flow,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        let Some((last, front)) = forms.split_last() else {
            if flow.used {
                out.push(Instruction::with_first(Op::PushConst, QuillVal::Nil));
                finish(out, flow);
            }
            return Ok(());
        };
        for form in front {
            self.compile_form(vm, form, env, Flow::DISCARD, out)?;
        }
        self.compile_form(vm, last, env, flow, out)
    }

    fn compile_set(
        &mut self,
        vm: &Vm,
        rest: &QuillVal,
        env: &Env,
        flow: Flow,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        let args = proper(rest)?;
        if args.len() != 2 {
            return Err(CompileError::SpecialFormArity {
                form: "set!",
                got: args.len(),
            });
        }
        let sym = args[0]
            .as_symbol()
            .ok_or_else(|| CompileError::SetTargetNotSymbol(args[0].to_string()))?;
        if sym
            .package()
            .is_some_and(|pkg| pkg.macro_of(sym).is_some())
        {
            return Err(CompileError::MacroRedefinition(sym.to_string()));
        }
        self.compile_form(vm, &args[1], env, Flow::USED, out)?;
        match env.lookup(sym) {
            Some(pos) => out.push(Instruction::with_operands(
                Op::LocalSet,
                QuillVal::int(pos.depth as i32),
                QuillVal::int(pos.slot as i32),
            )),
            None => out.push(Instruction::with_first(
                Op::GlobalSet,
                QuillVal::symbol(sym.clone()),
            )),
        }
        finish(out, flow);
        Ok(())
    }

    fn compile_if(
        &mut self,
        vm: &Vm,
        rest: &QuillVal,
        env: &Env,
        flow: Flow,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        let args = proper(rest)?;
        if args.len() != 2 && args.len() != 3 {
            return Err(CompileError::SpecialFormArity {
                form: "if",
                got: args.len(),
            });
        }
        let pred = &args[0];
        let then_branch = &args[1];
        let else_branch = args.get(2);

        // A literal predicate picks its branch at compile time.
        if matches!(
            pred,
            QuillVal::Bool(_) | QuillVal::Int(_) | QuillVal::Float(_) | QuillVal::Str(_)
        ) {
            return if pred.is_truthy() {
                self.compile_form(vm, then_branch, env, flow, out)
            } else {
                match else_branch {
                    Some(branch) => self.compile_form(vm, branch, env, flow, out),
                    None => self.compile_form(vm, &QuillVal::Nil, env, flow, out),
                }
            };
        }

        // (if p x x) is (begin p x).
        if let Some(branch) = else_branch {
            if then_branch.deep_eq(branch) {
                self.compile_form(vm, pred, env, Flow::DISCARD, out)?;
                return self.compile_form(vm, then_branch, env, flow, out);
            }
        }

        self.compile_form(vm, pred, env, Flow::USED, out)?;
        let else_label = self.fresh_label();
        out.push(Instruction::with_first(
            Op::JumpIfFalse,
            QuillVal::string(else_label.as_str()),
        ));
        self.compile_form(vm, then_branch, env, flow, out)?;
        // In tail position both arms return; otherwise jump over the else.
        let end_label = if flow.tail {
            None
        } else {
            let label = self.fresh_label();
            out.push(Instruction::with_first(
                Op::Jump,
                QuillVal::string(label.as_str()),
            ));
            Some(label)
        };
        out.push(Instruction::label(&else_label));
        match else_branch {
            Some(branch) => self.compile_form(vm, branch, env, flow, out)?,
            None => self.compile_form(vm, &QuillVal::Nil, env, flow, out)?,
        }
        if let Some(label) = end_label {
            out.push(Instruction::label(&label));
        }
        Ok(())
    }

    fn compile_if_star(
        &mut self,
        vm: &Vm,
        rest: &QuillVal,
        env: &Env,
        flow: Flow,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        let args = proper(rest)?;
        if args.len() != 2 {
            return Err(CompileError::SpecialFormArity {
                form: "if*",
                got: args.len(),
            });
        }
        self.compile_form(vm, &args[0], env, Flow::USED, out)?;
        out.push(Instruction::new(Op::Duplicate));
        let end_label = self.fresh_label();
        out.push(Instruction::with_first(
            Op::JumpIfTrue,
            QuillVal::string(end_label.as_str()),
        ));
        out.push(Instruction::new(Op::StackPop));
        self.compile_form(vm, &args[1], env, Flow::USED, out)?;
        out.push(Instruction::label(&end_label));
        finish(out, flow);
        Ok(())
    }

    fn compile_while(
        &mut self,
        vm: &Vm,
        rest: &QuillVal,
        env: &Env,
        flow: Flow,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        let args = proper(rest)?;
        let Some((pred, body)) = args.split_first() else {
            return Err(CompileError::SpecialFormArity {
                form: "while",
                got: 0,
            });
        };
        out.push(Instruction::with_first(Op::PushConst, QuillVal::Nil));
        let top_label = self.fresh_label();
        let done_label = self.fresh_label();
        out.push(Instruction::label(&top_label));
        self.compile_form(vm, pred, env, Flow::USED, out)?;
        out.push(Instruction::with_first(
            Op::JumpIfFalse,
            QuillVal::string(done_label.as_str()),
        ));
        // Drop the previous iteration's value; keep this one's.
        out.push(Instruction::new(Op::StackPop));
        self.compile_begin(vm, body, env, Flow::USED, out)?;
        out.push(Instruction::with_first(
            Op::Jump,
            QuillVal::string(top_label.as_str()),
        ));
        out.push(Instruction::label(&done_label));
        finish(out, flow);
        Ok(())
    }

    fn compile_lambda_form(
        &mut self,
        vm: &Vm,
        rest: &QuillVal,
        env: &Env,
        flow: Flow,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        let args = proper(rest)?;
        let Some((params, body)) = args.split_first() else {
            return Err(CompileError::SpecialFormArity {
                form: "lambda",
                got: 0,
            });
        };
        let template = self.compile_lambda(vm, params, body, env, None)?;
        out.push(Instruction::with_first(
            Op::MakeClosure,
            QuillVal::closure(template),
        ));
        finish(out, flow);
        Ok(())
    }

    /// Compile a lambda into its own code block and return the template
    /// closure (over the empty environment; `MAKE_CLOSURE` re-binds it to
    /// the environment current at runtime).
    fn compile_lambda(
        &mut self,
        vm: &Vm,
        params: &QuillVal,
        body: &[QuillVal],
        env: &Env,
        name: Option<Rc<str>>,
    ) -> Result<Closure> {
        let (symbols, variadic) = param_symbols(params)
            .ok_or_else(|| CompileError::InvalidParameterList(params.to_string()))?;
        let count = symbols.len() as i32;
        let inner_env = env.extend(symbols, Vec::new());
        let mut out = Vec::new();
        out.push(Instruction::with_first(
            if variadic { Op::MakeEnvDot } else { Op::MakeEnv },
            QuillVal::int(count),
        ));
        self.compile_begin(vm, body, &inner_env, Flow::TAIL, &mut out)?;
        let code = assemble::assemble(out)?;
        let debug = match &name {
            Some(n) => format!("lambda {} {}", n, params),
            None => format!("lambda {}", params),
        };
        let handle = self.add_block(code, debug);
        Ok(Closure {
            code: handle,
            env: Env::empty().erase(),
            params: params.clone(),
            name,
        })
    }

    fn compile_defmacro(
        &mut self,
        vm: &Vm,
        rest: &QuillVal,
        env: &Env,
        flow: Flow,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        let args = proper(rest)?;
        if args.len() < 2 {
            return Err(CompileError::SpecialFormArity {
                form: "defmacro",
                got: args.len(),
            });
        }
        let sym = args[0]
            .as_symbol()
            .ok_or_else(|| CompileError::MacroNameNotSymbol(args[0].to_string()))?;
        let params = &args[1];
        let body = &args[2..];
        let template =
            self.compile_lambda(vm, params, body, env, Some(Rc::from(sym.name())))?;
        let body_closure = QuillVal::closure(template);

        let package = sym.package().ok_or_else(|| {
            CompileError::Internal(format!("package of '{}' dropped", sym))
        })?;
        package
            .define_macro(
                sym,
                MacroDef {
                    name: sym.clone(),
                    params: params.clone(),
                    body: body_closure.clone(),
                },
            )
            .map_err(|err| CompileError::Internal(err.to_string()))?;

        if flow.used {
            out.push(Instruction::with_first(Op::PushConst, body_closure));
            finish(out, flow);
        }
        Ok(())
    }

    // ========================================================================
    // Applications
    // ========================================================================

    fn compile_application(
        &mut self,
        vm: &Vm,
        form: &QuillVal,
        env: &Env,
        flow: Flow,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        // Macro-expand first; re-dispatch on the replacement.
        if let Some(expanded) =
            expand::macroexpand_1(vm, form).map_err(|err| CompileError::MacroExpansion {
                name: head_name(form),
                source: err,
            })?
        {
            return self.compile_form(vm, &expanded, env, flow, out);
        }

        let cell = form.as_cons().cloned().ok_or_else(|| {
            CompileError::Internal("application on a non-cons form".into())
        })?;
        let args = cell
            .rest
            .elements()
            .ok_or_else(|| CompileError::ImproperForm(form.to_string()))?;

        // ((lambda () body…)) compiles the body in place.
        if args.is_empty() {
            if let Some(body) = inline_thunk_body(&cell.first) {
                return self.compile_begin(vm, &body, env, flow, out);
            }
        }

        let argc = QuillVal::int(args.len() as i32);
        if flow.tail {
            for arg in &args {
                self.compile_form(vm, arg, env, Flow::USED, out)?;
            }
            self.compile_form(vm, &cell.first, env, Flow::USED, out)?;
            out.push(Instruction::with_first(Op::JumpClosure, argc));
        } else {
            let return_label = self.fresh_label();
            out.push(Instruction::with_first(
                Op::SaveReturn,
                QuillVal::string(return_label.as_str()),
            ));
            for arg in &args {
                self.compile_form(vm, arg, env, Flow::USED, out)?;
            }
            self.compile_form(vm, &cell.first, env, Flow::USED, out)?;
            out.push(Instruction::with_first(Op::JumpClosure, argc));
            out.push(Instruction::label(&return_label));
            if !flow.used {
                out.push(Instruction::new(Op::StackPop));
            }
        }
        Ok(())
    }
}

/// Emit the value's epilogue: return it in tail position, drop it when
/// discarded, leave it otherwise.
fn finish(out: &mut Vec<Instruction>, flow: Flow) {
    if flow.tail {
        out.push(Instruction::new(Op::ReturnVal));
    } else if !flow.used {
        out.push(Instruction::new(Op::StackPop));
    }
}

fn proper(rest: &QuillVal) -> Result<Vec<QuillVal>> {
    rest.elements()
        .ok_or_else(|| CompileError::ImproperForm(rest.to_string()))
}

/// The body of `(lambda () …)` when `head` is exactly that, for the
/// immediate-application shortcut.
fn inline_thunk_body(head: &QuillVal) -> Option<Vec<QuillVal>> {
    let cell = head.as_cons()?;
    let sym = cell.first.as_symbol()?;
    if !sym.is_global() || sym.name() != "lambda" {
        return None;
    }
    let parts = cell.rest.elements()?;
    let (params, body) = parts.split_first()?;
    if params.is_nil() {
        Some(body.to_vec())
    } else {
        None
    }
}

fn head_name(form: &QuillVal) -> String {
    form.car()
        .map(|head| head.to_string())
        .unwrap_or_else(|| form.to_string())
}

fn describe(form: &QuillVal) -> String {
    let text = form.to_string();
    if text.chars().count() > 60 {
        let prefix: String = text.chars().take(60).collect();
        format!("{}…", prefix)
    } else {
        text
    }
}

// quill-vm - Stack-based virtual machine for the Quill programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The Quill virtual machine: a single-threaded stack machine executing
//! assembled code blocks.
//!
//! `execute` is reentrant: each call runs on its own value stack and
//! registers, so primitives (`map`, the macro expander) may call back into
//! the VM mid-dispatch. Proper tail calls go through `JMP_CLOSURE` without
//! a saved return address and therefore run in constant stack depth.

pub mod error;
pub mod stack;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use quill_reader::{Closure, PackageRegistry, QuillVal, ReturnAddress, Symbol};

use crate::code::{CodeBlock, CodeStore};
use crate::env::{param_symbols, Env, VarPos};
use crate::instruction::{Instruction, Op};
use crate::primitives::PrimitiveTable;

pub use error::{Result, RuntimeError};
pub use stack::ValueStack;

/// The virtual machine: shared handles to the registry, code store, and
/// primitive table, plus per-machine switches. Per-call execution state
/// lives on the Rust stack so nested `execute` calls are independent.
pub struct Vm {
    registry: PackageRegistry,
    store: Rc<RefCell<CodeStore>>,
    primitives: Rc<RefCell<PrimitiveTable>>,
    trace: Cell<bool>,
    gensym_counter: Cell<u32>,
    high_water: Cell<usize>,
}

/// Registers of one `execute` call.
struct Run {
    closure: Rc<Closure>,
    block: Rc<CodeBlock>,
    pc: usize,
    env: Env,
    stack: ValueStack,
    argcount: usize,
}

impl Vm {
    /// Create a VM over the given registry and code store, with an empty
    /// primitive table.
    #[must_use]
    pub fn new(registry: PackageRegistry, store: Rc<RefCell<CodeStore>>) -> Self {
        Vm {
            registry,
            store,
            primitives: Rc::new(RefCell::new(PrimitiveTable::default())),
            trace: Cell::new(false),
            gensym_counter: Cell::new(0),
            high_water: Cell::new(0),
        }
    }

    /// The package registry this VM resolves globals against.
    #[must_use]
    pub fn registry(&self) -> &PackageRegistry {
        &self.registry
    }

    /// The code store executed blocks live in.
    #[must_use]
    pub fn store(&self) -> &Rc<RefCell<CodeStore>> {
        &self.store
    }

    /// The primitive dispatch table.
    #[must_use]
    pub fn primitives(&self) -> &Rc<RefCell<PrimitiveTable>> {
        &self.primitives
    }

    /// Toggle per-instruction tracing (emitted at `log::trace!`).
    /// Returns the previous setting.
    pub fn set_trace(&self, enabled: bool) -> bool {
        self.trace.replace(enabled)
    }

    /// Whether per-instruction tracing is on.
    #[must_use]
    pub fn trace_enabled(&self) -> bool {
        self.trace.get()
    }

    /// Next value of the gensym counter.
    pub fn gensym_next(&self) -> u32 {
        let next = self.gensym_counter.get().wrapping_add(1);
        self.gensym_counter.set(next);
        next
    }

    /// Peak value-stack depth of the most recently completed top-level
    /// `execute` call. Constant-bounded for tail-recursive programs.
    #[must_use]
    pub fn stack_high_water(&self) -> usize {
        self.high_water.get()
    }

    /// Execute `callable` (which must be a closure) on `args`, pushed
    /// left to right.
    pub fn execute(&self, callable: &QuillVal, args: &[QuillVal]) -> Result<QuillVal> {
        let closure = callable
            .as_closure()
            .cloned()
            .ok_or_else(|| RuntimeError::NotCallable(callable.type_name().to_string()))?;
        let block = self.block_of(&closure)?;
        let env = closure_env(&closure)?;
        let mut run = Run {
            closure,
            block,
            pc: 0,
            env,
            stack: ValueStack::new(),
            argcount: args.len(),
        };
        for arg in args {
            run.stack.push(arg.clone());
        }
        let result = self.dispatch(&mut run);
        self.high_water.set(run.stack.high_water());
        result
    }

    fn block_of(&self, closure: &Closure) -> Result<Rc<CodeBlock>> {
        self.store
            .borrow()
            .get(closure.code)
            .ok_or(RuntimeError::InvalidHandle(closure.code))
    }

    fn dispatch(&self, run: &mut Run) -> Result<QuillVal> {
        loop {
            if run.pc >= run.block.code.len() {
                return Err(RuntimeError::RunawayProgram {
                    handle: run.block.handle,
                    pc: run.pc,
                });
            }
            let instr = run.block.code[run.pc].clone();
            if self.trace.get() {
                log::trace!("{} {:>4}  {}", run.block.handle, run.pc, instr);
            }
            run.pc += 1;

            match instr.op {
                Op::Label => {}

                Op::PushConst => run.stack.push(instr.first.clone()),

                Op::LocalGet => {
                    let pos = var_pos(&instr)?;
                    let value = run.env.get(pos).ok_or(RuntimeError::InvalidVarPos {
                        depth: pos.depth,
                        slot: pos.slot,
                    })?;
                    run.stack.push(value);
                }

                Op::LocalSet => {
                    let pos = var_pos(&instr)?;
                    let value = run.stack.peek()?;
                    if !run.env.set(pos, value) {
                        return Err(RuntimeError::InvalidVarPos {
                            depth: pos.depth,
                            slot: pos.slot,
                        });
                    }
                }

                Op::GlobalGet => {
                    let sym = sym_operand(&instr)?;
                    let value = sym
                        .package()
                        .and_then(|pkg| pkg.get(sym))
                        .unwrap_or(QuillVal::Nil);
                    run.stack.push(value);
                }

                Op::GlobalSet => {
                    let sym = sym_operand(&instr)?;
                    let value = run.stack.peek()?;
                    let package = sym.package().ok_or_else(|| {
                        RuntimeError::Internal(format!("package of '{}' dropped", sym))
                    })?;
                    package.set(sym, value)?;
                }

                Op::StackPop => {
                    run.stack.pop()?;
                }

                Op::Duplicate => {
                    let value = run.stack.peek()?;
                    run.stack.push(value);
                }

                Op::JumpIfTrue => {
                    if run.stack.pop()?.is_truthy() {
                        run.pc = jump_target(&instr)?;
                    }
                }

                Op::JumpIfFalse => {
                    if !run.stack.pop()?.is_truthy() {
                        run.pc = jump_target(&instr)?;
                    }
                }

                Op::Jump => run.pc = jump_target(&instr)?,

                Op::SaveReturn => {
                    let target = jump_target(&instr)?;
                    let label: Rc<str> = Rc::from(instr.label_name().unwrap_or("?"));
                    run.stack.push(QuillVal::ReturnAddress(Rc::new(ReturnAddress {
                        closure: QuillVal::Closure(run.closure.clone()),
                        pc: target,
                        env: run.env.erase(),
                        label,
                    })));
                }

                Op::JumpClosure => {
                    let argc = count_operand(&instr)?;
                    let callee = run.stack.pop()?;
                    let callee = callee.as_closure().cloned().ok_or_else(|| {
                        RuntimeError::NotCallable(callee.type_name().to_string())
                    })?;
                    // Release the caller's frame before installing the
                    // callee's captured chain.
                    run.env = run.env.pop();
                    run.block = self.block_of(&callee)?;
                    run.env = closure_env(&callee)?;
                    run.closure = callee;
                    run.pc = 0;
                    run.argcount = argc;
                }

                Op::ReturnVal => {
                    if run.stack.len() > 1 {
                        let value = run.stack.pop()?;
                        let addr = run.stack.pop()?;
                        let QuillVal::ReturnAddress(addr) = addr else {
                            return Err(RuntimeError::type_error(
                                "return address",
                                addr.type_name(),
                            ));
                        };
                        let closure = addr.closure.as_closure().cloned().ok_or_else(|| {
                            RuntimeError::Internal("return address without a closure".into())
                        })?;
                        run.block = self.block_of(&closure)?;
                        run.closure = closure;
                        run.pc = addr.pc;
                        run.env = Env::from_erased(&addr.env).ok_or_else(|| {
                            RuntimeError::Internal(
                                "return address carries a foreign environment".into(),
                            )
                        })?;
                        run.stack.push(value);
                    } else {
                        return run.stack.pop();
                    }
                }

                Op::MakeEnv => {
                    let n = count_operand(&instr)?;
                    if run.argcount != n {
                        return Err(RuntimeError::WrongArity {
                            expected: n.to_string(),
                            got: run.argcount,
                        });
                    }
                    let symbols = frame_symbols(&run.closure)?;
                    let mut values = vec![QuillVal::Nil; n];
                    for slot in (0..n).rev() {
                        values[slot] = run.stack.pop()?;
                    }
                    run.env = run.env.extend(symbols, values);
                }

                Op::MakeEnvDot => {
                    let n = count_operand(&instr)?;
                    if n == 0 {
                        return Err(RuntimeError::Internal("MAKE_ENVDOT of size 0".into()));
                    }
                    if run.argcount + 1 < n {
                        return Err(RuntimeError::WrongArity {
                            expected: format!("at least {}", n - 1),
                            got: run.argcount,
                        });
                    }
                    let symbols = frame_symbols(&run.closure)?;
                    let surplus = run.argcount - (n - 1);
                    let mut rest = QuillVal::Nil;
                    for _ in 0..surplus {
                        rest = QuillVal::cons(run.stack.pop()?, rest);
                    }
                    let mut values = vec![QuillVal::Nil; n];
                    values[n - 1] = rest;
                    for slot in (0..n - 1).rev() {
                        values[slot] = run.stack.pop()?;
                    }
                    run.env = run.env.extend(symbols, values);
                }

                Op::MakeClosure => {
                    let template = instr.first.as_closure().cloned().ok_or_else(|| {
                        RuntimeError::Internal("MAKE_CLOSURE operand is not a closure".into())
                    })?;
                    run.stack.push(QuillVal::closure(Closure {
                        code: template.code,
                        env: run.env.erase(),
                        params: template.params.clone(),
                        name: template.name.clone(),
                    }));
                }

                Op::CallPrimop => {
                    let name = match &instr.first {
                        QuillVal::Str(s) => s.clone(),
                        _ => {
                            return Err(RuntimeError::Internal(
                                "CALL_PRIMOP operand is not a string".into(),
                            ))
                        }
                    };
                    let argc = run.argcount;
                    let mut args = vec![QuillVal::Nil; argc];
                    for slot in (0..argc).rev() {
                        args[slot] = run.stack.pop()?;
                    }
                    let primitive = self
                        .primitives
                        .borrow()
                        .lookup(&name, argc)
                        .ok_or_else(|| RuntimeError::PrimitiveNotFound {
                            name: name.to_string(),
                            argc,
                        })?;
                    let result = primitive.call(self, &args)?;
                    run.stack.push(result);
                }
            }
        }
    }
}

/// Recover the environment a closure captured.
pub fn closure_env(closure: &Closure) -> Result<Env> {
    Env::from_erased(&closure.env)
        .ok_or_else(|| RuntimeError::Internal("closure carries a foreign environment".into()))
}

fn frame_symbols(closure: &Closure) -> Result<Vec<Symbol>> {
    param_symbols(&closure.params)
        .map(|(symbols, _)| symbols)
        .ok_or_else(|| RuntimeError::Internal("closure has a malformed parameter list".into()))
}

fn var_pos(instr: &Instruction) -> Result<VarPos> {
    match (&instr.first, &instr.second) {
        (QuillVal::Int(depth), QuillVal::Int(slot)) if *depth >= 0 && *slot >= 0 => Ok(VarPos {
            depth: *depth as usize,
            slot: *slot as usize,
        }),
        _ => Err(RuntimeError::Internal(format!(
            "{} has malformed coordinates",
            instr.op.name()
        ))),
    }
}

fn sym_operand(instr: &Instruction) -> Result<&Symbol> {
    instr.first.as_symbol().ok_or_else(|| {
        RuntimeError::Internal(format!("{} operand is not a symbol", instr.op.name()))
    })
}

fn count_operand(instr: &Instruction) -> Result<usize> {
    match &instr.first {
        QuillVal::Int(n) if *n >= 0 => Ok(*n as usize),
        _ => Err(RuntimeError::Internal(format!(
            "{} operand is not a count",
            instr.op.name()
        ))),
    }
}

fn jump_target(instr: &Instruction) -> Result<usize> {
    instr.target_pc().ok_or_else(|| {
        RuntimeError::Internal(format!(
            "{} executed with an unresolved label",
            instr.op.name()
        ))
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> Vm {
        Vm::new(
            PackageRegistry::new(),
            Rc::new(RefCell::new(CodeStore::new())),
        )
    }

    fn make_closure(vm: &Vm, code: Vec<Instruction>, params: QuillVal) -> QuillVal {
        let handle = vm.store().borrow_mut().insert(code, "test block");
        QuillVal::closure(Closure {
            code: handle,
            env: Env::empty().erase(),
            params,
            name: None,
        })
    }

    #[test]
    fn push_const_and_return() {
        let vm = machine();
        let closure = make_closure(
            &vm,
            vec![
                Instruction::with_first(Op::PushConst, QuillVal::int(42)),
                Instruction::new(Op::ReturnVal),
            ],
            QuillVal::nil(),
        );
        assert_eq!(vm.execute(&closure, &[]).unwrap(), QuillVal::int(42));
    }

    #[test]
    fn runaway_program_counter_is_an_error() {
        let vm = machine();
        let closure = make_closure(&vm, vec![], QuillVal::nil());
        assert!(matches!(
            vm.execute(&closure, &[]),
            Err(RuntimeError::RunawayProgram { .. })
        ));
    }

    #[test]
    fn make_env_binds_arguments() {
        let vm = machine();
        let x = vm.registry().global().intern("x");
        let closure = make_closure(
            &vm,
            vec![
                Instruction::with_first(Op::MakeEnv, QuillVal::int(1)),
                Instruction::with_operands(Op::LocalGet, QuillVal::int(0), QuillVal::int(0)),
                Instruction::new(Op::ReturnVal),
            ],
            QuillVal::list(vec![QuillVal::symbol(x)]),
        );
        assert_eq!(
            vm.execute(&closure, &[QuillVal::int(7)]).unwrap(),
            QuillVal::int(7)
        );
        assert!(matches!(
            vm.execute(&closure, &[]),
            Err(RuntimeError::WrongArity { .. })
        ));
    }

    #[test]
    fn make_envdot_collects_surplus() {
        let vm = machine();
        let a = vm.registry().global().intern("a");
        let r = vm.registry().global().intern("r");
        let params = QuillVal::dotted_list(
            vec![QuillVal::symbol(a)],
            QuillVal::symbol(r),
        );
        let closure = make_closure(
            &vm,
            vec![
                Instruction::with_first(Op::MakeEnvDot, QuillVal::int(2)),
                Instruction::with_operands(Op::LocalGet, QuillVal::int(0), QuillVal::int(1)),
                Instruction::new(Op::ReturnVal),
            ],
            params,
        );
        let result = vm
            .execute(
                &closure,
                &[QuillVal::int(1), QuillVal::int(2), QuillVal::int(3)],
            )
            .unwrap();
        assert_eq!(result.to_string(), "(2 3)");

        // The rest parameter may be empty.
        let closure2 = closure.clone();
        let result = vm.execute(&closure2, &[QuillVal::int(1)]).unwrap();
        assert_eq!(result, QuillVal::Nil);
    }

    #[test]
    fn global_get_of_unbound_symbol_is_nil() {
        let vm = machine();
        let sym = vm.registry().global().intern("missing");
        let closure = make_closure(
            &vm,
            vec![
                Instruction::with_first(Op::GlobalGet, QuillVal::symbol(sym)),
                Instruction::new(Op::ReturnVal),
            ],
            QuillVal::nil(),
        );
        assert_eq!(vm.execute(&closure, &[]).unwrap(), QuillVal::Nil);
    }

    #[test]
    fn unknown_primitive_is_an_error() {
        let vm = machine();
        let closure = make_closure(
            &vm,
            vec![
                Instruction::with_first(Op::CallPrimop, QuillVal::string("nope")),
                Instruction::new(Op::ReturnVal),
            ],
            QuillVal::nil(),
        );
        assert!(matches!(
            vm.execute(&closure, &[]),
            Err(RuntimeError::PrimitiveNotFound { .. })
        ));
    }

    #[test]
    fn calling_a_non_closure_fails() {
        let vm = machine();
        assert!(matches!(
            vm.execute(&QuillVal::int(1), &[]),
            Err(RuntimeError::NotCallable(_))
        ));
    }
}

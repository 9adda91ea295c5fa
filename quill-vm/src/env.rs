// quill-vm - Lexical environments for the Quill virtual machine
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Environment chains: one frame per function entry, linked to the frame
//! of the enclosing scope.
//!
//! A frame's symbol array is fixed at construction; the value slots are
//! interior-mutable so `set!` through one closure is visible through every
//! closure sharing the frame. Frames are `Rc`-shared and survive as long
//! as any capturing closure does.
//!
//! Closures store their environment type-erased as `Rc<dyn Any>` (the
//! `Closure` type lives in `quill-reader`, which cannot name `Env`); the
//! helpers here erase and recover it.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use quill_reader::{QuillVal, Symbol};

/// Compile-time coordinate of a local variable: how many frames up, and
/// which slot within that frame. "Not local" is `None` at the lookup site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarPos {
    pub depth: usize,
    pub slot: usize,
}

struct Frame {
    symbols: Vec<Symbol>,
    values: RefCell<Vec<QuillVal>>,
    parent: Env,
}

/// A chain of variable frames. Cheap to clone; possibly empty.
#[derive(Clone, Default)]
pub struct Env {
    head: Option<Rc<Frame>>,
}

impl Env {
    /// The empty environment.
    #[must_use]
    pub fn empty() -> Self {
        Env { head: None }
    }

    /// Push a new frame holding `symbols`/`values` in parallel, with this
    /// environment as parent. `values` is padded with nil to the symbol
    /// count.
    #[must_use]
    pub fn extend(&self, symbols: Vec<Symbol>, mut values: Vec<QuillVal>) -> Env {
        values.resize(symbols.len(), QuillVal::Nil);
        Env {
            head: Some(Rc::new(Frame {
                symbols,
                values: RefCell::new(values),
                parent: self.clone(),
            })),
        }
    }

    /// Drop the topmost frame. The empty environment stays empty.
    #[must_use]
    pub fn pop(&self) -> Env {
        match &self.head {
            Some(frame) => frame.parent.clone(),
            None => Env::empty(),
        }
    }

    /// Whether the chain has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Number of frames in the chain.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head.clone();
        while let Some(frame) = cursor {
            count += 1;
            cursor = frame.parent.head.clone();
        }
        count
    }

    /// Find a symbol in the chain; the first (innermost) hit wins.
    #[must_use]
    pub fn lookup(&self, sym: &Symbol) -> Option<VarPos> {
        let mut depth = 0;
        let mut cursor = self.head.clone();
        while let Some(frame) = cursor {
            if let Some(slot) = frame.symbols.iter().position(|s| s == sym) {
                return Some(VarPos { depth, slot });
            }
            depth += 1;
            cursor = frame.parent.head.clone();
        }
        None
    }

    /// Read the value at a coordinate.
    #[must_use]
    pub fn get(&self, pos: VarPos) -> Option<QuillVal> {
        let frame = self.frame_at(pos.depth)?;
        let value = frame.values.borrow().get(pos.slot).cloned();
        value
    }

    /// Write the value at a coordinate. Returns whether the coordinate was
    /// in range.
    pub fn set(&self, pos: VarPos, value: QuillVal) -> bool {
        let Some(frame) = self.frame_at(pos.depth) else {
            return false;
        };
        let mut values = frame.values.borrow_mut();
        match values.get_mut(pos.slot) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Type-erase for storage inside a `Closure`.
    #[must_use]
    pub fn erase(&self) -> Rc<dyn Any> {
        Rc::new(self.clone())
    }

    /// Recover an environment from a closure's erased field.
    #[must_use]
    pub fn from_erased(erased: &Rc<dyn Any>) -> Option<Env> {
        erased.downcast_ref::<Env>().cloned()
    }

    fn frame_at(&self, depth: usize) -> Option<Rc<Frame>> {
        let mut cursor = self.head.clone();
        for _ in 0..depth {
            cursor = cursor?.parent.head.clone();
        }
        cursor
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Env({} frames)", self.depth())
    }
}

/// Flatten a formal-parameter list into the symbols of the frame it binds,
/// plus whether the last slot collects surplus arguments.
///
/// nil → no slots; a bare symbol → one collecting slot; a proper list of
/// symbols → one slot each; a dotted list → fixed slots plus a collecting
/// tail slot. Returns `None` for anything else.
#[must_use]
pub fn param_symbols(params: &QuillVal) -> Option<(Vec<Symbol>, bool)> {
    match params {
        QuillVal::Nil => Some((Vec::new(), false)),
        QuillVal::Symbol(sym) => Some((vec![sym.clone()], true)),
        QuillVal::Cons(_) => {
            let (items, tail) = params.list_parts();
            let mut symbols = Vec::with_capacity(items.len() + 1);
            for item in &items {
                symbols.push(item.as_symbol()?.clone());
            }
            match tail {
                QuillVal::Nil => Some((symbols, false)),
                QuillVal::Symbol(rest) => {
                    symbols.push(rest);
                    Some((symbols, true))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quill_reader::PackageRegistry;

    fn syms(registry: &PackageRegistry, names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|n| registry.global().intern(n)).collect()
    }

    #[test]
    fn lookup_walks_the_chain() {
        let registry = PackageRegistry::new();
        let outer = Env::empty().extend(syms(&registry, &["a", "b"]), vec![]);
        let inner = outer.extend(syms(&registry, &["c"]), vec![]);

        let a = registry.global().intern("a");
        let c = registry.global().intern("c");
        assert_eq!(inner.lookup(&c), Some(VarPos { depth: 0, slot: 0 }));
        assert_eq!(inner.lookup(&a), Some(VarPos { depth: 1, slot: 0 }));
        assert_eq!(outer.lookup(&c), None);
    }

    #[test]
    fn inner_frames_shadow_outer() {
        let registry = PackageRegistry::new();
        let outer = Env::empty().extend(syms(&registry, &["x"]), vec![QuillVal::int(1)]);
        let inner = outer.extend(syms(&registry, &["x"]), vec![QuillVal::int(2)]);
        let x = registry.global().intern("x");
        let pos = inner.lookup(&x).unwrap();
        assert_eq!(pos, VarPos { depth: 0, slot: 0 });
        assert_eq!(inner.get(pos), Some(QuillVal::int(2)));
    }

    #[test]
    fn set_is_visible_through_shared_frames() {
        let registry = PackageRegistry::new();
        let shared = Env::empty().extend(syms(&registry, &["n"]), vec![QuillVal::int(0)]);
        let child_a = shared.extend(vec![], vec![]);
        let child_b = shared.extend(vec![], vec![]);

        assert!(child_a.set(VarPos { depth: 1, slot: 0 }, QuillVal::int(9)));
        assert_eq!(
            child_b.get(VarPos { depth: 1, slot: 0 }),
            Some(QuillVal::int(9))
        );
        assert_eq!(
            shared.get(VarPos { depth: 0, slot: 0 }),
            Some(QuillVal::int(9))
        );
    }

    #[test]
    fn out_of_range_coordinates() {
        let env = Env::empty();
        assert_eq!(env.get(VarPos { depth: 0, slot: 0 }), None);
        assert!(!env.set(VarPos { depth: 0, slot: 0 }, QuillVal::int(1)));
    }

    #[test]
    fn erase_round_trips() {
        let registry = PackageRegistry::new();
        let env = Env::empty().extend(syms(&registry, &["a"]), vec![QuillVal::int(7)]);
        let erased = env.erase();
        let back = Env::from_erased(&erased).unwrap();
        assert_eq!(
            back.get(VarPos { depth: 0, slot: 0 }),
            Some(QuillVal::int(7))
        );
    }

    #[test]
    fn pop_drops_the_top_frame() {
        let registry = PackageRegistry::new();
        let outer = Env::empty().extend(syms(&registry, &["a"]), vec![]);
        let inner = outer.extend(syms(&registry, &["b"]), vec![]);
        assert_eq!(inner.depth(), 2);
        assert_eq!(inner.pop().depth(), 1);
        assert_eq!(Env::empty().pop().depth(), 0);
    }
}

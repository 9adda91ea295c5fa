// quill-vm - Code blocks and the handle-addressed code store
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Compiled code blocks, addressed by stable handles.
//!
//! The store is append-only: handles never move, so closures can hold
//! them for the life of the context. Removing a block leaves a hole.
//! Handle 0 is reserved as invalid.

use std::fmt;
use std::rc::Rc;

use quill_reader::CodeHandle;

use crate::instruction::Instruction;

/// An assembled instruction sequence registered in the store.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    /// This block's handle in the store.
    pub handle: CodeHandle,
    /// The assembled instructions, labels retained.
    pub code: Vec<Instruction>,
    /// Human-readable description for listings.
    pub debug: Rc<str>,
}

impl fmt::Display for CodeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "block {} ; {}", self.handle, self.debug)?;
        for (pc, instr) in self.code.iter().enumerate() {
            writeln!(f, "{:>5}  {}", pc, instr)?;
        }
        Ok(())
    }
}

/// Handle-indexed store of code blocks.
#[derive(Debug, Default)]
pub struct CodeStore {
    blocks: Vec<Option<Rc<CodeBlock>>>,
}

impl CodeStore {
    /// Create an empty store. Slot 0 is permanently reserved.
    #[must_use]
    pub fn new() -> Self {
        CodeStore {
            blocks: vec![None],
        }
    }

    /// Register a block and return its handle.
    pub fn insert(&mut self, code: Vec<Instruction>, debug: impl Into<Rc<str>>) -> CodeHandle {
        let handle = CodeHandle::from_index(self.blocks.len());
        self.blocks.push(Some(Rc::new(CodeBlock {
            handle,
            code,
            debug: debug.into(),
        })));
        handle
    }

    /// Fetch a block by handle.
    #[must_use]
    pub fn get(&self, handle: CodeHandle) -> Option<Rc<CodeBlock>> {
        if !handle.is_valid() {
            return None;
        }
        self.blocks.get(handle.index()).cloned().flatten()
    }

    /// Remove a block, leaving a hole so later handles stay stable.
    /// Returns whether a block was present.
    pub fn remove(&mut self, handle: CodeHandle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        match self.blocks.get_mut(handle.index()) {
            Some(slot) => slot.take().is_some(),
            None => false,
        }
    }

    /// Handles of all live blocks, in insertion order.
    #[must_use]
    pub fn handles(&self) -> Vec<CodeHandle> {
        self.blocks
            .iter()
            .filter_map(|slot| slot.as_ref().map(|block| block.handle))
            .collect()
    }

    /// Number of live blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether the store holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================

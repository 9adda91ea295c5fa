// quill-vm - Label assembly
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Resolves label strings to integer program counters.
//!
//! `LABEL` pseudo-instructions are retained in the output so instruction
//! indices are identical before and after assembly; each jump's `second`
//! operand is rewritten to the index of its target label.

use std::collections::HashMap;

use quill_reader::QuillVal;

use crate::instruction::{Instruction, Op};

use super::{CompileError, Result};

/// Rewrite every jump's target. Fails on a jump whose label does not
/// appear in the block.
pub fn assemble(mut code: Vec<Instruction>) -> Result<Vec<Instruction>> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (pc, instr) in code.iter().enumerate() {
        if instr.op == Op::Label {
            if let Some(name) = instr.label_name() {
                positions.insert(name.to_string(), pc);
            }
        }
    }

    for instr in &mut code {
        if !instr.op.is_jump() {
            continue;
        }
        let name = instr
            .label_name()
            .map(str::to_string)
            .ok_or_else(|| CompileError::Internal("jump without a label operand".into()))?;
        let target = positions
            .get(&name)
            .ok_or(CompileError::UnresolvedLabel(name))?;
        instr.second = QuillVal::int(*target as i32);
    }
    Ok(code)
}

// ============================================================================
// Tests
// ============================================================================

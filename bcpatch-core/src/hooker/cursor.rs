//! Instruction stream cursor.
//!
//! A cursor walks one code unit's instructions left to right. `goto_next`
//! searches strictly after the current position, so a loop of
//! `goto_next`/`replace` visits every match exactly once:
//!
//! ```rust
//! use bcpatch_core::hooker::AsmCursor;
//! use bcpatch_core::image::{CodeUnit, Instruction};
//!
//! let mut unit = CodeUnit::new("scr_a", 0).with_instructions(vec![
//!     Instruction::call("scr_old", 0),
//!     Instruction::Pop,
//!     Instruction::call("scr_old", 0),
//! ]);
//! let mut cursor = AsmCursor::new(&mut unit);
//! let pattern = Instruction::call("scr_old", 0);
//! while cursor.goto_next(&pattern) {
//!     cursor.replace(Instruction::call("scr_new", 0));
//! }
//! assert_eq!(unit.instructions[2], Instruction::call("scr_new", 0));
//! ```

use crate::image::{CodeUnit, Instruction};

/// Search/replace cursor over a code unit.
pub struct AsmCursor<'a> {
    unit: &'a mut CodeUnit,
    /// `None` until the first successful search
    position: Option<usize>,
}

impl<'a> AsmCursor<'a> {
    pub fn new(unit: &'a mut CodeUnit) -> Self {
        Self {
            unit,
            position: None,
        }
    }

    /// Move to the next instruction equal to `pattern`.
    ///
    /// Returns `false` and stays put when there is none.
    pub fn goto_next(&mut self, pattern: &Instruction) -> bool {
        self.goto_next_matching(|instruction| instruction == pattern)
    }

    /// Move to the next instruction satisfying `predicate`.
    pub fn goto_next_matching<P>(&mut self, predicate: P) -> bool
    where
        P: FnMut(&Instruction) -> bool,
    {
        let start = self.position.map_or(0, |position| position + 1);
        let rest = self.unit.instructions.get(start..).unwrap_or(&[]);
        match rest.iter().position(predicate) {
            Some(offset) => {
                self.position = Some(start + offset);
                true
            }
            None => false,
        }
    }

    /// Overwrite the current instruction, returning the old one.
    ///
    /// Returns `None` (and changes nothing) before the first successful search.
    pub fn replace(&mut self, instruction: Instruction) -> Option<Instruction> {
        let slot = self.unit.instructions.get_mut(self.position?)?;
        Some(std::mem::replace(slot, instruction))
    }

    /// Insert after the current instruction (or at the start) and move onto it.
    pub fn insert_after(&mut self, instruction: Instruction) {
        let index = self.position.map_or(0, |position| position + 1);
        self.unit.instructions.insert(index, instruction);
        self.position = Some(index);
    }

    /// Remove the current instruction; the next search resumes at its successor.
    pub fn remove(&mut self) -> Option<Instruction> {
        let position = self.position?;
        if position >= self.unit.instructions.len() {
            return None;
        }
        let removed = self.unit.instructions.remove(position);
        self.position = position.checked_sub(1);
        Some(removed)
    }

    pub fn current(&self) -> Option<&Instruction> {
        self.unit.instructions.get(self.position?)
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn unit(&self) -> &CodeUnit {
        &*self.unit
    }
}

// ======================================================================
// SCRIPT BUILDER
// ======================================================================
//
// Authoring by opcode name against a dispatch table. Ids are resolved
// from the table, so a built script always matches the table it was
// built with. The first unknown name is kept and returned by `build`.
// ======================================================================

use anchor_lang::prelude::*;
use std::fmt::Write as _;

use super::{word_to_u64, DispatchTable, Op, Operand, Script, Word, MAX_SOURCES};
use crate::error::ScriptError;

pub struct ScriptBuilder<'t, H> {
    table: &'t DispatchTable<H>,
    sources: Vec<Vec<Op>>,
    constants: Vec<[u8; 32]>,
    error: Option<ScriptError>,
}

impl<'t, H> ScriptBuilder<'t, H> {
    pub fn new(table: &'t DispatchTable<H>) -> Self {
        Self {
            table,
            sources: vec![Vec::new()],
            constants: Vec::new(),
            error: None,
        }
    }

    /// Appends `name` with `operand` to the current source.
    pub fn op(&mut self, name: &str, operand: u16) -> &mut Self {
        match self.table.id_of(name) {
            Some(opcode) => self.push(Op::new(opcode, operand)),
            None => self.fail(ScriptError::UnknownOpcode),
        }
        self
    }

    /// Pushes `value` through the constant pool. Equal values share a slot.
    pub fn constant(&mut self, value: Word) -> &mut Self {
        let bytes = value.to_be_bytes::<32>();
        let index = match self.constants.iter().position(|c| *c == bytes) {
            Some(index) => index,
            None => {
                self.constants.push(bytes);
                self.constants.len() - 1
            }
        };
        match u16::try_from(index) {
            Ok(index) => self.op("constant", index),
            Err(_) => {
                self.fail(ScriptError::TooManyConstants);
                self
            }
        }
    }

    pub fn context(&mut self, index: u16) -> &mut Self {
        self.op("context", index)
    }

    /// Starts a new source. Later ops go to it.
    pub fn next_source(&mut self) -> &mut Self {
        if self.sources.len() >= MAX_SOURCES {
            self.fail(ScriptError::TooManySources);
        } else {
            self.sources.push(Vec::new());
        }
        self
    }

    pub fn build(self) -> Result<Script> {
        if let Some(error) = self.error {
            return Err(error.into());
        }
        Ok(Script {
            sources: self.sources,
            constants: self.constants,
        })
    }

    fn push(&mut self, op: Op) {
        if let Some(source) = self.sources.last_mut() {
            source.push(op);
        }
    }

    fn fail(&mut self, error: ScriptError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// One line per source, e.g. `0: constant[100] context[1] saturating_sub(2)`.
/// Constant operands print the pooled value. Unknown ids print as `op#id`.
pub fn disassemble<H>(table: &DispatchTable<H>, script: &Script) -> String {
    let constants = script.constant_words();
    let mut out = String::new();

    for (i, source) in script.sources.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{}:", i);
        for op in source {
            out.push(' ');
            let Some(entry) = table.resolve(op.opcode) else {
                let _ = write!(out, "op#{}({})", op.opcode, op.operand);
                continue;
            };
            let _ = match entry.operand {
                Operand::None => write!(out, "{}", entry.name),
                Operand::Count => write!(out, "{}({})", entry.name, op.operand),
                Operand::Constant => match constants.get(op.operand as usize) {
                    Some(value) => write!(out, "{}[{}]", entry.name, word_text(*value)),
                    None => write!(out, "{}[?{}]", entry.name, op.operand),
                },
                Operand::Context | Operand::Slot { .. } => {
                    write!(out, "{}[{}]", entry.name, op.operand)
                }
            };
        }
    }
    out
}

/// Decimal when the word fits in 64 bits, big-endian hex otherwise.
fn word_text(value: Word) -> String {
    if let Some(small) = word_to_u64(value) {
        return small.to_string();
    }
    let mut text = String::from("0x");
    for byte in value.to_be_bytes::<32>() {
        let _ = write!(text, "{:02x}", byte);
    }
    text
}

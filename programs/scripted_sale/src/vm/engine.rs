use anchor_lang::prelude::*;

use super::{DispatchTable, Machine, Script, Word, MAX_STACK_DEPTH};
use crate::error::ScriptError;

/// Result of evaluating a source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quote {
    pub max_units: Word,
    pub price: Word,
}

/// Runs `source_index` of `script` to completion. Evaluation is a pure
/// function of the script, the context and the host view.
pub fn evaluate<H>(
    table: &DispatchTable<H>,
    script: &Script,
    source_index: usize,
    context: &[Word],
    host: &H,
) -> Result<Quote> {
    evaluate_with_capacity(table, script, source_index, context, host, MAX_STACK_DEPTH)
}

/// `evaluate` with the stack preallocated to `stack_capacity` words.
pub fn evaluate_with_capacity<H>(
    table: &DispatchTable<H>,
    script: &Script,
    source_index: usize,
    context: &[Word],
    host: &H,
    stack_capacity: usize,
) -> Result<Quote> {
    let source = script
        .sources
        .get(source_index)
        .ok_or(ScriptError::SourceOutOfBounds)?;
    let constants = script.constant_words();
    let mut machine = Machine::with_capacity(&constants, context, host, stack_capacity);

    for op in source {
        let entry = table.resolve(op.opcode).ok_or(ScriptError::UnknownOpcode)?;
        (entry.run)(&mut machine, op.operand)?;
    }

    machine.into_quote()
}

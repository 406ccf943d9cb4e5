use anchor_lang::prelude::*;

use super::{
    DispatchTable, Operand, Script, MAX_CONSTANTS, MAX_SOURCES, MAX_SOURCE_LEN, MAX_STACK_DEPTH,
    RESULT_ARITY,
};
use crate::error::ScriptError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScriptInfo {
    /// Deepest stack any source reaches.
    pub max_stack_depth: u16,
}

/// Static checks run once when a script is stored. A script that passes
/// can only fail at evaluation on data-dependent errors (overflow, zero
/// divisor, missing account counters).
pub fn validate<H>(
    table: &DispatchTable<H>,
    script: &Script,
    context_len: usize,
) -> Result<ScriptInfo> {
    require!(!script.sources.is_empty(), ScriptError::EmptyScript);
    require!(script.sources.len() <= MAX_SOURCES, ScriptError::TooManySources);
    require!(
        script.constants.len() <= MAX_CONSTANTS,
        ScriptError::TooManyConstants
    );

    let mut max_depth = 0usize;
    for source in &script.sources {
        require!(source.len() <= MAX_SOURCE_LEN, ScriptError::SourceTooLong);

        let mut depth = 0usize;
        for op in source {
            let entry = table.resolve(op.opcode).ok_or(ScriptError::UnknownOpcode)?;
            check_operand(entry.operand, op.operand, script.constants.len(), context_len)?;

            let (inputs, outputs) = entry.stack_effect(op.operand);
            require!(depth >= inputs, ScriptError::StackUnderflow);
            depth = depth - inputs + outputs;
            require!(depth <= MAX_STACK_DEPTH, ScriptError::StackOverflow);
            max_depth = max_depth.max(depth);
        }
        require!(depth >= RESULT_ARITY, ScriptError::MissingResults);
    }

    Ok(ScriptInfo {
        max_stack_depth: max_depth as u16,
    })
}

fn check_operand(
    kind: Operand,
    operand: u16,
    constants_len: usize,
    context_len: usize,
) -> Result<()> {
    let index = operand as usize;
    match kind {
        Operand::None => require!(operand == 0, ScriptError::InvalidOperand),
        Operand::Count => require!(operand >= 1, ScriptError::InvalidOperand),
        Operand::Constant => require!(index < constants_len, ScriptError::ConstantOutOfBounds),
        Operand::Context => require!(index < context_len, ScriptError::ContextOutOfBounds),
        Operand::Slot { count } => require!(operand < count, ScriptError::UnknownStorageSlot),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{standard_ops, Env, Op, Word};

    struct NoHost;

    impl Env for NoHost {
        fn block_timestamp(&self) -> u64 {
            0
        }
    }

    fn table() -> DispatchTable<NoHost> {
        DispatchTable::build(standard_ops(), Vec::new()).unwrap()
    }

    fn id(table: &DispatchTable<NoHost>, name: &str) -> u16 {
        table.id_of(name).unwrap()
    }

    fn constant(v: u64) -> [u8; 32] {
        Word::from(v).to_be_bytes::<32>()
    }

    fn two_constants(t: &DispatchTable<NoHost>) -> Vec<Op> {
        vec![Op::new(id(t, "constant"), 0), Op::new(id(t, "constant"), 1)]
    }

    fn script(sources: Vec<Vec<Op>>) -> Script {
        Script {
            sources,
            constants: vec![constant(1), constant(2)],
        }
    }

    fn rejects(script: &Script, expected: ScriptError) {
        let err = validate(&table(), script, 2).unwrap_err();
        assert_eq!(err, expected.into());
    }

    #[test]
    fn accepts_well_formed_script() {
        let t = table();
        let mut source = two_constants(&t);
        source.push(Op::new(id(&t, "context"), 1));
        source.push(Op::new(id(&t, "add"), 2));
        let info = validate(&t, &script(vec![source]), 2).unwrap();
        assert_eq!(info.max_stack_depth, 3);
    }

    #[test]
    fn rejects_empty_and_oversized_scripts() {
        let t = table();
        rejects(&script(Vec::new()), ScriptError::EmptyScript);
        rejects(
            &script(vec![two_constants(&t); MAX_SOURCES + 1]),
            ScriptError::TooManySources,
        );

        let mut long = two_constants(&t);
        long.extend(vec![Op::new(id(&t, "is_zero"), 0); MAX_SOURCE_LEN]);
        rejects(&script(vec![long]), ScriptError::SourceTooLong);

        let mut s = script(vec![two_constants(&t)]);
        s.constants = vec![constant(0); MAX_CONSTANTS + 1];
        rejects(&s, ScriptError::TooManyConstants);
    }

    #[test]
    fn rejects_unknown_opcode() {
        let t = table();
        let mut source = two_constants(&t);
        source.push(Op::new(t.len() as u16, 0));
        rejects(&script(vec![source]), ScriptError::UnknownOpcode);
    }

    #[test]
    fn rejects_bad_operands() {
        let t = table();

        let mut source = two_constants(&t);
        source.push(Op::new(id(&t, "less_than"), 1));
        rejects(&script(vec![source]), ScriptError::InvalidOperand);

        let mut source = two_constants(&t);
        source.push(Op::new(id(&t, "add"), 0));
        rejects(&script(vec![source]), ScriptError::InvalidOperand);

        let source = vec![Op::new(id(&t, "constant"), 0), Op::new(id(&t, "constant"), 2)];
        rejects(&script(vec![source]), ScriptError::ConstantOutOfBounds);

        let source = vec![Op::new(id(&t, "context"), 0), Op::new(id(&t, "context"), 2)];
        rejects(&script(vec![source]), ScriptError::ContextOutOfBounds);
    }

    #[test]
    fn simulates_stack_depth() {
        let t = table();

        let source = vec![Op::new(id(&t, "constant"), 0), Op::new(id(&t, "add"), 2)];
        rejects(&script(vec![source]), ScriptError::StackUnderflow);

        let source = vec![Op::new(id(&t, "constant"), 0); MAX_STACK_DEPTH + 1];
        rejects(&script(vec![source]), ScriptError::StackOverflow);

        let source = vec![Op::new(id(&t, "constant"), 0)];
        rejects(&script(vec![source]), ScriptError::MissingResults);
    }

    #[test]
    fn every_source_is_checked() {
        let t = table();
        let bad = vec![Op::new(id(&t, "constant"), 0)];
        rejects(
            &script(vec![two_constants(&t), bad]),
            ScriptError::MissingResults,
        );
    }
}

// ======================================================================
// STANDARD OPCODE LIBRARY
// ======================================================================
//
// Host-agnostic operations. Ids are table positions, in the order
// `standard_ops` lists them:
//
//   Data access   constant, context, block_timestamp
//   Arithmetic    add, sub, saturating_sub, mul, div, mod   (n -> 1)
//   Extrema       min, max                                  (n -> 1)
//   Comparison    less_than, greater_than, equal_to, is_zero
//   Logic         every, any (n -> 1), eager_if (3 -> 1)
//
// Overflow, underflow and zero divisors fail the evaluation.
// saturating_sub is the only clamping operation.
// ======================================================================

use anchor_lang::prelude::*;

use super::{bool_word, Arity, Env, Machine, OpEntry, Operand, Word};
use crate::error::ScriptError;

pub fn standard_ops<H: Env>() -> Vec<OpEntry<H>> {
    vec![
        OpEntry::new("constant", Operand::Constant, Arity::fixed(0, 1), op_constant::<H>),
        OpEntry::new("context", Operand::Context, Arity::fixed(0, 1), op_context::<H>),
        OpEntry::new(
            "block_timestamp",
            Operand::None,
            Arity::fixed(0, 1),
            op_block_timestamp::<H>,
        ),
        OpEntry::new("add", Operand::Count, Arity::Counted, op_add::<H>),
        OpEntry::new("sub", Operand::Count, Arity::Counted, op_sub::<H>),
        OpEntry::new(
            "saturating_sub",
            Operand::Count,
            Arity::Counted,
            op_saturating_sub::<H>,
        ),
        OpEntry::new("mul", Operand::Count, Arity::Counted, op_mul::<H>),
        OpEntry::new("div", Operand::Count, Arity::Counted, op_div::<H>),
        OpEntry::new("mod", Operand::Count, Arity::Counted, op_mod::<H>),
        OpEntry::new("min", Operand::Count, Arity::Counted, op_min::<H>),
        OpEntry::new("max", Operand::Count, Arity::Counted, op_max::<H>),
        OpEntry::new("less_than", Operand::None, Arity::fixed(2, 1), op_less_than::<H>),
        OpEntry::new("greater_than", Operand::None, Arity::fixed(2, 1), op_greater_than::<H>),
        OpEntry::new("equal_to", Operand::None, Arity::fixed(2, 1), op_equal_to::<H>),
        OpEntry::new("is_zero", Operand::None, Arity::fixed(1, 1), op_is_zero::<H>),
        OpEntry::new("every", Operand::Count, Arity::Counted, op_every::<H>),
        OpEntry::new("any", Operand::Count, Arity::Counted, op_any::<H>),
        OpEntry::new("eager_if", Operand::None, Arity::fixed(3, 1), op_eager_if::<H>),
    ]
}

// --- data access ---

fn op_constant<H>(m: &mut Machine<'_, H>, operand: u16) -> Result<()> {
    let value = m.constant(operand)?;
    m.push(value)
}

fn op_context<H>(m: &mut Machine<'_, H>, operand: u16) -> Result<()> {
    let value = m.context(operand)?;
    m.push(value)
}

fn op_block_timestamp<H: Env>(m: &mut Machine<'_, H>, _operand: u16) -> Result<()> {
    let now = m.host().block_timestamp();
    m.push(Word::from(now))
}

// --- arithmetic ---

/// Left fold over the top `n` values in push order.
fn fold<H>(
    m: &mut Machine<'_, H>,
    n: u16,
    f: impl Fn(Word, Word) -> Result<Word>,
) -> Result<()> {
    let operands = m.pop_n(n as usize)?;
    let mut acc = operands[0];
    for value in &operands[1..] {
        acc = f(acc, *value)?;
    }
    m.push(acc)
}

fn op_add<H>(m: &mut Machine<'_, H>, operand: u16) -> Result<()> {
    fold(m, operand, |a, b| {
        Ok(a.checked_add(b).ok_or(ScriptError::ArithmeticOverflow)?)
    })
}

fn op_sub<H>(m: &mut Machine<'_, H>, operand: u16) -> Result<()> {
    fold(m, operand, |a, b| {
        Ok(a.checked_sub(b).ok_or(ScriptError::ArithmeticOverflow)?)
    })
}

fn op_saturating_sub<H>(m: &mut Machine<'_, H>, operand: u16) -> Result<()> {
    fold(m, operand, |a, b| Ok(a.saturating_sub(b)))
}

fn op_mul<H>(m: &mut Machine<'_, H>, operand: u16) -> Result<()> {
    fold(m, operand, |a, b| {
        Ok(a.checked_mul(b).ok_or(ScriptError::ArithmeticOverflow)?)
    })
}

fn op_div<H>(m: &mut Machine<'_, H>, operand: u16) -> Result<()> {
    fold(m, operand, |a, b| {
        Ok(a.checked_div(b).ok_or(ScriptError::DivisionByZero)?)
    })
}

fn op_mod<H>(m: &mut Machine<'_, H>, operand: u16) -> Result<()> {
    fold(m, operand, |a, b| {
        Ok(a.checked_rem(b).ok_or(ScriptError::DivisionByZero)?)
    })
}

// --- extrema ---

fn op_min<H>(m: &mut Machine<'_, H>, operand: u16) -> Result<()> {
    fold(m, operand, |a, b| Ok(a.min(b)))
}

fn op_max<H>(m: &mut Machine<'_, H>, operand: u16) -> Result<()> {
    fold(m, operand, |a, b| Ok(a.max(b)))
}

// --- comparison ---

fn compare<H>(m: &mut Machine<'_, H>, f: fn(&Word, &Word) -> bool) -> Result<()> {
    let b = m.pop()?;
    let a = m.pop()?;
    m.push(bool_word(f(&a, &b)))
}

fn op_less_than<H>(m: &mut Machine<'_, H>, _operand: u16) -> Result<()> {
    compare(m, |a, b| a < b)
}

fn op_greater_than<H>(m: &mut Machine<'_, H>, _operand: u16) -> Result<()> {
    compare(m, |a, b| a > b)
}

fn op_equal_to<H>(m: &mut Machine<'_, H>, _operand: u16) -> Result<()> {
    compare(m, |a, b| a == b)
}

fn op_is_zero<H>(m: &mut Machine<'_, H>, _operand: u16) -> Result<()> {
    let value = m.pop()?;
    m.push(bool_word(value.is_zero()))
}

// --- logic ---

fn op_every<H>(m: &mut Machine<'_, H>, operand: u16) -> Result<()> {
    let operands = m.pop_n(operand as usize)?;
    m.push(bool_word(operands.iter().all(|v| !v.is_zero())))
}

fn op_any<H>(m: &mut Machine<'_, H>, operand: u16) -> Result<()> {
    let operands = m.pop_n(operand as usize)?;
    m.push(bool_word(operands.iter().any(|v| !v.is_zero())))
}

/// `[condition, if_true, if_false]`; both branches are already on the stack.
fn op_eager_if<H>(m: &mut Machine<'_, H>, _operand: u16) -> Result<()> {
    let if_false = m.pop()?;
    let if_true = m.pop()?;
    let condition = m.pop()?;
    m.push(if condition.is_zero() { if_false } else { if_true })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock(u64);

    impl Env for Clock {
        fn block_timestamp(&self) -> u64 {
            self.0
        }
    }

    fn w(v: u64) -> Word {
        Word::from(v)
    }

    /// Runs the named op over `stack` and returns the resulting stack.
    fn run(name: &str, operand: u16, stack: &[u64]) -> Result<Vec<Word>> {
        let ops = standard_ops::<Clock>();
        let entry = ops.iter().find(|e| e.name == name).unwrap();
        let host = Clock(1_700_000_000);
        let constants = [w(11), w(22)];
        let context = [w(5)];
        let mut m = Machine::new(&constants, &context, &host);
        for v in stack {
            m.push(w(*v))?;
        }
        (entry.run)(&mut m, operand)?;
        Ok(m.stack().to_vec())
    }

    #[test]
    fn data_access_pushes_inputs() {
        assert_eq!(run("constant", 1, &[]).unwrap(), vec![w(22)]);
        assert_eq!(run("context", 0, &[]).unwrap(), vec![w(5)]);
        assert_eq!(run("block_timestamp", 0, &[]).unwrap(), vec![w(1_700_000_000)]);
    }

    #[test]
    fn out_of_bounds_data_access_fails() {
        assert_eq!(
            run("constant", 2, &[]).unwrap_err(),
            ScriptError::ConstantOutOfBounds.into()
        );
        assert_eq!(
            run("context", 1, &[]).unwrap_err(),
            ScriptError::ContextOutOfBounds.into()
        );
    }

    #[test]
    fn counted_arithmetic_folds_in_push_order() {
        assert_eq!(run("add", 3, &[1, 2, 3]).unwrap(), vec![w(6)]);
        assert_eq!(run("sub", 3, &[10, 3, 2]).unwrap(), vec![w(5)]);
        assert_eq!(run("mul", 2, &[6, 7]).unwrap(), vec![w(42)]);
        assert_eq!(run("div", 2, &[100, 7]).unwrap(), vec![w(14)]);
        assert_eq!(run("mod", 2, &[100, 7]).unwrap(), vec![w(2)]);
        // Only the top `n` values are consumed.
        assert_eq!(run("add", 2, &[9, 1, 2]).unwrap(), vec![w(9), w(3)]);
    }

    #[test]
    fn saturating_sub_clamps_at_zero() {
        assert_eq!(run("saturating_sub", 2, &[3, 10]).unwrap(), vec![w(0)]);
        assert_eq!(
            run("sub", 2, &[3, 10]).unwrap_err(),
            ScriptError::ArithmeticOverflow.into()
        );
    }

    #[test]
    fn zero_divisor_is_a_hard_failure() {
        assert_eq!(
            run("div", 2, &[10, 0]).unwrap_err(),
            ScriptError::DivisionByZero.into()
        );
        assert_eq!(
            run("mod", 2, &[10, 0]).unwrap_err(),
            ScriptError::DivisionByZero.into()
        );
    }

    #[test]
    fn multiplication_overflow_fails() {
        let ops = standard_ops::<Clock>();
        let mul = ops.iter().find(|e| e.name == "mul").unwrap();
        let host = Clock(0);
        let mut m = Machine::new(&[], &[], &host);
        m.push(Word::MAX).unwrap();
        m.push(w(2)).unwrap();
        assert_eq!(
            (mul.run)(&mut m, 2).unwrap_err(),
            ScriptError::ArithmeticOverflow.into()
        );
    }

    #[test]
    fn extrema_and_comparisons() {
        assert_eq!(run("min", 3, &[4, 2, 9]).unwrap(), vec![w(2)]);
        assert_eq!(run("max", 3, &[4, 2, 9]).unwrap(), vec![w(9)]);
        assert_eq!(run("less_than", 0, &[1, 2]).unwrap(), vec![w(1)]);
        assert_eq!(run("less_than", 0, &[2, 1]).unwrap(), vec![w(0)]);
        assert_eq!(run("greater_than", 0, &[2, 1]).unwrap(), vec![w(1)]);
        assert_eq!(run("equal_to", 0, &[3, 3]).unwrap(), vec![w(1)]);
        assert_eq!(run("is_zero", 0, &[0]).unwrap(), vec![w(1)]);
    }

    #[test]
    fn every_and_any() {
        assert_eq!(run("every", 3, &[1, 5, 9]).unwrap(), vec![w(1)]);
        assert_eq!(run("every", 3, &[1, 0, 9]).unwrap(), vec![w(0)]);
        assert_eq!(run("any", 2, &[0, 0]).unwrap(), vec![w(0)]);
        assert_eq!(run("any", 2, &[0, 3]).unwrap(), vec![w(1)]);
    }

    #[test]
    fn eager_if_selects_after_both_branches() {
        assert_eq!(run("eager_if", 0, &[1, 10, 20]).unwrap(), vec![w(10)]);
        assert_eq!(run("eager_if", 0, &[0, 10, 20]).unwrap(), vec![w(20)]);
    }

    #[test]
    fn missing_operands_underflow() {
        assert_eq!(
            run("add", 3, &[1, 2]).unwrap_err(),
            ScriptError::StackUnderflow.into()
        );
        assert_eq!(
            run("eager_if", 0, &[1, 2]).unwrap_err(),
            ScriptError::StackUnderflow.into()
        );
        assert_eq!(
            run("add", 0, &[1, 2]).unwrap_err(),
            ScriptError::InvalidOperand.into()
        );
    }
}

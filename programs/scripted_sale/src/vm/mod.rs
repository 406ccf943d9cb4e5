// ======================================================================
// SCRIPT VM
// ======================================================================
//
// Stack machine evaluating sale scripts.
//
//   opcodes   - standard library, generic over any host environment
//   dispatch  - standard table + host table behind one lookup
//   validate  - static analysis run once at configuration
//   engine    - evaluation of one source into a (max_units, price) quote
//   builder   - authoring by opcode name, disassembly for logs
//
// Values are 256-bit words. Account keys are words (big-endian).
// ======================================================================

use alloy_primitives::U256;
use anchor_lang::prelude::*;

use crate::error::ScriptError;

pub mod builder;
pub mod dispatch;
pub mod engine;
pub mod opcodes;
pub mod validate;

pub use builder::{disassemble, ScriptBuilder};
pub use dispatch::DispatchTable;
pub use engine::{evaluate, evaluate_with_capacity, Quote};
pub use opcodes::standard_ops;
pub use validate::{validate, ScriptInfo};

pub type Word = U256;

pub const MAX_SOURCES: usize = 4;
pub const MAX_SOURCE_LEN: usize = 128;
pub const MAX_CONSTANTS: usize = 32;
pub const MAX_STACK_DEPTH: usize = 64;

/// Values a source must leave on the stack: `(max_units, price)`.
pub const RESULT_ARITY: usize = 2;

// ======================================================================
// SCRIPT
// ======================================================================

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Op {
    pub opcode: u16,
    pub operand: u16,
}

impl Op {
    pub const SIZE: usize = 2 + 2;

    pub const fn new(opcode: u16, operand: u16) -> Self {
        Self { opcode, operand }
    }
}

/// Bytecode plus constant pool. Constants are big-endian words.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Script {
    pub sources: Vec<Vec<Op>>,
    pub constants: Vec<[u8; 32]>,
}

impl Script {
    /// Borsh size of the script.
    pub fn space(&self) -> usize {
        let sources: usize = self
            .sources
            .iter()
            .map(|source| 4 + source.len() * Op::SIZE)
            .sum();
        4 + sources + 4 + 32 * self.constants.len()
    }

    pub fn constant_words(&self) -> Vec<Word> {
        self.constants.iter().map(|c| Word::from_be_bytes(*c)).collect()
    }
}

// ======================================================================
// OPCODE ENTRIES
// ======================================================================

/// What an op's operand means. Validation checks it against the script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    /// Operand must be zero.
    None,
    /// Number of stack inputs, at least one.
    Count,
    /// Index into the constant pool.
    Constant,
    /// Index into the per-call context.
    Context,
    /// Host storage slot below `count`.
    Slot { count: u16 },
}

impl Operand {
    fn tag(self) -> [u8; 3] {
        match self {
            Operand::None => [0, 0, 0],
            Operand::Count => [1, 0, 0],
            Operand::Constant => [2, 0, 0],
            Operand::Context => [3, 0, 0],
            Operand::Slot { count } => {
                let [hi, lo] = count.to_be_bytes();
                [4, hi, lo]
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Fixed { inputs: u8, outputs: u8 },
    /// `operand` inputs, one output.
    Counted,
}

impl Arity {
    pub const fn fixed(inputs: u8, outputs: u8) -> Self {
        Arity::Fixed { inputs, outputs }
    }
}

pub type OpFn<H> = fn(&mut Machine<'_, H>, u16) -> Result<()>;

pub struct OpEntry<H> {
    pub name: &'static str,
    pub operand: Operand,
    pub arity: Arity,
    pub run: OpFn<H>,
}

impl<H> OpEntry<H> {
    pub fn new(name: &'static str, operand: Operand, arity: Arity, run: OpFn<H>) -> Self {
        Self {
            name,
            operand,
            arity,
            run,
        }
    }

    /// `(inputs, outputs)` for a given operand.
    pub fn stack_effect(&self, operand: u16) -> (usize, usize) {
        match self.arity {
            Arity::Fixed { inputs, outputs } => (inputs as usize, outputs as usize),
            Arity::Counted => (operand as usize, 1),
        }
    }

    pub(crate) fn descriptor(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.name.len() + 6);
        bytes.extend_from_slice(self.name.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&self.operand.tag());
        match self.arity {
            Arity::Fixed { inputs, outputs } => bytes.extend_from_slice(&[inputs, outputs]),
            Arity::Counted => bytes.extend_from_slice(&[u8::MAX, 1]),
        }
        bytes
    }
}

// ======================================================================
// MACHINE
// ======================================================================

/// Chain facts every host provides to the standard library.
pub trait Env {
    fn block_timestamp(&self) -> u64;
}

/// Per-evaluation state. Handlers only see the stack, the read-only
/// inputs and the host view.
pub struct Machine<'a, H> {
    stack: Vec<Word>,
    constants: &'a [Word],
    context: &'a [Word],
    host: &'a H,
}

impl<'a, H> Machine<'a, H> {
    pub fn new(constants: &'a [Word], context: &'a [Word], host: &'a H) -> Self {
        Self::with_capacity(constants, context, host, 16)
    }

    /// `capacity` is usually the depth found by validation.
    pub fn with_capacity(
        constants: &'a [Word],
        context: &'a [Word],
        host: &'a H,
        capacity: usize,
    ) -> Self {
        Self {
            stack: Vec::with_capacity(capacity.min(MAX_STACK_DEPTH)),
            constants,
            context,
            host,
        }
    }

    pub fn host(&self) -> &'a H {
        self.host
    }

    pub fn stack(&self) -> &[Word] {
        &self.stack
    }

    pub fn push(&mut self, value: Word) -> Result<()> {
        require!(self.stack.len() < MAX_STACK_DEPTH, ScriptError::StackOverflow);
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Word> {
        Ok(self.stack.pop().ok_or(ScriptError::StackUnderflow)?)
    }

    /// Removes the top `n` values, returned in push order.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Word>> {
        require!(n > 0, ScriptError::InvalidOperand);
        require!(self.stack.len() >= n, ScriptError::StackUnderflow);
        let at = self.stack.len() - n;
        Ok(self.stack.split_off(at))
    }

    pub fn constant(&self, index: u16) -> Result<Word> {
        Ok(*self
            .constants
            .get(index as usize)
            .ok_or(ScriptError::ConstantOutOfBounds)?)
    }

    pub fn context(&self, index: u16) -> Result<Word> {
        Ok(*self
            .context
            .get(index as usize)
            .ok_or(ScriptError::ContextOutOfBounds)?)
    }

    /// Second from top is `max_units`, top is `price`.
    pub fn into_quote(self) -> Result<Quote> {
        let len = self.stack.len();
        require!(len >= RESULT_ARITY, ScriptError::MissingResults);
        Ok(Quote {
            max_units: self.stack[len - 2],
            price: self.stack[len - 1],
        })
    }
}

// ======================================================================
// WORD HELPERS
// ======================================================================

pub fn bool_word(value: bool) -> Word {
    if value {
        Word::from(1u64)
    } else {
        Word::ZERO
    }
}

pub fn word_from_key(key: &Pubkey) -> Word {
    Word::from_be_bytes(key.to_bytes())
}

pub fn key_from_word(word: Word) -> Pubkey {
    Pubkey::new_from_array(word.to_be_bytes::<32>())
}

/// `None` when the word does not fit in 64 bits.
pub fn word_to_u64(word: Word) -> Option<u64> {
    let limbs = word.as_limbs();
    if limbs[1..].iter().any(|limb| *limb != 0) {
        None
    } else {
        Some(limbs[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_words() {
        let key = Pubkey::new_unique();
        assert_eq!(key_from_word(word_from_key(&key)), key);
    }

    #[test]
    fn word_to_u64_rejects_wide_values() {
        assert_eq!(word_to_u64(Word::from(42u64)), Some(42));
        assert_eq!(word_to_u64(Word::from(u64::MAX)), Some(u64::MAX));
        assert_eq!(word_to_u64(Word::from(u64::MAX) + Word::from(1u64)), None);
    }

    #[test]
    fn script_space_matches_borsh_length() {
        let script = Script {
            sources: vec![vec![Op::new(0, 0), Op::new(3, 2)], vec![Op::new(1, 1)]],
            constants: vec![[7u8; 32]],
        };
        let mut encoded = Vec::new();
        script.serialize(&mut encoded).unwrap();
        assert_eq!(encoded.len(), script.space());
    }
}

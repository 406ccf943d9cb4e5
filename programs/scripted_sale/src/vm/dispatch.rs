use anchor_lang::prelude::*;
use solana_program::keccak;

use super::OpEntry;
use crate::error::ScriptError;

/// Standard library followed by host operations. Host opcode ids start
/// at `standard_len()`.
pub struct DispatchTable<H> {
    standard: Vec<OpEntry<H>>,
    host: Vec<OpEntry<H>>,
    fingerprint: [u8; 32],
}

impl<H> DispatchTable<H> {
    pub fn build(standard: Vec<OpEntry<H>>, host: Vec<OpEntry<H>>) -> Result<Self> {
        let total = standard.len() + host.len();
        require!(total <= u16::MAX as usize, ScriptError::TooManyOpcodes);

        let mut names: Vec<&str> = standard.iter().chain(host.iter()).map(|e| e.name).collect();
        names.sort_unstable();
        require!(
            names.windows(2).all(|pair| pair[0] != pair[1]),
            ScriptError::DuplicateOpcode
        );

        let mut descriptors = Vec::new();
        for entry in standard.iter().chain(host.iter()) {
            descriptors.extend_from_slice(&entry.descriptor());
        }
        let fingerprint = keccak::hash(&descriptors).0;

        Ok(Self {
            standard,
            host,
            fingerprint,
        })
    }

    pub fn len(&self) -> usize {
        self.standard.len() + self.host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn standard_len(&self) -> usize {
        self.standard.len()
    }

    pub fn resolve(&self, opcode: u16) -> Option<&OpEntry<H>> {
        let id = opcode as usize;
        if id < self.standard.len() {
            self.standard.get(id)
        } else {
            self.host.get(id - self.standard.len())
        }
    }

    pub fn id_of(&self, name: &str) -> Option<u16> {
        self.standard
            .iter()
            .chain(self.host.iter())
            .position(|e| e.name == name)
            .map(|id| id as u16)
    }

    /// Keccak of every entry's name, operand kind and arity, in id order.
    /// Stored scripts are only evaluated against a table with the same value.
    pub fn fingerprint(&self) -> [u8; 32] {
        self.fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{standard_ops, Arity, Env, Machine, Operand};

    struct NoHost;

    impl Env for NoHost {
        fn block_timestamp(&self) -> u64 {
            0
        }
    }

    fn noop(_m: &mut Machine<'_, NoHost>, _operand: u16) -> Result<()> {
        Ok(())
    }

    fn host_op(name: &'static str) -> OpEntry<NoHost> {
        OpEntry::new(name, Operand::None, Arity::fixed(0, 1), noop)
    }

    #[test]
    fn host_ids_follow_standard_ids() {
        let table = DispatchTable::build(standard_ops(), vec![host_op("alpha"), host_op("beta")])
            .unwrap();
        let base = table.standard_len() as u16;
        assert_eq!(table.len(), table.standard_len() + 2);
        assert_eq!(table.id_of("constant"), Some(0));
        assert_eq!(table.id_of("alpha"), Some(base));
        assert_eq!(table.id_of("beta"), Some(base + 1));
        assert_eq!(table.resolve(base + 1).unwrap().name, "beta");
        assert!(table.resolve(base + 2).is_none());
        assert!(table.id_of("gamma").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = DispatchTable::build(standard_ops(), vec![host_op("add")])
            .err()
            .unwrap();
        assert_eq!(err, ScriptError::DuplicateOpcode.into());
    }

    #[test]
    fn fingerprint_tracks_table_shape() {
        let a = DispatchTable::build(standard_ops(), vec![host_op("alpha")]).unwrap();
        let b = DispatchTable::build(standard_ops(), vec![host_op("alpha")]).unwrap();
        let c = DispatchTable::build(standard_ops(), vec![host_op("beta")]).unwrap();
        let d = DispatchTable::build(
            standard_ops(),
            vec![OpEntry::new("alpha", Operand::Count, Arity::Counted, noop)],
        )
        .unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_ne!(a.fingerprint(), d.fingerprint());
    }
}

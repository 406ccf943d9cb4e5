// ======================================================================
// SALE HOST
// ======================================================================
//
// Read-only view of a sale handed to the VM, and the domain opcodes
// appended after the standard library:
//
//   storage        slot -> counter        (0 -> 1)
//   total_supply   minted - burned        (0 -> 1)
//   total_minted                          (0 -> 1)
//   number_minted  account -> count       (1 -> 1)
//   number_burned  account -> count       (1 -> 1)
//
// Per-account counters are only available for the account the view was
// built for. An account without a ledger has minted and burned nothing.
// ======================================================================

use anchor_lang::prelude::*;

use crate::error::ScriptError;
use crate::state::{HolderLedger, Sale};
use crate::vm::{
    evaluate_with_capacity, key_from_word, standard_ops, word_from_key, Arity, DispatchTable, Env,
    Machine, OpEntry, Operand, Quote, Word,
};

pub const CONTEXT_ACCOUNT: usize = 0;
pub const CONTEXT_UNITS: usize = 1;
pub const CONTEXT_LEN: usize = 2;

/// Source evaluated for quotes and purchases.
pub const CALCULATE_SOURCE: usize = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum StorageSlot {
    SupplyLimit = 0,
    TotalMinted = 1,
    TotalSupply = 2,
    AmountPaid = 3,
    AmountWithdrawn = 4,
    AmountPayable = 5,
}

impl StorageSlot {
    pub const COUNT: u16 = 6;

    pub fn from_operand(operand: u16) -> Option<Self> {
        Some(match operand {
            0 => StorageSlot::SupplyLimit,
            1 => StorageSlot::TotalMinted,
            2 => StorageSlot::TotalSupply,
            3 => StorageSlot::AmountPaid,
            4 => StorageSlot::AmountWithdrawn,
            5 => StorageSlot::AmountPayable,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HolderCounters {
    pub holder: Pubkey,
    pub minted: u64,
    pub burned: u64,
}

impl HolderCounters {
    /// Counters for an account that has no ledger yet.
    pub fn empty(holder: Pubkey) -> Self {
        Self {
            holder,
            minted: 0,
            burned: 0,
        }
    }
}

impl From<&HolderLedger> for HolderCounters {
    fn from(ledger: &HolderLedger) -> Self {
        Self {
            holder: ledger.holder,
            minted: ledger.minted,
            burned: ledger.burned,
        }
    }
}

/// Snapshot of sale counters taken before evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaleView {
    pub supply_limit: u64,
    pub total_minted: u64,
    pub total_burned: u64,
    pub amount_paid: u64,
    pub amount_withdrawn: u64,
    pub timestamp: i64,
    pub holder: Option<HolderCounters>,
}

impl SaleView {
    pub fn new(sale: &Sale, holder: Option<HolderCounters>, timestamp: i64) -> Self {
        Self {
            supply_limit: sale.supply_limit,
            total_minted: sale.total_minted,
            total_burned: sale.total_burned,
            amount_paid: sale.amount_paid,
            amount_withdrawn: sale.amount_withdrawn,
            timestamp,
            holder,
        }
    }

    /// View for a quote on behalf of `account`. `ledger` is the account's
    /// ledger if it exists.
    pub fn for_account(
        sale: &Sale,
        account: Pubkey,
        ledger: Option<&HolderLedger>,
        timestamp: i64,
    ) -> Self {
        let holder = match ledger {
            Some(ledger) => HolderCounters::from(ledger),
            None => HolderCounters::empty(account),
        };
        Self::new(sale, Some(holder), timestamp)
    }

    pub fn read(&self, slot: StorageSlot) -> u64 {
        match slot {
            StorageSlot::SupplyLimit => self.supply_limit,
            StorageSlot::TotalMinted => self.total_minted,
            StorageSlot::TotalSupply => self.total_minted.saturating_sub(self.total_burned),
            StorageSlot::AmountPaid => self.amount_paid,
            StorageSlot::AmountWithdrawn => self.amount_withdrawn,
            StorageSlot::AmountPayable => self.amount_paid.saturating_sub(self.amount_withdrawn),
        }
    }

    /// Counters for `account`. Accounts without a loaded ledger fail.
    pub fn counters(&self, account: &Pubkey) -> Result<&HolderCounters> {
        match &self.holder {
            Some(counters) if counters.holder == *account => Ok(counters),
            _ => err!(ScriptError::UnknownAccount),
        }
    }
}

impl Env for SaleView {
    fn block_timestamp(&self) -> u64 {
        self.timestamp.max(0) as u64
    }
}

// ======================================================================
// HOST OPCODES
// ======================================================================

pub fn host_ops() -> Vec<OpEntry<SaleView>> {
    vec![
        OpEntry::new(
            "storage",
            Operand::Slot {
                count: StorageSlot::COUNT,
            },
            Arity::fixed(0, 1),
            op_storage,
        ),
        OpEntry::new("total_supply", Operand::None, Arity::fixed(0, 1), op_total_supply),
        OpEntry::new("total_minted", Operand::None, Arity::fixed(0, 1), op_total_minted),
        OpEntry::new("number_minted", Operand::None, Arity::fixed(1, 1), op_number_minted),
        OpEntry::new("number_burned", Operand::None, Arity::fixed(1, 1), op_number_burned),
    ]
}

pub fn sale_table() -> Result<DispatchTable<SaleView>> {
    DispatchTable::build(standard_ops(), host_ops())
}

fn op_storage(m: &mut Machine<'_, SaleView>, operand: u16) -> Result<()> {
    let slot = StorageSlot::from_operand(operand).ok_or(ScriptError::UnknownStorageSlot)?;
    let value = m.host().read(slot);
    m.push(Word::from(value))
}

fn op_total_supply(m: &mut Machine<'_, SaleView>, _operand: u16) -> Result<()> {
    let value = m.host().read(StorageSlot::TotalSupply);
    m.push(Word::from(value))
}

fn op_total_minted(m: &mut Machine<'_, SaleView>, _operand: u16) -> Result<()> {
    let value = m.host().read(StorageSlot::TotalMinted);
    m.push(Word::from(value))
}

fn op_number_minted(m: &mut Machine<'_, SaleView>, _operand: u16) -> Result<()> {
    let account = key_from_word(m.pop()?);
    let minted = m.host().counters(&account)?.minted;
    m.push(Word::from(minted))
}

fn op_number_burned(m: &mut Machine<'_, SaleView>, _operand: u16) -> Result<()> {
    let account = key_from_word(m.pop()?);
    let burned = m.host().counters(&account)?.burned;
    m.push(Word::from(burned))
}

// ======================================================================
// QUOTE
// ======================================================================

/// Evaluates the sale's script for `account` requesting `units`.
pub fn quote(
    table: &DispatchTable<SaleView>,
    sale: &Sale,
    view: &SaleView,
    account: &Pubkey,
    units: u64,
) -> Result<Quote> {
    require!(
        table.fingerprint() == sale.dispatch_fingerprint,
        ScriptError::DispatchTableMismatch
    );
    let mut context = [Word::ZERO; CONTEXT_LEN];
    context[CONTEXT_ACCOUNT] = word_from_key(account);
    context[CONTEXT_UNITS] = Word::from(units);
    evaluate_with_capacity(
        table,
        &sale.script,
        CALCULATE_SOURCE,
        &context,
        view,
        sale.max_stack_depth as usize,
    )
}

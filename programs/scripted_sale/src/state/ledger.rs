use anchor_lang::prelude::*;

use crate::error::SaleError;

/// Per-holder mint/burn counters for one sale.
#[account]
#[derive(Default, Debug)]
pub struct HolderLedger {
    pub sale: Pubkey,
    pub holder: Pubkey,
    pub minted: u64,
    pub burned: u64,
    pub bump: u8,
}

impl HolderLedger {
    pub const SIZE: usize = 8 + 32 + 32 + 8 + 8 + 1;

    /// Binds a freshly created ledger. No-op once bound.
    pub fn bind(&mut self, sale: Pubkey, holder: Pubkey, bump: u8) {
        if self.sale == Pubkey::default() {
            self.sale = sale;
            self.holder = holder;
            self.bump = bump;
        }
    }

    pub fn balance(&self) -> u64 {
        self.minted.saturating_sub(self.burned)
    }

    pub fn record_mint(&mut self, units: u64) -> Result<()> {
        self.minted = self.minted.checked_add(units).ok_or(SaleError::Overflow)?;
        Ok(())
    }

    pub fn record_burn(&mut self, units: u64) -> Result<()> {
        require!(units > 0, SaleError::ZeroUnits);
        require!(units <= self.balance(), SaleError::InsufficientBalance);
        self.burned = self.burned.checked_add(units).ok_or(SaleError::Overflow)?;
        Ok(())
    }
}

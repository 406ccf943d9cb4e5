use anchor_lang::prelude::*;

use crate::error::SaleError;
use crate::vm::{Script, ScriptInfo};
use crate::{BPS_DENOM, MAX_ROYALTY_BPS, MAX_SUPPLY_LIMIT};

// ======================================================================
// CONFIGURATION
// ======================================================================

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Currency {
    #[default]
    Native,
    Token { mint: Pubkey },
}

impl Currency {
    pub const SIZE: usize = 1 + 32;
}

/// One-shot sale configuration passed to `initialize_sale`.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug)]
pub struct SaleConfig {
    pub script: Script,
    pub supply_limit: u64,
    /// 0 = unlimited
    pub max_per_wallet: u64,
    pub currency: Currency,
    pub recipient: Pubkey,
    pub delegated_minter: Option<Pubkey>,
    pub royalty_bps: u16,
    pub royalty_recipient: Pubkey,
}

// ======================================================================
// SALE ACCOUNT
// ======================================================================

#[account]
#[derive(Default, Debug)]
pub struct Sale {
    pub owner: Pubkey,
    pub sale_id: u64,
    pub initialized: bool,

    pub recipient: Pubkey,
    pub delegated_minter: Option<Pubkey>,
    pub currency: Currency,

    pub supply_limit: u64,
    pub max_per_wallet: u64,
    /// Units minted or reserved, less forfeited reservations.
    pub allocated: u64,
    pub total_minted: u64,
    pub total_burned: u64,

    pub amount_paid: u64,
    pub amount_withdrawn: u64,

    pub royalty_bps: u16,
    pub royalty_recipient: Pubkey,

    // Dispatch table the script was validated against.
    pub dispatch_fingerprint: [u8; 32],
    pub max_stack_depth: u16,

    pub bump: u8,
    pub vault_bump: u8,

    pub script: Script,
}

impl Sale {
    pub fn space(script: &Script) -> usize {
        8 // discriminator
            + 32 + 8 + 1
            + 32 + (1 + 32) + Currency::SIZE
            + 8 + 8 + 8 + 8 + 8
            + 8 + 8
            + 2 + 32
            + 32 + 2
            + 1 + 1
            + script.space()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn configure(
        &mut self,
        owner: Pubkey,
        sale_id: u64,
        config: SaleConfig,
        info: ScriptInfo,
        dispatch_fingerprint: [u8; 32],
        bump: u8,
    ) -> Result<()> {
        require!(!self.initialized, SaleError::AlreadyInitialized);
        require!(
            config.supply_limit >= 1 && config.supply_limit <= MAX_SUPPLY_LIMIT,
            SaleError::InvalidSupplyLimit
        );
        require!(config.royalty_bps <= MAX_ROYALTY_BPS, SaleError::RoyaltyTooHigh);

        self.owner = owner;
        self.sale_id = sale_id;
        self.initialized = true;
        self.recipient = config.recipient;
        self.delegated_minter = config.delegated_minter;
        self.currency = config.currency;
        self.supply_limit = config.supply_limit;
        self.max_per_wallet = config.max_per_wallet;
        self.royalty_bps = config.royalty_bps;
        self.royalty_recipient = config.royalty_recipient;
        self.dispatch_fingerprint = dispatch_fingerprint;
        self.max_stack_depth = info.max_stack_depth;
        self.bump = bump;
        self.script = config.script;
        Ok(())
    }

    pub fn available(&self) -> u64 {
        self.supply_limit.saturating_sub(self.allocated)
    }

    pub fn total_supply(&self) -> u64 {
        self.total_minted.saturating_sub(self.total_burned)
    }

    pub fn amount_payable(&self) -> u64 {
        self.amount_paid.saturating_sub(self.amount_withdrawn)
    }

    pub fn wallet_remaining(&self, minted_by_wallet: u64) -> u64 {
        if self.max_per_wallet == 0 {
            u64::MAX
        } else {
            self.max_per_wallet.saturating_sub(minted_by_wallet)
        }
    }

    /// Takes `units` out of remaining stock.
    pub fn allocate(&mut self, units: u64) -> Result<()> {
        require!(units <= self.available(), SaleError::MaxLimit);
        self.allocated = self.allocated.checked_add(units).ok_or(SaleError::Overflow)?;
        Ok(())
    }

    /// Returns forfeited reservations to stock.
    pub fn release(&mut self, units: u64) -> Result<()> {
        self.allocated = self.allocated.checked_sub(units).ok_or(SaleError::Overflow)?;
        Ok(())
    }

    pub fn record_mint(&mut self, units: u64, cost: u64) -> Result<()> {
        self.allocate(units)?;
        self.total_minted = self.total_minted.checked_add(units).ok_or(SaleError::Overflow)?;
        self.record_payment(cost)
    }

    pub fn record_payment(&mut self, cost: u64) -> Result<()> {
        self.amount_paid = self.amount_paid.checked_add(cost).ok_or(SaleError::Overflow)?;
        Ok(())
    }

    /// Reserved units were allocated at commit.
    pub fn record_claim(&mut self, units: u64) -> Result<()> {
        self.total_minted = self.total_minted.checked_add(units).ok_or(SaleError::Overflow)?;
        Ok(())
    }

    pub fn record_burn(&mut self, units: u64) -> Result<()> {
        self.total_burned = self.total_burned.checked_add(units).ok_or(SaleError::Overflow)?;
        Ok(())
    }

    pub fn record_withdrawal(&mut self, amount: u64) -> Result<()> {
        require!(amount <= self.amount_payable(), SaleError::InsufficientPayable);
        self.amount_withdrawn = self
            .amount_withdrawn
            .checked_add(amount)
            .ok_or(SaleError::Overflow)?;
        Ok(())
    }

    /// `(receiver, amount)` owed on a secondary sale at `sale_price`.
    pub fn royalty(&self, sale_price: u64) -> Result<(Pubkey, u64)> {
        let amount = (sale_price as u128)
            .checked_mul(self.royalty_bps as u128)
            .ok_or(SaleError::Overflow)?
            / BPS_DENOM as u128;
        Ok((self.royalty_recipient, amount as u64))
    }
}

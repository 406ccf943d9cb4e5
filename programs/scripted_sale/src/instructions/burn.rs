use anchor_lang::prelude::*;

use crate::error::SaleError;
use crate::state::{HolderLedger, Sale};
use crate::{LEDGER_SEED, SALE_SEED};

#[event]
pub struct UnitsBurned {
    pub sale: Pubkey,
    pub holder: Pubkey,
    pub units: u64,
}

/// Burns `units` of the signer's balance. Burned units do not return to
/// the sale's stock.
pub fn burn(ctx: Context<BurnUnits>, units: u64) -> Result<()> {
    let accounts = ctx.accounts;
    accounts.ledger.record_burn(units)?;
    accounts.sale.record_burn(units)?;

    msg!(
        "Burned {} units from {} (balance {})",
        units,
        accounts.holder.key(),
        accounts.ledger.balance()
    );

    emit!(UnitsBurned {
        sale: accounts.sale.key(),
        holder: accounts.holder.key(),
        units,
    });

    Ok(())
}

#[derive(Accounts)]
pub struct BurnUnits<'info> {
    #[account(
        mut,
        seeds = [SALE_SEED, sale.owner.as_ref(), &sale.sale_id.to_le_bytes()],
        bump = sale.bump
    )]
    pub sale: Box<Account<'info, Sale>>,

    #[account(
        mut,
        seeds = [LEDGER_SEED, sale.key().as_ref(), holder.key().as_ref()],
        bump = ledger.bump,
        has_one = holder @ SaleError::Unauthorized
    )]
    pub ledger: Account<'info, HolderLedger>,

    pub holder: Signer<'info>,
}

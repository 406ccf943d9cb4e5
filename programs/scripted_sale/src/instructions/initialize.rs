use anchor_lang::prelude::*;
use anchor_spl::token_interface::{Mint, TokenAccount, TokenInterface};

use crate::error::SaleError;
use crate::host::{sale_table, CONTEXT_LEN};
use crate::state::{Currency, Sale, SaleConfig, Shuffle};
use crate::vm::{disassemble, validate};
use crate::{SALE_SEED, SHUFFLE_SEED, VAULT_SEED};

// ======================================================================
// EVENTS
// ======================================================================

#[event]
pub struct SaleInitialized {
    pub sale: Pubkey,
    pub owner: Pubkey,
    pub sale_id: u64,
    pub supply_limit: u64,
    pub currency: Currency,
    pub dispatch_fingerprint: [u8; 32],
}

// ======================================================================
// INSTRUCTIONS
// ======================================================================

/// One-shot sale configuration. The script is validated against the
/// sale dispatch table and pinned to its fingerprint.
///
/// # Errors
/// - `ScriptError::*` if the script fails validation
/// - `SaleError::InvalidSupplyLimit` / `SaleError::RoyaltyTooHigh` on bad bounds
/// - `SaleError::AlreadyInitialized` if the sale was configured before
#[allow(clippy::needless_pass_by_value)] // Anchor requires Context by value
pub fn initialize_sale(
    ctx: Context<InitializeSale>,
    sale_id: u64,
    config: SaleConfig,
) -> Result<()> {
    let table = sale_table()?;
    let info = validate(&table, &config.script, CONTEXT_LEN)?;
    msg!("Sale script:\n{}", disassemble(&table, &config.script));

    let owner = ctx.accounts.owner.key();
    let sale_key = ctx.accounts.sale.key();
    let sale = &mut ctx.accounts.sale;
    sale.configure(
        owner,
        sale_id,
        config,
        info,
        table.fingerprint(),
        ctx.bumps.sale,
    )?;
    ctx.accounts.shuffle.bind(sale_key, ctx.bumps.shuffle);

    msg!(
        "Sale {} initialized: supply_limit={}, max_stack_depth={}",
        sale_id,
        sale.supply_limit,
        sale.max_stack_depth
    );

    emit!(SaleInitialized {
        sale: sale_key,
        owner,
        sale_id,
        supply_limit: sale.supply_limit,
        currency: sale.currency,
        dispatch_fingerprint: sale.dispatch_fingerprint,
    });

    Ok(())
}

/// Creates the sale-owned token account that receives fungible payments.
pub fn init_payment_vault(ctx: Context<InitPaymentVault>) -> Result<()> {
    let sale = &mut ctx.accounts.sale;
    let Currency::Token { mint } = sale.currency else {
        return err!(SaleError::CurrencyMismatch);
    };
    require_keys_eq!(
        ctx.accounts.currency_mint.key(),
        mint,
        SaleError::CurrencyMismatch
    );
    sale.vault_bump = ctx.bumps.vault;

    msg!("Payment vault {} created for mint {}", ctx.accounts.vault.key(), mint);
    Ok(())
}

// ======================================================================
// ACCOUNTS
// ======================================================================

#[derive(Accounts)]
#[instruction(sale_id: u64, config: SaleConfig)]
pub struct InitializeSale<'info> {
    #[account(
        init,
        payer = owner,
        space = Sale::space(&config.script),
        seeds = [SALE_SEED, owner.key().as_ref(), &sale_id.to_le_bytes()],
        bump
    )]
    pub sale: Box<Account<'info, Sale>>,

    #[account(
        init,
        payer = owner,
        space = Shuffle::space(config.supply_limit),
        seeds = [SHUFFLE_SEED, sale.key().as_ref()],
        bump
    )]
    pub shuffle: Box<Account<'info, Shuffle>>,

    #[account(mut)]
    pub owner: Signer<'info>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct InitPaymentVault<'info> {
    #[account(
        mut,
        seeds = [SALE_SEED, sale.owner.as_ref(), &sale.sale_id.to_le_bytes()],
        bump = sale.bump,
        has_one = owner @ SaleError::Unauthorized
    )]
    pub sale: Box<Account<'info, Sale>>,

    #[account(
        init,
        payer = owner,
        seeds = [VAULT_SEED, sale.key().as_ref()],
        bump,
        token::mint = currency_mint,
        token::authority = sale,
        token::token_program = token_program
    )]
    pub vault: InterfaceAccount<'info, TokenAccount>,

    pub currency_mint: InterfaceAccount<'info, Mint>,

    #[account(mut)]
    pub owner: Signer<'info>,

    pub token_program: Interface<'info, TokenInterface>,
    pub system_program: Program<'info, System>,
}

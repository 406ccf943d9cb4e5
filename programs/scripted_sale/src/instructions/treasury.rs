use anchor_lang::prelude::*;
use anchor_spl::token_interface::{self, Mint, TokenAccount, TokenInterface};

use crate::error::SaleError;
use crate::state::{Currency, Sale};
use crate::{SALE_SEED, VAULT_SEED};

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoyaltyQuote {
    pub receiver: Pubkey,
    pub amount: u64,
}

#[event]
pub struct FundsWithdrawn {
    pub sale: Pubkey,
    pub recipient: Pubkey,
    pub amount: u64,
}

/// Moves up to the payable balance to the sale's recipient.
///
/// # Errors
/// - `SaleError::Unauthorized` if the signer is not the owner
/// - `SaleError::InsufficientPayable` if `amount` exceeds paid minus withdrawn
/// - `SaleError::MissingPaymentAccounts` for token sales without vault accounts
pub fn withdraw(ctx: Context<Withdraw>, amount: u64) -> Result<()> {
    require!(amount > 0, SaleError::InsufficientPayable);
    let sale_key = ctx.accounts.sale.key();
    let recipient = ctx.accounts.sale.recipient;
    ctx.accounts.sale.record_withdrawal(amount)?;

    match ctx.accounts.sale.currency {
        Currency::Native => {
            // Only paid-in lamports are withdrawable, so rent stays put.
            let sale_info = ctx.accounts.sale.to_account_info();
            let recipient_info = ctx.accounts.recipient.to_account_info();

            let sale_lamports = sale_info.lamports();
            **sale_info.try_borrow_mut_lamports()? = sale_lamports
                .checked_sub(amount)
                .ok_or(SaleError::InsufficientPayable)?;

            let recipient_lamports = recipient_info.lamports();
            **recipient_info.try_borrow_mut_lamports()? = recipient_lamports
                .checked_add(amount)
                .ok_or(SaleError::Overflow)?;
        }
        Currency::Token { mint } => {
            let accounts = &ctx.accounts;
            let (Some(vault), Some(destination), Some(currency_mint), Some(token_program)) = (
                accounts.vault.as_ref(),
                accounts.recipient_token_account.as_ref(),
                accounts.currency_mint.as_ref(),
                accounts.token_program.as_ref(),
            ) else {
                return err!(SaleError::MissingPaymentAccounts);
            };
            require_keys_eq!(currency_mint.key(), mint, SaleError::CurrencyMismatch);
            require_keys_eq!(destination.owner, recipient, SaleError::Unauthorized);

            let sale = &accounts.sale;
            let sale_id = sale.sale_id.to_le_bytes();
            let bump = [sale.bump];
            let seeds: &[&[u8]] = &[SALE_SEED, sale.owner.as_ref(), &sale_id, &bump];
            let signer = &[seeds];

            let decimals = currency_mint.decimals;
            let cpi_accounts = token_interface::TransferChecked {
                from: vault.to_account_info(),
                mint: currency_mint.to_account_info(),
                to: destination.to_account_info(),
                authority: sale.to_account_info(),
            };
            let cpi_ctx = CpiContext::new_with_signer(
                token_program.to_account_info(),
                cpi_accounts,
                signer,
            );
            token_interface::transfer_checked(cpi_ctx, amount, decimals)?;
        }
    }

    msg!("Withdrew {} to {}", amount, recipient);

    emit!(FundsWithdrawn {
        sale: sale_key,
        recipient,
        amount,
    });

    Ok(())
}

/// Royalty owed on a secondary sale at `sale_price`, as return data.
#[allow(clippy::needless_pass_by_value)] // Anchor requires Context by value
pub fn royalty_info(ctx: Context<RoyaltyInfo>, sale_price: u64) -> Result<RoyaltyQuote> {
    let (receiver, amount) = ctx.accounts.sale.royalty(sale_price)?;
    Ok(RoyaltyQuote { receiver, amount })
}

#[derive(Accounts)]
pub struct Withdraw<'info> {
    #[account(
        mut,
        seeds = [SALE_SEED, sale.owner.as_ref(), &sale.sale_id.to_le_bytes()],
        bump = sale.bump,
        has_one = owner @ SaleError::Unauthorized,
        has_one = recipient @ SaleError::Unauthorized
    )]
    pub sale: Box<Account<'info, Sale>>,

    pub owner: Signer<'info>,

    /// CHECK: pinned to sale.recipient
    #[account(mut)]
    pub recipient: UncheckedAccount<'info>,

    // Token sales only
    #[account(
        mut,
        seeds = [VAULT_SEED, sale.key().as_ref()],
        bump = sale.vault_bump
    )]
    pub vault: Option<InterfaceAccount<'info, TokenAccount>>,

    #[account(mut)]
    pub recipient_token_account: Option<InterfaceAccount<'info, TokenAccount>>,

    pub currency_mint: Option<InterfaceAccount<'info, Mint>>,
    pub token_program: Option<Interface<'info, TokenInterface>>,
}

#[derive(Accounts)]
pub struct RoyaltyInfo<'info> {
    #[account(
        seeds = [SALE_SEED, sale.owner.as_ref(), &sale.sale_id.to_le_bytes()],
        bump = sale.bump
    )]
    pub sale: Box<Account<'info, Sale>>,
}

use anchor_lang::prelude::*;
use anchor_lang::system_program;
use anchor_spl::token_interface::{self, Mint, TokenAccount, TokenInterface};

use crate::error::SaleError;
use crate::host::{quote, sale_table, SaleView};
use crate::state::{Currency, HolderLedger, Sale};
use crate::vm::{word_to_u64, Quote};
use crate::{LEDGER_SEED, SALE_SEED, VAULT_SEED};

// ======================================================================
// TYPES
// ======================================================================

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintRequest {
    pub desired_units: u64,
    pub minimum_units: u64,
    /// Highest unit price the buyer accepts.
    pub maximum_price: u64,
}

/// Script quote narrowed to `u64`. `max_units` saturates, `price` must fit.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaleQuote {
    pub max_units: u64,
    pub price: u64,
}

impl SaleQuote {
    pub fn from_quote(quote: Quote) -> Result<Self> {
        Ok(Self {
            max_units: word_to_u64(quote.max_units).unwrap_or(u64::MAX),
            price: word_to_u64(quote.price).ok_or(SaleError::PriceOverflow)?,
        })
    }
}

/// Script quote for `account` requesting `units`. `ledger` is the
/// account's ledger if one exists yet.
pub fn quote_for(
    sale: &Sale,
    account: Pubkey,
    ledger: Option<&HolderLedger>,
    units: u64,
    now: i64,
) -> Result<SaleQuote> {
    let table = sale_table()?;
    let view = SaleView::for_account(sale, account, ledger, now);
    SaleQuote::from_quote(quote(&table, sale, &view, &account, units)?)
}

/// Units a purchase settles for. Price is checked before quantity.
pub fn settle(
    request: &MintRequest,
    quote: SaleQuote,
    available: u64,
    wallet_remaining: u64,
) -> Result<u64> {
    require!(
        quote.price <= request.maximum_price,
        SaleError::PriceAboveMaximum
    );
    let units = request
        .desired_units
        .min(quote.max_units)
        .min(available)
        .min(wallet_remaining);
    require!(units >= request.minimum_units, SaleError::BelowMinimumUnits);
    require!(units > 0, SaleError::NoUnitsAvailable);
    Ok(units)
}

// ======================================================================
// PAYMENT
// ======================================================================

/// Accounts that move a payment from the buyer into the sale.
pub struct Payment<'a, 'info> {
    pub payer: &'a Signer<'info>,
    pub payer_token_account: Option<&'a InterfaceAccount<'info, TokenAccount>>,
    pub vault: Option<&'a InterfaceAccount<'info, TokenAccount>>,
    pub currency_mint: Option<&'a InterfaceAccount<'info, Mint>>,
    pub token_program: Option<&'a Interface<'info, TokenInterface>>,
    pub system_program: &'a Program<'info, System>,
}

impl<'a, 'info> Payment<'a, 'info> {
    /// Native payments land on the sale account itself, token payments
    /// in the sale vault.
    pub fn collect(&self, sale: &Account<'info, Sale>, cost: u64) -> Result<()> {
        if cost == 0 {
            return Ok(());
        }
        match sale.currency {
            Currency::Native => {
                require!(
                    self.payer.lamports() >= cost,
                    SaleError::InsufficientFunds
                );
                let cpi_accounts = system_program::Transfer {
                    from: self.payer.to_account_info(),
                    to: sale.to_account_info(),
                };
                let cpi_ctx =
                    CpiContext::new(self.system_program.to_account_info(), cpi_accounts);
                system_program::transfer(cpi_ctx, cost)
            }
            Currency::Token { mint } => {
                let (Some(from), Some(vault), Some(currency_mint), Some(token_program)) = (
                    self.payer_token_account,
                    self.vault,
                    self.currency_mint,
                    self.token_program,
                ) else {
                    return err!(SaleError::MissingPaymentAccounts);
                };
                require_keys_eq!(currency_mint.key(), mint, SaleError::CurrencyMismatch);
                require_keys_eq!(from.mint, mint, SaleError::CurrencyMismatch);
                require!(from.amount >= cost, SaleError::InsufficientFunds);

                let decimals = currency_mint.decimals;
                let cpi_accounts = token_interface::TransferChecked {
                    from: from.to_account_info(),
                    mint: currency_mint.to_account_info(),
                    to: vault.to_account_info(),
                    authority: self.payer.to_account_info(),
                };
                let cpi_ctx = CpiContext::new(token_program.to_account_info(), cpi_accounts);
                token_interface::transfer_checked(cpi_ctx, cost, decimals)
            }
        }
    }
}

// ======================================================================
// EVENTS
// ======================================================================

#[event]
pub struct UnitsMinted {
    pub sale: Pubkey,
    pub recipient: Pubkey,
    pub payer: Pubkey,
    pub units: u64,
    pub price: u64,
    pub cost: u64,
}

// ======================================================================
// INSTRUCTIONS
// ======================================================================

/// Read-only quote for `account` requesting `units`, returned as
/// return data. Uses the same evaluation as a purchase.
#[allow(clippy::needless_pass_by_value)] // Anchor requires Context by value
pub fn calculate(ctx: Context<Calculate>, account: Pubkey, units: u64) -> Result<SaleQuote> {
    let now = Clock::get()?.unix_timestamp;
    let ledger = ctx.accounts.ledger.as_deref();
    quote_for(&ctx.accounts.sale, account, ledger, units, now)
}

/// Purchase for the signer.
///
/// # Errors
/// - `SaleError::Unauthorized` if recipient is not the payer
/// - `SaleError::PriceAboveMaximum`, `BelowMinimumUnits`, `NoUnitsAvailable`
///   when the quote does not satisfy the request
/// - `SaleError::InsufficientFunds` if the payer cannot cover the cost
pub fn mint(ctx: Context<MintUnits>, request: MintRequest) -> Result<()> {
    require_keys_eq!(
        ctx.accounts.recipient.key(),
        ctx.accounts.payer.key(),
        SaleError::Unauthorized
    );
    purchase(ctx, request)
}

/// Purchase on behalf of `recipient` by the sale's delegated minter.
pub fn mint_for(ctx: Context<MintUnits>, request: MintRequest) -> Result<()> {
    let minter = ctx
        .accounts
        .sale
        .delegated_minter
        .ok_or(SaleError::Unauthorized)?;
    require_keys_eq!(minter, ctx.accounts.payer.key(), SaleError::Unauthorized);
    purchase(ctx, request)
}

fn purchase(ctx: Context<MintUnits>, request: MintRequest) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let sale_key = ctx.accounts.sale.key();
    let recipient = ctx.accounts.recipient.key();
    ctx.accounts
        .ledger
        .bind(sale_key, recipient, ctx.bumps.ledger);

    let ledger: &HolderLedger = &ctx.accounts.ledger;
    let q = quote_for(
        &ctx.accounts.sale,
        recipient,
        Some(ledger),
        request.desired_units,
        now,
    )?;

    let units = settle(
        &request,
        q,
        ctx.accounts.sale.available(),
        ctx.accounts.sale.wallet_remaining(ledger.minted),
    )?;
    let cost = units.checked_mul(q.price).ok_or(SaleError::Overflow)?;

    ctx.accounts.payment().collect(&ctx.accounts.sale, cost)?;

    let accounts = ctx.accounts;
    accounts.sale.record_mint(units, cost)?;
    accounts.ledger.record_mint(units)?;

    msg!(
        "Minted {} units to {} at {} each ({} total)",
        units,
        recipient,
        q.price,
        cost
    );

    emit!(UnitsMinted {
        sale: sale_key,
        recipient,
        payer: accounts.payer.key(),
        units,
        price: q.price,
        cost,
    });

    Ok(())
}

// ======================================================================
// ACCOUNTS
// ======================================================================

#[derive(Accounts)]
#[instruction(account: Pubkey)]
pub struct Calculate<'info> {
    #[account(
        seeds = [SALE_SEED, sale.owner.as_ref(), &sale.sale_id.to_le_bytes()],
        bump = sale.bump
    )]
    pub sale: Box<Account<'info, Sale>>,

    /// Absent until the account first mints or claims.
    #[account(
        seeds = [LEDGER_SEED, sale.key().as_ref(), account.as_ref()],
        bump = ledger.bump
    )]
    pub ledger: Option<Account<'info, HolderLedger>>,
}

#[derive(Accounts)]
pub struct MintUnits<'info> {
    #[account(
        mut,
        seeds = [SALE_SEED, sale.owner.as_ref(), &sale.sale_id.to_le_bytes()],
        bump = sale.bump
    )]
    pub sale: Box<Account<'info, Sale>>,

    #[account(
        init_if_needed,
        payer = payer,
        space = HolderLedger::SIZE,
        seeds = [LEDGER_SEED, sale.key().as_ref(), recipient.key().as_ref()],
        bump
    )]
    pub ledger: Box<Account<'info, HolderLedger>>,

    /// CHECK: only used as the ledger key
    pub recipient: UncheckedAccount<'info>,

    #[account(mut)]
    pub payer: Signer<'info>,

    // Token payments only
    #[account(mut)]
    pub payer_token_account: Option<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        seeds = [VAULT_SEED, sale.key().as_ref()],
        bump = sale.vault_bump
    )]
    pub vault: Option<InterfaceAccount<'info, TokenAccount>>,

    pub currency_mint: Option<InterfaceAccount<'info, Mint>>,
    pub token_program: Option<Interface<'info, TokenInterface>>,

    pub system_program: Program<'info, System>,
}

impl<'info> MintUnits<'info> {
    pub fn payment(&self) -> Payment<'_, 'info> {
        Payment {
            payer: &self.payer,
            payer_token_account: self.payer_token_account.as_ref(),
            vault: self.vault.as_ref(),
            currency_mint: self.currency_mint.as_ref(),
            token_program: self.token_program.as_ref(),
            system_program: &self.system_program,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Word;

    fn request(desired_units: u64, minimum_units: u64, maximum_price: u64) -> MintRequest {
        MintRequest {
            desired_units,
            minimum_units,
            maximum_price,
        }
    }

    fn q(max_units: u64, price: u64) -> SaleQuote {
        SaleQuote { max_units, price }
    }

    #[test]
    fn units_are_the_tightest_limit() {
        assert_eq!(settle(&request(5, 1, 10), q(8, 10), 100, 100).unwrap(), 5);
        assert_eq!(settle(&request(5, 1, 10), q(3, 10), 100, 100).unwrap(), 3);
        assert_eq!(settle(&request(5, 1, 10), q(8, 10), 2, 100).unwrap(), 2);
        assert_eq!(settle(&request(5, 1, 10), q(8, 10), 100, 1).unwrap(), 1);
    }

    #[test]
    fn price_is_checked_before_quantity() {
        let err = settle(&request(5, 5, 9), q(0, 10), 0, 0).unwrap_err();
        assert_eq!(err, SaleError::PriceAboveMaximum.into());
    }

    #[test]
    fn minimum_units_and_empty_stock() {
        let err = settle(&request(5, 4, 10), q(3, 10), 100, 100).unwrap_err();
        assert_eq!(err, SaleError::BelowMinimumUnits.into());

        let err = settle(&request(5, 0, 10), q(8, 10), 0, 100).unwrap_err();
        assert_eq!(err, SaleError::NoUnitsAvailable.into());
    }

    #[test]
    fn quote_for_account_without_ledger() {
        use crate::host::{sale_table, CONTEXT_ACCOUNT, CONTEXT_LEN};
        use crate::state::{Currency, SaleConfig};
        use crate::vm::{validate, ScriptBuilder};

        // max_units = 2 - number_minted(account), price = 30
        let table = sale_table().unwrap();
        let mut b = ScriptBuilder::new(&table);
        b.constant(Word::from(2u64))
            .context(CONTEXT_ACCOUNT as u16)
            .op("number_minted", 0)
            .op("saturating_sub", 2)
            .constant(Word::from(30u64));
        let script = b.build().unwrap();
        let info = validate(&table, &script, CONTEXT_LEN).unwrap();
        let mut sale = Sale::default();
        sale.configure(
            Pubkey::new_unique(),
            0,
            SaleConfig {
                script,
                supply_limit: 10,
                max_per_wallet: 0,
                currency: Currency::Native,
                recipient: Pubkey::new_unique(),
                delegated_minter: None,
                royalty_bps: 0,
                royalty_recipient: Pubkey::new_unique(),
            },
            info,
            table.fingerprint(),
            255,
        )
        .unwrap();

        let buyer = Pubkey::new_unique();
        assert_eq!(quote_for(&sale, buyer, None, 1, 0).unwrap(), q(2, 30));

        let mut ledger = HolderLedger::default();
        ledger.bind(Pubkey::new_unique(), buyer, 255);
        ledger.record_mint(2).unwrap();
        assert_eq!(
            quote_for(&sale, buyer, Some(&ledger), 1, 0).unwrap(),
            q(0, 30)
        );
    }

    #[test]
    fn zero_price_is_allowed() {
        assert_eq!(settle(&request(2, 1, 0), q(8, 0), 100, 100).unwrap(), 2);
    }

    #[test]
    fn quote_narrowing() {
        let wide = Word::from(u64::MAX) + Word::from(1u64);
        let narrowed = SaleQuote::from_quote(Quote {
            max_units: wide,
            price: Word::from(7u64),
        })
        .unwrap();
        assert_eq!(narrowed, q(u64::MAX, 7));

        let err = SaleQuote::from_quote(Quote {
            max_units: Word::from(1u64),
            price: wide,
        })
        .unwrap_err();
        assert_eq!(err, SaleError::PriceOverflow.into());
    }
}

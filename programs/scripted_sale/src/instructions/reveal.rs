use anchor_lang::prelude::*;
use anchor_spl::token_interface::{Mint, TokenAccount, TokenInterface};

use crate::error::SaleError;
use crate::instructions::purchase::{quote_for, Payment, SaleQuote};
use crate::state::{Commitment, HolderLedger, Sale, Shuffle, TimeBound};
use crate::{COMMITMENT_SEED, LEDGER_SEED, SALE_SEED, SHUFFLE_SEED, VAULT_SEED};

// ======================================================================
// EVENTS
// ======================================================================

#[event]
pub struct ReservationCommitted {
    pub sale: Pubkey,
    pub buyer: Pubkey,
    pub units: u64,
    pub cost: u64,
}

#[event]
pub struct RevealStarted {
    pub sale: Pubkey,
    pub total_reserved: u64,
    pub deadline: i64,
    pub hard_deadline: i64,
}

#[event]
pub struct SecretRevealed {
    pub sale: Pubkey,
    pub buyer: Pubkey,
    pub units: u64,
    pub slot_start: u64,
    pub deadline: i64,
}

#[event]
pub struct IdsRevealed {
    pub sale: Pubkey,
    pub total_reserved: u64,
    pub forfeited_units: u64,
}

#[event]
pub struct ReservationClaimed {
    pub sale: Pubkey,
    pub buyer: Pubkey,
    pub ids: Vec<u32>,
}

// ======================================================================
// INSTRUCTIONS
// ======================================================================

/// Cost of reserving `units` at the quoted price. Unlike a purchase, a
/// reservation is all or nothing: it never shrinks to fit the cap.
pub fn reservation_cost(units: u64, maximum_price: u64, quote: SaleQuote) -> Result<u64> {
    require!(quote.price <= maximum_price, SaleError::PriceAboveMaximum);
    require!(units <= quote.max_units, SaleError::MaxLimit);
    Ok(units.checked_mul(quote.price).ok_or(SaleError::Overflow)?)
}

/// Reserves `units` behind `hash = keccak(secret)`, paying the script
/// price for them. Ids are assigned only after the reveal.
///
/// # Errors
/// - `SaleError::ZeroUnits` if `units` is 0
/// - `SaleError::AlreadyCommitted` if the buyer already reserved in this sale
/// - `SaleError::MaxLimit` if the reservation exceeds remaining stock or
///   the script's cap, or stock is already fully reserved
/// - `SaleError::ReservationsClosed` once the reveal has started
/// - `SaleError::PriceAboveMaximum` if the unit price exceeds `maximum_price`
pub fn commit(
    ctx: Context<CommitReservation>,
    hash: [u8; 32],
    units: u64,
    maximum_price: u64,
) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let sale_key = ctx.accounts.sale.key();
    let buyer = ctx.accounts.buyer.key();

    let ledger = ctx.accounts.ledger.as_deref();
    let q = quote_for(&ctx.accounts.sale, buyer, ledger, units, now)?;
    let cost = reservation_cost(units, maximum_price, q)?;

    ctx.accounts.payment().collect(&ctx.accounts.sale, cost)?;

    let accounts = ctx.accounts;
    accounts
        .shuffle
        .commit(&mut accounts.sale, &mut accounts.commitment, hash, units, now)?;
    accounts.commitment.sale = sale_key;
    accounts.commitment.buyer = buyer;
    accounts.commitment.bump = ctx.bumps.commitment;
    accounts.sale.record_payment(cost)?;

    msg!(
        "Reserved {} units for {} at {} each (phase {:?})",
        units,
        buyer,
        q.price,
        accounts.shuffle.phase
    );

    emit!(ReservationCommitted {
        sale: sale_key,
        buyer,
        units,
        cost,
    });

    Ok(())
}

/// Opens the reveal window. Owner only.
pub fn start_reveal(
    ctx: Context<StartReveal>,
    initial_seed: [u8; 32],
    time_bound: TimeBound,
) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let shuffle = &mut ctx.accounts.shuffle;
    shuffle.start_reveal(initial_seed, time_bound, now)?;

    msg!(
        "Reveal started: {} units reserved, deadline {} (hard {})",
        shuffle.total_reserved,
        shuffle.deadline,
        shuffle.hard_deadline
    );

    emit!(RevealStarted {
        sale: ctx.accounts.sale.key(),
        total_reserved: shuffle.total_reserved,
        deadline: shuffle.deadline,
        hard_deadline: shuffle.hard_deadline,
    });

    Ok(())
}

/// Reveals the signer's secret and folds it into the seed.
///
/// # Errors
/// - `SaleError::NoCommitment` if the commitment was already revealed
/// - `SaleError::NotRevealing` outside the reveal phase
/// - `SaleError::RevealWindowClosed` past the deadline
/// - `SaleError::CannotReveal` if `keccak(secret)` does not match
pub fn reveal(ctx: Context<RevealSecret>, secret: [u8; 32]) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let accounts = ctx.accounts;
    accounts
        .shuffle
        .reveal(&mut accounts.commitment, &secret, now)?;

    msg!(
        "Secret revealed by {}: {} pending, deadline {}",
        accounts.buyer.key(),
        accounts.shuffle.pending,
        accounts.shuffle.deadline
    );

    emit!(SecretRevealed {
        sale: accounts.sale.key(),
        buyer: accounts.buyer.key(),
        units: accounts.commitment.units,
        slot_start: accounts.commitment.slot_start,
        deadline: accounts.shuffle.deadline,
    });

    Ok(())
}

/// Computes the id permutation. Anyone may call once every reservation
/// is revealed or the window has closed.
pub fn reveal_ids(ctx: Context<RevealIds>) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let accounts = ctx.accounts;
    let forfeited = accounts.shuffle.reveal_ids(&mut accounts.sale, now)?;

    msg!(
        "Ids revealed for {} slots, {} units forfeited",
        accounts.shuffle.total_reserved,
        forfeited
    );

    emit!(IdsRevealed {
        sale: accounts.sale.key(),
        total_reserved: accounts.shuffle.total_reserved,
        forfeited_units: forfeited,
    });

    Ok(())
}

/// Credits the buyer with the ids assigned to their reservation slots.
pub fn claim_reserved(ctx: Context<ClaimReserved>) -> Result<()> {
    let sale_key = ctx.accounts.sale.key();
    let buyer = ctx.accounts.buyer.key();
    let accounts = ctx.accounts;

    let ids = accounts.shuffle.claim(&mut accounts.commitment)?;
    let units = accounts.commitment.units;
    accounts.sale.record_claim(units)?;
    accounts.ledger.bind(sale_key, buyer, ctx.bumps.ledger);
    accounts.ledger.record_mint(units)?;

    msg!("Claimed {} reserved units for {}", units, buyer);

    emit!(ReservationClaimed {
        sale: sale_key,
        buyer,
        ids,
    });

    Ok(())
}

// ======================================================================
// ACCOUNTS
// ======================================================================

#[derive(Accounts)]
pub struct CommitReservation<'info> {
    #[account(
        mut,
        seeds = [SALE_SEED, sale.owner.as_ref(), &sale.sale_id.to_le_bytes()],
        bump = sale.bump
    )]
    pub sale: Box<Account<'info, Sale>>,

    #[account(
        mut,
        seeds = [SHUFFLE_SEED, sale.key().as_ref()],
        bump = shuffle.bump
    )]
    pub shuffle: Box<Account<'info, Shuffle>>,

    // Loaded if it exists so a repeat commit fails with AlreadyCommitted.
    #[account(
        init_if_needed,
        payer = buyer,
        space = Commitment::SIZE,
        seeds = [COMMITMENT_SEED, sale.key().as_ref(), buyer.key().as_ref()],
        bump
    )]
    pub commitment: Box<Account<'info, Commitment>>,

    /// Absent until the buyer first mints or claims.
    #[account(
        seeds = [LEDGER_SEED, sale.key().as_ref(), buyer.key().as_ref()],
        bump = ledger.bump
    )]
    pub ledger: Option<Account<'info, HolderLedger>>,

    #[account(mut)]
    pub buyer: Signer<'info>,

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

impl<'info> CommitReservation<'info> {
    pub fn payment(&self) -> Payment<'_, 'info> {
        Payment {
            payer: &self.buyer,
            payer_token_account: self.payer_token_account.as_ref(),
            vault: self.vault.as_ref(),
            currency_mint: self.currency_mint.as_ref(),
            token_program: self.token_program.as_ref(),
            system_program: &self.system_program,
        }
    }
}

#[derive(Accounts)]
pub struct StartReveal<'info> {
    #[account(
        seeds = [SALE_SEED, sale.owner.as_ref(), &sale.sale_id.to_le_bytes()],
        bump = sale.bump,
        has_one = owner @ SaleError::Unauthorized
    )]
    pub sale: Box<Account<'info, Sale>>,

    #[account(
        mut,
        seeds = [SHUFFLE_SEED, sale.key().as_ref()],
        bump = shuffle.bump
    )]
    pub shuffle: Box<Account<'info, Shuffle>>,

    pub owner: Signer<'info>,
}

#[derive(Accounts)]
pub struct RevealSecret<'info> {
    #[account(
        seeds = [SALE_SEED, sale.owner.as_ref(), &sale.sale_id.to_le_bytes()],
        bump = sale.bump
    )]
    pub sale: Box<Account<'info, Sale>>,

    #[account(
        mut,
        seeds = [SHUFFLE_SEED, sale.key().as_ref()],
        bump = shuffle.bump
    )]
    pub shuffle: Box<Account<'info, Shuffle>>,

    #[account(
        mut,
        seeds = [COMMITMENT_SEED, sale.key().as_ref(), buyer.key().as_ref()],
        bump = commitment.bump,
        has_one = buyer @ SaleError::Unauthorized
    )]
    pub commitment: Box<Account<'info, Commitment>>,

    pub buyer: Signer<'info>,
}

#[derive(Accounts)]
pub struct RevealIds<'info> {
    #[account(
        mut,
        seeds = [SALE_SEED, sale.owner.as_ref(), &sale.sale_id.to_le_bytes()],
        bump = sale.bump
    )]
    pub sale: Box<Account<'info, Sale>>,

    #[account(
        mut,
        seeds = [SHUFFLE_SEED, sale.key().as_ref()],
        bump = shuffle.bump
    )]
    pub shuffle: Box<Account<'info, Shuffle>>,

    pub caller: Signer<'info>,
}

#[derive(Accounts)]
pub struct ClaimReserved<'info> {
    #[account(
        mut,
        seeds = [SALE_SEED, sale.owner.as_ref(), &sale.sale_id.to_le_bytes()],
        bump = sale.bump
    )]
    pub sale: Box<Account<'info, Sale>>,

    #[account(
        seeds = [SHUFFLE_SEED, sale.key().as_ref()],
        bump = shuffle.bump
    )]
    pub shuffle: Box<Account<'info, Shuffle>>,

    #[account(
        mut,
        seeds = [COMMITMENT_SEED, sale.key().as_ref(), buyer.key().as_ref()],
        bump = commitment.bump,
        has_one = buyer @ SaleError::Unauthorized
    )]
    pub commitment: Box<Account<'info, Commitment>>,

    #[account(
        init_if_needed,
        payer = buyer,
        space = HolderLedger::SIZE,
        seeds = [LEDGER_SEED, sale.key().as_ref(), buyer.key().as_ref()],
        bump
    )]
    pub ledger: Box<Account<'info, HolderLedger>>,

    #[account(mut)]
    pub buyer: Signer<'info>,

    pub system_program: Program<'info, System>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(max_units: u64, price: u64) -> SaleQuote {
        SaleQuote { max_units, price }
    }

    #[test]
    fn reservation_is_charged_at_the_quoted_price() {
        assert_eq!(reservation_cost(3, 50, q(4, 40)).unwrap(), 120);
        assert_eq!(reservation_cost(4, 40, q(4, 40)).unwrap(), 160);
        assert_eq!(reservation_cost(2, 0, q(4, 0)).unwrap(), 0);
    }

    #[test]
    fn reservation_guards() {
        assert_eq!(
            reservation_cost(3, 39, q(4, 40)).unwrap_err(),
            SaleError::PriceAboveMaximum.into()
        );
        assert_eq!(
            reservation_cost(5, 40, q(4, 40)).unwrap_err(),
            SaleError::MaxLimit.into()
        );
        // Price is checked first.
        assert_eq!(
            reservation_cost(5, 39, q(4, 40)).unwrap_err(),
            SaleError::PriceAboveMaximum.into()
        );
        assert_eq!(
            reservation_cost(2, u64::MAX, q(4, u64::MAX)).unwrap_err(),
            SaleError::Overflow.into()
        );
    }
}

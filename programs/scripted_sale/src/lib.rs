// ======================================================================
// SCRIPTED SALE
// ======================================================================
// Programmable NFT sale on Solana
// Features:
//   - Sale terms computed by an embedded stack VM (max units, unit price)
//   - Scripts validated once at configuration, pinned to a dispatch table
//   - Native SOL or SPL / Token-2022 payment into the sale
//   - Commit-reveal reservations with a sliding reveal deadline
//   - Fisher-Yates id assignment seeded by every revealed secret
// ======================================================================

#![allow(
    unexpected_cfgs, // Anchor uses cfg(feature = "anchor-debug")
    clippy::multiple_crate_versions,
    clippy::cargo_common_metadata,
    elided_lifetimes_in_paths, // Anchor Context pattern uses hidden lifetimes
    ambiguous_glob_reexports, // #[program] and instructions export the same function names
    hidden_glob_reexports,
)]

use anchor_lang::prelude::*;

pub mod error;
pub mod host;
pub mod instructions;
pub mod state;
pub mod vm;

pub use error::*;
pub use instructions::*;
pub use state::*;

declare_id!("Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS");

// ======================================================================
// CONSTANTS / SEEDS
// ======================================================================

pub const BPS_DENOM: u64 = 10_000;

pub const MAX_SUPPLY_LIMIT: u64 = 2_000; // bounds the shuffle and its account
pub const MAX_ROYALTY_BPS: u16 = 2_500; // 25%
pub const MAX_REVEAL_DURATION_SECS: i64 = 60 * 60 * 24 * 30; // 30 days

// seeds
pub const SALE_SEED: &[u8] = b"sale";
pub const SHUFFLE_SEED: &[u8] = b"shuffle";
pub const COMMITMENT_SEED: &[u8] = b"commitment";
pub const LEDGER_SEED: &[u8] = b"ledger";
pub const VAULT_SEED: &[u8] = b"vault";

// ======================================================================
// PROGRAM
// ======================================================================

#[program]
pub mod scripted_sale {
    use super::*;

    // --- configuration ---

    pub fn initialize_sale(
        ctx: Context<InitializeSale>,
        sale_id: u64,
        config: SaleConfig,
    ) -> Result<()> {
        instructions::initialize::initialize_sale(ctx, sale_id, config)
    }

    pub fn init_payment_vault(ctx: Context<InitPaymentVault>) -> Result<()> {
        instructions::initialize::init_payment_vault(ctx)
    }

    // --- purchase ---

    pub fn calculate(ctx: Context<Calculate>, account: Pubkey, units: u64) -> Result<SaleQuote> {
        instructions::purchase::calculate(ctx, account, units)
    }

    pub fn mint(ctx: Context<MintUnits>, request: MintRequest) -> Result<()> {
        instructions::purchase::mint(ctx, request)
    }

    pub fn mint_for(ctx: Context<MintUnits>, request: MintRequest) -> Result<()> {
        instructions::purchase::mint_for(ctx, request)
    }

    pub fn burn(ctx: Context<BurnUnits>, units: u64) -> Result<()> {
        instructions::burn::burn(ctx, units)
    }

    // --- treasury ---

    pub fn withdraw(ctx: Context<Withdraw>, amount: u64) -> Result<()> {
        instructions::treasury::withdraw(ctx, amount)
    }

    pub fn royalty_info(ctx: Context<RoyaltyInfo>, sale_price: u64) -> Result<RoyaltyQuote> {
        instructions::treasury::royalty_info(ctx, sale_price)
    }

    // --- commit / reveal ---

    pub fn commit(
        ctx: Context<CommitReservation>,
        hash: [u8; 32],
        units: u64,
        maximum_price: u64,
    ) -> Result<()> {
        instructions::reveal::commit(ctx, hash, units, maximum_price)
    }

    pub fn start_reveal(
        ctx: Context<StartReveal>,
        initial_seed: [u8; 32],
        time_bound: TimeBound,
    ) -> Result<()> {
        instructions::reveal::start_reveal(ctx, initial_seed, time_bound)
    }

    pub fn reveal(ctx: Context<RevealSecret>, secret: [u8; 32]) -> Result<()> {
        instructions::reveal::reveal(ctx, secret)
    }

    pub fn reveal_ids(ctx: Context<RevealIds>) -> Result<()> {
        instructions::reveal::reveal_ids(ctx)
    }

    pub fn claim_reserved(ctx: Context<ClaimReserved>) -> Result<()> {
        instructions::reveal::claim_reserved(ctx)
    }
}

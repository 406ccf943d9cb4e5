// ======================================================================
// COMMIT-REVEAL SHUFFLE
// ======================================================================
//
// Buyers reserve units against a hidden secret, reveal it inside a
// sliding window, and every revealed secret is folded into one seed.
// Slots are handed out in reveal order, so only revealed units take part
// in the Fisher-Yates shuffle that maps slots to token ids `1..=revealed`.
//
//   Open -> Reserved -> Revealing -> Revealed -> Shuffled
//
// Reserved is reached when commits exhaust the stock. Revealing goes
// straight to Shuffled when the deadline passes with reveals pending.
// ======================================================================

use anchor_lang::prelude::*;
use solana_program::keccak;

use crate::error::SaleError;
use crate::state::Sale;
use crate::{MAX_REVEAL_DURATION_SECS, MAX_SUPPLY_LIMIT};

// ======================================================================
// PHASE MACHINE
// ======================================================================

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RevealPhase {
    #[default]
    Open,
    Reserved,
    Revealing,
    Revealed,
    Shuffled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseEvent {
    Commit { cap_reached: bool },
    StartReveal,
    Reveal { last: bool },
    Shuffle { deadline_passed: bool },
}

impl RevealPhase {
    pub fn advance(self, event: PhaseEvent) -> Result<RevealPhase> {
        use PhaseEvent::*;
        use RevealPhase::*;

        let next = match (self, event) {
            (Open, Commit { cap_reached: false }) => Open,
            (Open, Commit { cap_reached: true }) => Reserved,
            (Open | Reserved, StartReveal) => Revealing,
            (Revealing, Reveal { last: false }) => Revealing,
            (Revealing, Reveal { last: true }) => Revealed,
            (Revealing, Shuffle { deadline_passed: true }) => Shuffled,
            (Revealed, Shuffle { .. }) => Shuffled,
            _ => return err!(SaleError::InvalidPhaseTransition),
        };
        Ok(next)
    }
}

// ======================================================================
// TIME BOUND
// ======================================================================

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct TimeBound {
    pub base_duration: i64,
    pub max_extra_time: i64,
}

impl TimeBound {
    pub const SIZE: usize = 8 + 8;

    pub fn validate(&self) -> Result<()> {
        require!(
            self.base_duration > 0 && self.base_duration <= MAX_REVEAL_DURATION_SECS,
            SaleError::InvalidTimeBound
        );
        require!(
            self.max_extra_time >= 0 && self.max_extra_time <= MAX_REVEAL_DURATION_SECS,
            SaleError::InvalidTimeBound
        );
        Ok(())
    }
}

// ======================================================================
// COMMITMENT
// ======================================================================

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CommitmentStatus {
    #[default]
    Committed,
    Revealed,
    Claimed,
}

#[account]
#[derive(Default, Debug)]
pub struct Commitment {
    pub sale: Pubkey,
    pub buyer: Pubkey,
    pub hash: [u8; 32],
    pub units: u64,
    /// First slot owned by this commitment. Assigned at reveal.
    pub slot_start: u64,
    pub status: CommitmentStatus,
    pub committed_at: i64,
    pub bump: u8,
}

impl Commitment {
    pub const SIZE: usize = 8 + 32 + 32 + 32 + 8 + 8 + 1 + 8 + 1;
}

// ======================================================================
// SHUFFLE ACCOUNT
// ======================================================================

#[account]
#[derive(Default, Debug)]
pub struct Shuffle {
    pub sale: Pubkey,
    pub phase: RevealPhase,

    pub total_reserved: u64,
    /// Commitments not yet revealed.
    pub pending: u64,
    pub revealed_units: u64,
    pub forfeited_units: u64,

    pub seed: [u8; 32],
    pub time_bound: TimeBound,
    pub reveal_started_at: i64,
    pub deadline: i64,
    pub hard_deadline: i64,

    pub bump: u8,

    /// Token ids indexed by revealed slot. Empty until Shuffled.
    pub permutation: Vec<u32>,
}

impl Shuffle {
    /// Sized for a permutation over `supply_limit` slots.
    pub fn space(supply_limit: u64) -> usize {
        let slots = supply_limit.min(MAX_SUPPLY_LIMIT) as usize;
        8 + 32 + 1 + 8 + 8 + 8 + 8 + 32 + TimeBound::SIZE + 8 + 8 + 8 + 1 + 4 + 4 * slots
    }

    pub fn bind(&mut self, sale: Pubkey, bump: u8) {
        self.sale = sale;
        self.bump = bump;
    }

    /// Reserves `units` from the sale's stock behind `hash`.
    pub fn commit(
        &mut self,
        sale: &mut Sale,
        commitment: &mut Commitment,
        hash: [u8; 32],
        units: u64,
        now: i64,
    ) -> Result<()> {
        require!(units > 0, SaleError::ZeroUnits);
        require!(commitment.units == 0, SaleError::AlreadyCommitted);
        match self.phase {
            RevealPhase::Open => {}
            RevealPhase::Reserved => return err!(SaleError::MaxLimit),
            _ => return err!(SaleError::ReservationsClosed),
        }
        sale.allocate(units)?;

        commitment.hash = hash;
        commitment.units = units;
        commitment.slot_start = 0;
        commitment.status = CommitmentStatus::Committed;
        commitment.committed_at = now;

        self.total_reserved = self
            .total_reserved
            .checked_add(units)
            .ok_or(SaleError::Overflow)?;
        self.pending = self.pending.checked_add(1).ok_or(SaleError::Overflow)?;
        self.phase = self.phase.advance(PhaseEvent::Commit {
            cap_reached: sale.available() == 0,
        })?;
        Ok(())
    }

    pub fn start_reveal(
        &mut self,
        initial_seed: [u8; 32],
        time_bound: TimeBound,
        now: i64,
    ) -> Result<()> {
        let next = self.phase.advance(PhaseEvent::StartReveal)?;
        require!(self.total_reserved > 0, SaleError::NothingReserved);
        time_bound.validate()?;

        let deadline = now
            .checked_add(time_bound.base_duration)
            .ok_or(SaleError::Overflow)?;
        let hard_deadline = deadline
            .checked_add(time_bound.max_extra_time)
            .ok_or(SaleError::Overflow)?;

        self.seed = initial_seed;
        self.time_bound = time_bound;
        self.reveal_started_at = now;
        self.deadline = deadline;
        self.hard_deadline = hard_deadline;
        self.phase = next;
        Ok(())
    }

    pub fn reveal(
        &mut self,
        commitment: &mut Commitment,
        secret: &[u8; 32],
        now: i64,
    ) -> Result<()> {
        require!(
            commitment.status == CommitmentStatus::Committed && commitment.units > 0,
            SaleError::NoCommitment
        );
        require!(self.phase == RevealPhase::Revealing, SaleError::NotRevealing);
        require!(now <= self.deadline, SaleError::RevealWindowClosed);
        require!(commitment_hash(secret) == commitment.hash, SaleError::CannotReveal);

        self.seed = accumulate_seed(&self.seed, secret);
        self.extend_deadline(now);

        commitment.status = CommitmentStatus::Revealed;
        commitment.slot_start = self.revealed_units;
        self.revealed_units = self
            .revealed_units
            .checked_add(commitment.units)
            .ok_or(SaleError::Overflow)?;
        self.pending = self.pending.checked_sub(1).ok_or(SaleError::Overflow)?;
        self.phase = self.phase.advance(PhaseEvent::Reveal {
            last: self.pending == 0,
        })?;
        Ok(())
    }

    /// A reveal close to the deadline pushes it out, never past the hard deadline.
    fn extend_deadline(&mut self, now: i64) {
        let extra = self.time_bound.max_extra_time;
        if self.deadline.saturating_sub(now) < extra {
            self.deadline = now.saturating_add(extra).min(self.hard_deadline);
        }
    }

    /// Freezes the seed and shuffles the revealed slots. Unrevealed units
    /// are forfeited: they get no slot and go back to the sale's stock.
    /// Returns the number forfeited.
    pub fn reveal_ids(&mut self, sale: &mut Sale, now: i64) -> Result<u64> {
        match self.phase {
            RevealPhase::Shuffled => return err!(SaleError::AlreadyShuffled),
            RevealPhase::Open | RevealPhase::Reserved => return err!(SaleError::NotRevealing),
            RevealPhase::Revealing if now <= self.deadline => {
                return err!(SaleError::RevealsPending)
            }
            _ => {}
        }
        let next = self.phase.advance(PhaseEvent::Shuffle {
            deadline_passed: now > self.deadline,
        })?;

        let slots = u32::try_from(self.revealed_units).map_err(|_| SaleError::Overflow)?;
        let forfeited = self
            .total_reserved
            .checked_sub(self.revealed_units)
            .ok_or(SaleError::Overflow)?;
        sale.release(forfeited)?;

        self.permutation = permutation(&self.seed, slots);
        self.forfeited_units = forfeited;
        self.phase = next;
        Ok(forfeited)
    }

    /// Token ids owned by a revealed commitment.
    pub fn claim(&self, commitment: &mut Commitment) -> Result<Vec<u32>> {
        require!(self.phase == RevealPhase::Shuffled, SaleError::NotShuffled);
        match commitment.status {
            CommitmentStatus::Revealed => {}
            CommitmentStatus::Committed => return err!(SaleError::NotRevealed),
            CommitmentStatus::Claimed => return err!(SaleError::AlreadyClaimed),
        }
        let start = commitment.slot_start as usize;
        let end = start
            .checked_add(commitment.units as usize)
            .ok_or(SaleError::Overflow)?;
        let ids = self
            .permutation
            .get(start..end)
            .ok_or(SaleError::Overflow)?
            .to_vec();
        commitment.status = CommitmentStatus::Claimed;
        Ok(ids)
    }
}

// ======================================================================
// HASHING
// ======================================================================

pub fn commitment_hash(secret: &[u8; 32]) -> [u8; 32] {
    keccak::hash(secret).0
}

pub fn accumulate_seed(seed: &[u8; 32], secret: &[u8; 32]) -> [u8; 32] {
    keccak::hashv(&[&seed[..], &secret[..]]).0
}

/// Big-endian u64 draws from `keccak(seed || block as u64 big-endian)`,
/// four per hash.
pub struct DrawStream<'a> {
    seed: &'a [u8; 32],
    block: u64,
    buffer: [u8; 32],
    used: usize,
}

impl<'a> DrawStream<'a> {
    pub const DRAWS_PER_HASH: usize = 4;

    pub fn new(seed: &'a [u8; 32]) -> Self {
        Self {
            seed,
            block: 0,
            buffer: [0u8; 32],
            used: Self::DRAWS_PER_HASH,
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        if self.used == Self::DRAWS_PER_HASH {
            self.buffer = keccak::hashv(&[&self.seed[..], &self.block.to_be_bytes()[..]]).0;
            self.block = self.block.wrapping_add(1);
            self.used = 0;
        }
        let at = self.used * 8;
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.buffer[at..at + 8]);
        self.used += 1;
        u64::from_be_bytes(word)
    }
}

/// Ids `1..=n` shuffled by `seed`. Going from the last slot down, slot
/// `i` swaps with `next_u64() mod (i + 1)`. At `MAX_SUPPLY_LIMIT` slots
/// that is 500 keccak syscalls and no wide arithmetic.
pub fn permutation(seed: &[u8; 32], n: u32) -> Vec<u32> {
    let mut ids: Vec<u32> = (1..=n).collect();
    let mut draws = DrawStream::new(seed);
    for i in (1..ids.len()).rev() {
        let j = draws.next_u64() % (i as u64 + 1);
        ids.swap(i, j as usize);
    }
    ids
}

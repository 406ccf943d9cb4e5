use anchor_lang::prelude::*;

#[error_code]
pub enum SaleError {
    #[msg("Unauthorized")]
    Unauthorized,
    #[msg("Math overflow")]
    Overflow,

    // --- configuration ---
    #[msg("Sale already initialized")]
    AlreadyInitialized,
    #[msg("Supply limit must be between 1 and MAX_SUPPLY_LIMIT")]
    InvalidSupplyLimit,
    #[msg("Royalty exceeds MAX_ROYALTY_BPS")]
    RoyaltyTooHigh,
    #[msg("Invalid reveal time bound")]
    InvalidTimeBound,
    #[msg("Payment currency mismatch")]
    CurrencyMismatch,
    #[msg("Token payment accounts missing")]
    MissingPaymentAccounts,

    // --- purchase policy ---
    #[msg("Purchasable units below requested minimum")]
    BelowMinimumUnits,
    #[msg("Unit price above requested maximum")]
    PriceAboveMaximum,
    #[msg("No units available")]
    NoUnitsAvailable,
    #[msg("Price does not fit in u64")]
    PriceOverflow,
    #[msg("Insufficient funds")]
    InsufficientFunds,
    #[msg("Insufficient balance")]
    InsufficientBalance,
    #[msg("Amount exceeds withdrawable funds")]
    InsufficientPayable,

    // --- commit / reveal ---
    #[msg("MAX_LIMIT")]
    MaxLimit,
    #[msg("Reservations are closed")]
    ReservationsClosed,
    #[msg("Reserved units must be positive")]
    ZeroUnits,
    #[msg("Buyer already holds a reservation for this sale")]
    AlreadyCommitted,
    #[msg("Nothing reserved")]
    NothingReserved,
    #[msg("Reveal has not started")]
    NotRevealing,
    #[msg("Reveal window closed")]
    RevealWindowClosed,
    #[msg("No commitment to reveal")]
    NoCommitment,
    #[msg("Cannot reveal: secret does not match commitment")]
    CannotReveal,
    #[msg("Reveals still pending")]
    RevealsPending,
    #[msg("Ids already revealed")]
    AlreadyShuffled,
    #[msg("Ids not revealed yet")]
    NotShuffled,
    #[msg("Commitment was not revealed")]
    NotRevealed,
    #[msg("Reservation already claimed")]
    AlreadyClaimed,
    #[msg("Invalid reveal phase transition")]
    InvalidPhaseTransition,
}

#[error_code(offset = 7000)]
pub enum ScriptError {
    #[msg("Script has no sources")]
    EmptyScript,
    #[msg("Too many sources")]
    TooManySources,
    #[msg("Source exceeds maximum length")]
    SourceTooLong,
    #[msg("Too many constants")]
    TooManyConstants,
    #[msg("Source index out of bounds")]
    SourceOutOfBounds,
    #[msg("Unknown opcode")]
    UnknownOpcode,
    #[msg("Invalid operand")]
    InvalidOperand,
    #[msg("Constant index out of bounds")]
    ConstantOutOfBounds,
    #[msg("Context index out of bounds")]
    ContextOutOfBounds,
    #[msg("Unknown storage slot")]
    UnknownStorageSlot,
    #[msg("Stack underflow")]
    StackUnderflow,
    #[msg("Stack overflow")]
    StackOverflow,
    #[msg("Script leaves fewer than two results")]
    MissingResults,
    #[msg("Division by zero")]
    DivisionByZero,
    #[msg("Arithmetic overflow")]
    ArithmeticOverflow,
    #[msg("Account counters not loaded")]
    UnknownAccount,
    #[msg("Script was validated against a different dispatch table")]
    DispatchTableMismatch,
    #[msg("Duplicate opcode name")]
    DuplicateOpcode,
    #[msg("Too many opcodes")]
    TooManyOpcodes,
}

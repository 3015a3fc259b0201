//! Names fixed by the ledger protocol.
//!
//! Fee transitions always target the native credits program; the engine
//! recognizes them by program and function name only.

/// Program id of the native credits program.
pub const CREDITS_PROGRAM_ID: &str = "credits.aleo";

/// Mapping holding public balances in the credits program.
pub const CREDITS_ACCOUNT_MAPPING: &str = "account";

/// Fee function paid from a public balance. Has a finalizer.
pub const FEE_PUBLIC_FUNCTION: &str = "fee_public";

/// Fee function paid from a private record. Has no finalizer.
pub const FEE_PRIVATE_FUNCTION: &str = "fee_private";

/// Moves public balance between two accounts.
pub const TRANSFER_PUBLIC_FUNCTION: &str = "transfer_public";

/// Returns `true` if `(program, function)` names the public fee function.
pub fn is_public_fee(program: &str, function: &str) -> bool {
    program == CREDITS_PROGRAM_ID && function == FEE_PUBLIC_FUNCTION
}

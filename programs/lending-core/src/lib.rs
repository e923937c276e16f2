// Per-market lending cores over the shared token vault.
//
// Each market pairs one collateral token with one debt token, tracks debt
// as a rebase of parts against an interest-growing total, and exposes a
// batched "cook" surface that executes an ordered action list atomically.

use solana_program::entrypoint;

pub mod cook;
pub mod error;
pub mod instruction;
pub mod liquidation;
pub mod market;
pub mod nft;
pub mod oracle;
pub mod processor;
pub mod state;

use processor::process_instruction;

solana_program::declare_id!("LendCore11111111111111111111111111111111111");

#[cfg(not(feature = "no-entrypoint"))]
entrypoint!(process_instruction);

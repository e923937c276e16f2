// Shared multi-token share ledger - native Solana implementation.
//
// Every token pool is tracked as a rebase pair {elastic = total amount,
// base = total shares}; account balances are held in shares. Lending
// markets are instantiated as clones through the whitelist/deploy
// registry and act on user funds only under a delegated approval.

use solana_program::entrypoint;

pub mod approval;
pub mod error;
pub mod instruction;
pub mod ledger;
pub mod math;
pub mod processor;
pub mod state;

use processor::process_instruction;

solana_program::declare_id!("TokenVauLt111111111111111111111111111111111");

#[cfg(not(feature = "no-entrypoint"))]
entrypoint!(process_instruction);

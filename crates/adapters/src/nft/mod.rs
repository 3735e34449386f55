//! nftables dataplane adapter: ruleset translation, `nft` invocation, and
//! the atomic applier with snapshot-based rollback.

pub mod applier;
pub mod cli;
pub mod diff;
pub mod translator;

pub use applier::{ApplierConfig, NftApplier};
pub use cli::NftCli;
pub use translator::Translator;

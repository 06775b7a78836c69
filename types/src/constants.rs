/// Maximum accepted length of a wallet address string.
pub const MAX_WALLET_LENGTH: usize = 128;

/// Maximum accepted length of a token symbol.
pub const MAX_TOKEN_LENGTH: usize = 16;

/// Maximum accepted length of an on-chain transaction identifier.
pub const MAX_TX_ID_LENGTH: usize = 128;

/// Maximum accepted length of a chain name.
pub const MAX_CHAIN_LENGTH: usize = 32;

/// Maximum accepted length of a withdrawal destination.
pub const MAX_DESTINATION_LENGTH: usize = 128;

/// Maximum number of wager records returned by a history query.
pub const MAX_WAGER_HISTORY_PAGE: usize = 200;

/// Error body returned when a debit would overdraw a balance.
pub const ERROR_INSUFFICIENT_BALANCE: &str = "insufficient balance";

/// Error body returned when a deposit transaction id was already ingested.
pub const ERROR_DEPOSIT_ALREADY_RECORDED: &str = "deposit already recorded";

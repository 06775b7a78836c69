//! Wallet address and token symbol newtypes.
//!
//! Both are normalized on construction so that map keys built from them compare
//! the way the chain does: hex (`0x…`) addresses are case-insensitive and get
//! lower-cased, every other address format is kept verbatim. Token symbols are
//! upper-cased.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::{MAX_TOKEN_LENGTH, MAX_WALLET_LENGTH};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("wallet address is empty")]
    EmptyWallet,
    #[error("wallet address too long (len={len}, max={max})")]
    WalletTooLong { len: usize, max: usize },
    #[error("wallet address contains invalid character {0:?}")]
    InvalidWalletCharacter(char),
    #[error("token symbol is empty")]
    EmptyToken,
    #[error("token symbol too long (len={len}, max={max})")]
    TokenTooLong { len: usize, max: usize },
    #[error("token symbol contains invalid character {0:?}")]
    InvalidTokenCharacter(char),
    #[error("unknown game: {0}")]
    UnknownGame(String),
    #[error("unknown guess: {0}")]
    UnknownGuess(String),
}

/// A chain address that owns ledger balances.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseError::EmptyWallet);
        }
        if trimmed.len() > MAX_WALLET_LENGTH {
            return Err(ParseError::WalletTooLong {
                len: trimmed.len(),
                max: MAX_WALLET_LENGTH,
            });
        }
        if let Some(invalid) = trimmed.chars().find(|c| !c.is_ascii_graphic()) {
            return Err(ParseError::InvalidWalletCharacter(invalid));
        }
        if is_hex_address(trimmed) {
            return Ok(Self(trimmed.to_ascii_lowercase()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Canonical form of a deposit transaction id: hex hashes (`0x…`) compare case-insensitively,
/// like hex addresses, and are lower-cased. Other formats are kept verbatim.
pub fn normalize_tx_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if is_hex_address(trimmed) {
        return trimmed.to_ascii_lowercase();
    }
    trimmed.to_string()
}

fn is_hex_address(value: &str) -> bool {
    let body = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(body) => body,
        None => return false,
    };
    !body.is_empty() && body.chars().all(|c| c.is_ascii_hexdigit())
}

impl TryFrom<String> for WalletAddress {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

impl FromStr for WalletAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short symbol identifying an on-chain asset (e.g. `MIL`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseError::EmptyToken);
        }
        if trimmed.len() > MAX_TOKEN_LENGTH {
            return Err(ParseError::TokenTooLong {
                len: trimmed.len(),
                max: MAX_TOKEN_LENGTH,
            });
        }
        if let Some(invalid) = trimmed.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(ParseError::InvalidTokenCharacter(invalid));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Token {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Token> for String {
    fn from(value: Token) -> Self {
        value.0
    }
}

impl FromStr for Token {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_wallet_is_case_insensitive() {
        let upper = WalletAddress::parse("0xABCdef0123").unwrap();
        let lower = WalletAddress::parse("0xabcdef0123").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.as_str(), "0xabcdef0123");
    }

    #[test]
    fn test_base58_wallet_keeps_case() {
        let a = WalletAddress::parse("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin").unwrap();
        let b = WalletAddress::parse("9xqewvg816bux9epjhmat23yvvm2zwbrrpzb9pusvfin").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tx_id_normalization() {
        assert_eq!(normalize_tx_id(" 0xABCdef01 "), "0xabcdef01");
        assert_eq!(normalize_tx_id("0XABC"), "0xabc");
        // Signatures in other encodings are case-sensitive
        assert_eq!(normalize_tx_id("5VERv8NMvzbJMEkV"), "5VERv8NMvzbJMEkV");
    }

    #[test]
    fn test_wallet_rejects_empty_and_whitespace() {
        assert_eq!(WalletAddress::parse("   "), Err(ParseError::EmptyWallet));
        assert!(matches!(
            WalletAddress::parse("abc def"),
            Err(ParseError::InvalidWalletCharacter(' '))
        ));
    }

    #[test]
    fn test_wallet_rejects_too_long() {
        let raw = "a".repeat(MAX_WALLET_LENGTH + 1);
        assert!(matches!(
            WalletAddress::parse(&raw),
            Err(ParseError::WalletTooLong { .. })
        ));
    }

    #[test]
    fn test_token_normalizes_to_upper_case() {
        assert_eq!(Token::parse(" mil ").unwrap().as_str(), "MIL");
        assert!(matches!(
            Token::parse("MI-L"),
            Err(ParseError::InvalidTokenCharacter('-'))
        ));
        assert_eq!(Token::parse(""), Err(ParseError::EmptyToken));
    }

    #[test]
    fn test_serde_validates_on_deserialize() {
        let token: Token = serde_json::from_str("\"sol\"").unwrap();
        assert_eq!(token.as_str(), "SOL");
        assert!(serde_json::from_str::<WalletAddress>("\"\"").is_err());
    }
}

//! Request and response bodies of the wager protocol, plus the records the house
//! keeps for audit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{GameKind, GameParams, Guess, RoundResult, RoundView, Token, WalletAddress};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceQuery {
    pub wallet: WalletAddress,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token: Token,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancesResponse {
    pub balances: Vec<TokenBalance>,
}

impl BalancesResponse {
    /// Balance of `token`, zero when the wallet never held it.
    pub fn amount_of(&self, token: &Token) -> Decimal {
        self.balances
            .iter()
            .find(|entry| &entry.token == token)
            .map(|entry| entry.amount)
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceBetRequest {
    pub wallet: WalletAddress,
    pub game: GameKind,
    pub bet_amount: Decimal,
    pub token: Token,
    #[serde(default)]
    pub params: GameParams,
}

/// A successful bet: the debited balance and the handle for the round it opened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceBetResponse {
    pub balance: Decimal,
    pub authorization: Uuid,
    /// Hex SHA-256 of the round's reveal.
    pub commitment: String,
    pub round: RoundView,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessRequest {
    pub wallet: WalletAddress,
    pub authorization: Uuid,
    pub guess: Guess,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessResponse {
    pub round: RoundView,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOutcomeRequest {
    pub wallet: WalletAddress,
    pub game: GameKind,
    pub bet_amount: Decimal,
    pub token: Token,
    pub payout: Decimal,
    pub result: RoundResult,
    pub authorization: Uuid,
}

/// What happened to a round's payout once the house settled it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// The payout was added to the ledger.
    Credited,
    /// The payout was recorded but payouts are switched off.
    Deferred,
    /// Nothing to pay.
    #[serde(rename = "none")]
    NoPayout,
    /// The payout could not be settled; the stake went back to the wallet.
    Refunded,
    /// Neither the payout nor the stake refund could be applied. Needs manual review.
    Failed,
}

impl Settlement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Settlement::Credited => "credited",
            Settlement::Deferred => "deferred",
            Settlement::NoPayout => "none",
            Settlement::Refunded => "refunded",
            Settlement::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOutcomeResponse {
    pub balance: Decimal,
    pub payout: Decimal,
    pub settlement: Settlement,
    /// Hex reveal; `SHA-256(reveal)` equals the commitment issued with the bet.
    pub reveal: String,
    pub round: RoundView,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    pub wallet: WalletAddress,
    pub tx_id: String,
    pub token: Token,
    pub amount: Decimal,
    pub chain: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    #[default]
    Confirmed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub id: u64,
    pub wallet: WalletAddress,
    pub tx_id: String,
    pub token: Token,
    pub amount: Decimal,
    pub chain: String,
    #[serde(default)]
    pub status: DepositStatus,
    pub created_at: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositResponse {
    pub deposit: DepositRecord,
    pub balance: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub wallet: WalletAddress,
    pub token: Token,
    pub amount: Decimal,
    pub destination: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    #[default]
    Pending,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    pub id: u64,
    pub wallet: WalletAddress,
    pub token: Token,
    pub amount: Decimal,
    pub destination: String,
    #[serde(default)]
    pub status: WithdrawalStatus,
    pub created_at: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalResponse {
    pub id: u64,
    pub status: WithdrawalStatus,
    pub balance: Decimal,
    pub amount: Decimal,
    pub token: Token,
}

/// Audit entry for a settled round. Never a source of balance truth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerRecord {
    pub id: u64,
    pub wallet: WalletAddress,
    pub game: GameKind,
    pub bet_amount: Decimal,
    pub token: Token,
    pub payout: Decimal,
    /// What the client claimed; absent when the round expired unreported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_payout: Option<Decimal>,
    pub result: RoundResult,
    pub settlement: Settlement,
    pub authorization: Uuid,
    pub commitment: String,
    pub reveal: String,
    pub created_at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WagerHistoryQuery {
    pub wallet: WalletAddress,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerHistoryResponse {
    pub wagers: Vec<WagerRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PegDrop, ERROR_INSUFFICIENT_BALANCE};
    use serde_json::json;

    #[test]
    fn test_place_bet_defaults_params() {
        let request: PlaceBetRequest = serde_json::from_value(json!({
            "wallet": "0xABC123",
            "game": "card_streak",
            "bet_amount": 5,
            "token": "mil",
        }))
        .unwrap();
        assert_eq!(request.wallet.as_str(), "0xabc123");
        assert_eq!(request.token.as_str(), "MIL");
        assert_eq!(request.bet_amount, Decimal::new(5, 0));
        assert_eq!(request.params, GameParams::default());
    }

    #[test]
    fn test_settlement_wire_names() {
        assert_eq!(serde_json::to_value(Settlement::NoPayout).unwrap(), json!("none"));
        assert_eq!(
            serde_json::to_value(Settlement::Credited).unwrap(),
            json!("credited")
        );
        let parsed: Settlement = serde_json::from_value(json!("deferred")).unwrap();
        assert_eq!(parsed, Settlement::Deferred);
    }

    #[test]
    fn test_amounts_serialize_as_strings() {
        let response = PlaceBetResponse {
            balance: Decimal::new(9050, 2),
            authorization: Uuid::nil(),
            commitment: "00".repeat(32),
            round: RoundView::PegBoard(PegDrop {
                rows: 8,
                path: Vec::new(),
                slot: 4,
                multiplier: Decimal::new(50, 2),
            }),
        };
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["balance"], json!("90.50"));
        assert_eq!(encoded["round"]["game"], json!("peg_board"));
    }

    #[test]
    fn test_wager_record_omits_missing_report() {
        let record = WagerRecord {
            id: 1,
            wallet: WalletAddress::parse("0xabc").unwrap(),
            game: GameKind::MultiplierTarget,
            bet_amount: Decimal::ONE,
            token: Token::parse("MIL").unwrap(),
            payout: Decimal::ZERO,
            reported_payout: None,
            result: RoundResult::Loss,
            settlement: Settlement::NoPayout,
            authorization: Uuid::nil(),
            commitment: String::new(),
            reveal: String::new(),
            created_at: 0,
        };
        let encoded = serde_json::to_value(&record).unwrap();
        assert!(encoded.get("reported_payout").is_none());
        let decoded: WagerRecord = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_error_response_body() {
        let body = serde_json::to_value(ErrorResponse::new(ERROR_INSUFFICIENT_BALANCE)).unwrap();
        assert_eq!(body, json!({ "error": "insufficient balance" }));
    }

    #[test]
    fn test_balances_amount_of_missing_token_is_zero() {
        let response = BalancesResponse {
            balances: vec![TokenBalance {
                token: Token::parse("MIL").unwrap(),
                amount: Decimal::TEN,
            }],
        };
        assert_eq!(response.amount_of(&Token::parse("MIL").unwrap()), Decimal::TEN);
        assert_eq!(
            response.amount_of(&Token::parse("SOL").unwrap()),
            Decimal::ZERO
        );
    }
}

use arcade_execution::GameError;
use arcade_types::{ErrorResponse, Token};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::rounds::LookupError;

#[derive(Debug, Error)]
pub enum HouseError {
    #[error("{0}")]
    Validation(String),
    #[error("token not accepted: {0}")]
    TokenNotAccepted(Token),
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("deposit already recorded")]
    DuplicateDeposit,
    #[error("unknown authorization")]
    UnknownAuthorization,
    #[error("authorization does not match this round")]
    RoundMismatch,
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<LookupError> for HouseError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Unknown => HouseError::UnknownAuthorization,
            LookupError::Mismatch => HouseError::RoundMismatch,
        }
    }
}

impl HouseError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HouseError::Validation(_) | HouseError::TokenNotAccepted(_) | HouseError::Ledger(_) => {
                StatusCode::BAD_REQUEST
            }
            HouseError::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
            HouseError::DuplicateDeposit | HouseError::RoundMismatch => StatusCode::CONFLICT,
            HouseError::UnknownAuthorization => StatusCode::NOT_FOUND,
            HouseError::Game(GameError::GameAlreadyComplete) => StatusCode::CONFLICT,
            HouseError::Game(GameError::DeckExhausted) => StatusCode::INTERNAL_SERVER_ERROR,
            HouseError::Game(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for HouseError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

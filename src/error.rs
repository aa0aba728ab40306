use std::path::PathBuf;
use thiserror::Error;

use crate::bet::BetType;
use crate::credits::Credits;

/// A bet or amount that is rejected before anything is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("stake {0} cannot be made from the allowed chips (0.50, 1, 2, 5, 10, 25)")]
    InvalidStake(Credits),

    #[error("{bet_type} bets need a stake of at least {minimum}, got {stake}")]
    BelowMinimum {
        bet_type: BetType,
        stake: Credits,
        minimum: Credits,
    },

    #[error("[{selection}] is not a valid {bet_type} selection")]
    InvalidCombination { bet_type: BetType, selection: String },

    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("amount {0} exceeds the limit of {max}", max = Credits::MAX)]
    AboveLimit(Credits),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("username '{0}' is already taken")]
    DuplicateUser(String),

    #[error("a password is required")]
    MissingPassword,

    #[error("wrong username or password")]
    InvalidCredentials,

    #[error("'{0}' is not a usable username")]
    InvalidUsername(String),

    #[error("no account named '{0}'")]
    UnknownUser(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} holds corrupt data: {reason}", .path.display())]
    CorruptData { path: PathBuf, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{actor} is not allowed to {action}")]
pub struct AuthorizationError {
    pub actor: String,
    pub action: &'static str,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("log in first")]
    NotLoggedIn,

    #[error("no bets placed")]
    NoBetsPlaced,

    #[error("not enough balance: bets need {needed}, balance is {available}")]
    InsufficientFunds { needed: Credits, available: Credits },
}

#[derive(Debug, Error)]
pub enum RouletteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type Result<T, E = RouletteError> = std::result::Result<T, E>;

pub mod bet;
pub mod commands;
pub mod config;
pub mod credits;
pub mod error;
pub mod payout;
pub mod roulette;
pub mod session;
pub mod store;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::RngCore;

use crate::bet::{Bet, BetRequest, BetValidator};
use crate::config::{Config, UiTheme};
use crate::credits::Credits;
use crate::error::{AuthError, AuthorizationError, Result, SessionError};
use crate::payout::{PayoutEntry, PAYOUT_TABLE};
use crate::roulette::{SpinEngine, SpinOutcome};
use crate::store::AccountStore;

#[derive(Debug, Default)]
pub enum SessionState {
    #[default]
    LoggedOut,
    LoggedIn {
        username: String,
        pending: Vec<Bet>,
    },
}

#[derive(Debug)]
pub struct SpinReport {
    pub spin: SpinOutcome,
    pub balance: Credits,
}

/// One player at the table: login state, pending bets, and the wheel.
pub struct SessionController<R = StdRng> {
    config: Config,
    store: AccountStore,
    engine: SpinEngine<R>,
    state: SessionState,
}

impl<R: RngCore> SessionController<R> {
    pub fn new(config: Config, store: AccountStore, engine: SpinEngine<R>) -> Self {
        SessionController {
            config,
            store,
            engine,
            state: SessionState::LoggedOut,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn current_user(&self) -> Option<&str> {
        match &self.state {
            SessionState::LoggedIn { username, .. } => Some(username),
            SessionState::LoggedOut => None,
        }
    }

    fn require_user(&self) -> Result<&str> {
        self.current_user()
            .ok_or_else(|| SessionError::NotLoggedIn.into())
    }

    /// A custom starting balance needs a logged-in admin.
    pub async fn register(
        &mut self,
        username: &str,
        password: &str,
        start_override: Option<Credits>,
    ) -> Result<Credits> {
        let start_balance = match start_override {
            Some(amount) => {
                let actor = self.current_user().unwrap_or("anonymous");
                if !self.config.is_admin(actor) {
                    return Err(AuthorizationError {
                        actor: actor.to_string(),
                        action: "choose a starting balance",
                    }
                    .into());
                }
                amount
            }
            None => self.config.default_start_balance,
        };
        let account = self
            .store
            .create_account(username, password, start_balance)
            .await?;
        Ok(account.balance)
    }

    /// Switching users discards any bets the previous user left on the table.
    pub fn login(&mut self, username: &str, password: &str) -> Result<Credits> {
        let balance = self.store.authenticate(username, password)?.balance;
        let dropped = self.logout();
        if dropped > 0 {
            warn!("discarded {dropped} unresolved bets on user switch");
        }
        info!("{} logged in", username.trim());
        self.state = SessionState::LoggedIn {
            username: username.trim().to_string(),
            pending: Vec::new(),
        };
        Ok(balance)
    }

    /// Returns how many unresolved bets were dropped.
    pub fn logout(&mut self) -> usize {
        match std::mem::take(&mut self.state) {
            SessionState::LoggedIn { username, pending } => {
                info!("{username} logged out");
                pending.len()
            }
            SessionState::LoggedOut => 0,
        }
    }

    pub fn balance(&self) -> Result<Credits> {
        let username = self.require_user()?;
        self.store
            .balance(username)
            .ok_or_else(|| AuthError::UnknownUser(username.to_string()).into())
    }

    pub fn pending_bets(&self) -> &[Bet] {
        match &self.state {
            SessionState::LoggedIn { pending, .. } => pending,
            SessionState::LoggedOut => &[],
        }
    }

    fn pending_total(&self) -> Credits {
        Credits::from_cents(self.pending_bets().iter().map(|b| b.stake().cents()).sum())
    }

    /// Validates the bet and checks that all pending stakes stay covered by the balance.
    pub fn place_bet(&mut self, request: BetRequest) -> Result<&Bet> {
        let balance = self.balance()?;
        let bet = BetValidator::validate(request)?;

        let needed = self
            .pending_total()
            .checked_add(bet.stake())
            .unwrap_or(Credits::from_cents(u64::MAX));
        if needed > balance {
            return Err(SessionError::InsufficientFunds {
                needed,
                available: balance,
            }
            .into());
        }

        match &mut self.state {
            SessionState::LoggedIn { pending, .. } => {
                pending.push(bet);
                Ok(&pending[pending.len() - 1])
            }
            SessionState::LoggedOut => Err(SessionError::NotLoggedIn.into()),
        }
    }

    pub fn clear_bets(&mut self) -> Vec<Bet> {
        match &mut self.state {
            SessionState::LoggedIn { pending, .. } => std::mem::take(pending),
            SessionState::LoggedOut => Vec::new(),
        }
    }

    /// Draws, settles every pending bet once, and persists the new balance.
    /// If the write fails the stored balance is unchanged and the bets are gone.
    pub async fn spin(&mut self) -> Result<SpinReport> {
        let balance = self.balance()?;
        if self.pending_bets().is_empty() {
            return Err(SessionError::NoBetsPlaced.into());
        }

        let SessionController {
            store,
            engine,
            state,
            ..
        } = self;
        let SessionState::LoggedIn { username, pending } = state else {
            return Err(SessionError::NotLoggedIn.into());
        };

        let spin = engine.spin(std::mem::take(pending));
        let new_balance = match balance.apply_delta(spin.net_delta) {
            Some(new_balance) => new_balance,
            None if spin.net_delta > 0 => {
                warn!("{username} reached the balance limit of {}", Credits::MAX);
                Credits::MAX
            }
            None => {
                return Err(SessionError::InsufficientFunds {
                    needed: spin.total_staked(),
                    available: balance,
                }
                .into())
            }
        };
        store.update_balance(username, new_balance).await?;
        info!(
            "{username} spun {}: net {}, balance {new_balance}",
            spin.outcome, spin.net_delta
        );

        Ok(SpinReport {
            spin,
            balance: new_balance,
        })
    }

    pub async fn set_start_balance(&mut self, amount: Credits) -> Result<()> {
        let actor = self.require_user()?.to_string();
        self.config = self
            .store
            .set_start_balance(&actor, amount, &self.config)
            .await?;
        Ok(())
    }

    pub async fn set_theme(&mut self, theme: UiTheme) -> Result<()> {
        let actor = self.require_user()?.to_string();
        self.config = self.store.set_theme(&actor, theme, &self.config).await?;
        Ok(())
    }

    pub fn payout_table(&self) -> &'static [PayoutEntry] {
        &PAYOUT_TABLE
    }
}

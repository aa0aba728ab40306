use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{error, info};
use rand::RngCore;
use std::fmt::Write as _;
use std::io::{IsTerminal, Write as _};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::bet::{BetRequest, BetValidator};
use crate::config::{Config, UiTheme, CONFIG_FILE};
use crate::credits::{Credits, Delta, ParseCreditsError};
use crate::error::{AuthError, RouletteError};
use crate::payout;
use crate::roulette::{ParsePocketError, Pocket, SpinEngine};
use crate::session::{SessionController, SpinReport};
use crate::store::AccountStore;

const HELP: &str = "\
Commands:
  register <user> [password] [start]   create an account (custom start balance: admins only)
  login <user> [password]              sit down at the table
                                       a left-out password is asked for without echo
  logout                               leave, unresolved bets are dropped
  balance                              show your balance
  bet straight <n> <stake>             n is 0, 00 or 1-36
  bet split|street|corner|sixline <n,n,...> <stake>
  bet red|black|even|odd|low|high <stake>
  bet dozen|column <1-3> <stake>
  bets                                 list bets on the table
  clear                                take all bets back
  spin                                 spin the wheel
  payouts                              show the payout table
  admin start-balance <amount>         set the default starting balance
  admin theme <light|dark|system>      set the ui theme
  help | quit";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Amount(#[from] ParseCreditsError),

    #[error(transparent)]
    Pocket(#[from] ParsePocketError),

    #[error("{0}")]
    Theme(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register {
        username: String,
        password: Option<String>,
        start_balance: Option<Credits>,
    },
    Login {
        username: String,
        password: Option<String>,
    },
    Logout,
    Balance,
    Bet(BetRequest),
    Bets,
    Clear,
    Spin,
    Payouts,
    SetStartBalance(Credits),
    SetTheme(UiTheme),
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((name, args)) = words.split_first() else {
            return Err(CommandError::Usage("help"));
        };

        match (name.to_ascii_lowercase().as_str(), args) {
            ("register", [username]) => Ok(Command::Register {
                username: username.to_string(),
                password: None,
                start_balance: None,
            }),
            ("register", [username, password]) => Ok(Command::Register {
                username: username.to_string(),
                password: Some(password.to_string()),
                start_balance: None,
            }),
            ("register", [username, password, start]) => Ok(Command::Register {
                username: username.to_string(),
                password: Some(password.to_string()),
                start_balance: Some(start.parse()?),
            }),
            ("register", _) => Err(CommandError::Usage("register <user> [password] [start]")),
            ("login", [username]) => Ok(Command::Login {
                username: username.to_string(),
                password: None,
            }),
            ("login", [username, password]) => Ok(Command::Login {
                username: username.to_string(),
                password: Some(password.to_string()),
            }),
            ("login", _) => Err(CommandError::Usage("login <user> [password]")),
            ("logout", []) => Ok(Command::Logout),
            ("balance", []) => Ok(Command::Balance),
            ("bet", args) => parse_bet(args).map(Command::Bet),
            ("bets", []) => Ok(Command::Bets),
            ("clear", []) => Ok(Command::Clear),
            ("spin", []) => Ok(Command::Spin),
            ("payouts", []) => Ok(Command::Payouts),
            ("admin", ["start-balance", amount]) => Ok(Command::SetStartBalance(amount.parse()?)),
            ("admin", ["theme", theme]) => theme
                .parse()
                .map(Command::SetTheme)
                .map_err(CommandError::Theme),
            ("admin", _) => Err(CommandError::Usage(
                "admin start-balance <amount> | admin theme <light|dark|system>",
            )),
            ("help", _) => Ok(Command::Help),
            ("quit" | "exit", _) => Ok(Command::Quit),
            (other, _) => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

impl Command {
    /// The password still to be asked for, if this command needs one.
    fn missing_password(&mut self) -> Option<&mut Option<String>> {
        match self {
            Command::Register { password, .. } | Command::Login { password, .. }
                if password.is_none() =>
            {
                Some(password)
            }
            _ => None,
        }
    }
}

fn parse_selection(raw: &str) -> Result<Vec<Pocket>, CommandError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(CommandError::from))
        .collect()
}

fn parse_index(raw: &str) -> Result<u8, CommandError> {
    match raw.trim() {
        "1" => Ok(1),
        "2" => Ok(2),
        "3" => Ok(3),
        _ => Err(CommandError::Usage("bet dozen|column <1-3> <stake>")),
    }
}

fn parse_bet(args: &[&str]) -> Result<BetRequest, CommandError> {
    let Some((kind, rest)) = args.split_first() else {
        return Err(CommandError::Usage("bet <type> [selection] <stake>"));
    };

    match (kind.to_ascii_lowercase().as_str(), rest) {
        ("straight", [pocket, stake]) => {
            Ok(BetRequest::straight(pocket.parse()?, stake.parse()?))
        }
        ("split", [selection, stake]) => Ok(BetRequest::split(
            parse_selection(selection)?,
            stake.parse()?,
        )),
        ("street", [selection, stake]) => Ok(BetRequest::street(
            parse_selection(selection)?,
            stake.parse()?,
        )),
        ("corner", [selection, stake]) => Ok(BetRequest::corner(
            parse_selection(selection)?,
            stake.parse()?,
        )),
        ("sixline" | "six-line", [selection, stake]) => Ok(BetRequest::six_line(
            parse_selection(selection)?,
            stake.parse()?,
        )),
        ("red", [stake]) => Ok(BetRequest::red(stake.parse()?)),
        ("black", [stake]) => Ok(BetRequest::black(stake.parse()?)),
        ("even", [stake]) => Ok(BetRequest::even(stake.parse()?)),
        ("odd", [stake]) => Ok(BetRequest::odd(stake.parse()?)),
        ("low" | "1-18", [stake]) => Ok(BetRequest::low(stake.parse()?)),
        ("high" | "19-36", [stake]) => Ok(BetRequest::high(stake.parse()?)),
        ("dozen", [index, stake]) => Ok(BetRequest::dozen(parse_index(index)?, stake.parse()?)),
        ("column", [index, stake]) => {
            Ok(BetRequest::column(parse_index(index)?, stake.parse()?))
        }
        _ => Err(CommandError::Usage("bet <type> [selection] <stake>, see 'help'")),
    }
}

fn format_report(report: &SpinReport) -> String {
    let mut out = String::new();
    let outcome = report.spin.outcome;
    let _ = writeln!(out, "Ball lands on {outcome} ({})", outcome.color());
    for result in &report.spin.results {
        let verdict = if result.won { "won " } else { "lost" };
        let _ = writeln!(out, "  {verdict} {} {}", result.bet, Delta(result.delta()));
    }
    let _ = write!(
        out,
        "Net {}, balance {}",
        Delta(report.spin.net_delta),
        report.balance
    );
    out
}

fn format_chips(stake: Credits) -> String {
    BetValidator::chips(stake)
        .iter()
        .map(|(chip, count)| match count {
            1 => chip.to_string(),
            n => format!("{n} x {chip}"),
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Runs one command against the session and returns what to print.
pub async fn execute<R: RngCore>(
    session: &mut SessionController<R>,
    command: Command,
) -> Result<String, RouletteError> {
    let reply = match command {
        Command::Register {
            username,
            password,
            start_balance,
        } => {
            let password = password.ok_or(AuthError::MissingPassword)?;
            let balance = session
                .register(&username, &password, start_balance)
                .await?;
            format!("Registered {}. Starting balance: {balance}", username.trim())
        }
        Command::Login { username, password } => {
            let password = password.ok_or(AuthError::MissingPassword)?;
            let balance = session.login(&username, &password)?;
            format!("Welcome, {}. Balance: {balance}", username.trim())
        }
        Command::Logout => match session.logout() {
            0 => "Logged out.".to_string(),
            n => format!("Logged out, {n} unresolved bets discarded."),
        },
        Command::Balance => format!("Balance: {}", session.balance()?),
        Command::Bet(request) => {
            let bet = session.place_bet(request)?;
            let line = format!("Bet placed: {bet} [{}]", format_chips(bet.stake()));
            let total: u64 = session.pending_bets().iter().map(|b| b.stake().cents()).sum();
            format!(
                "{line}\n{} bets, {} on the table",
                session.pending_bets().len(),
                Credits::from_cents(total)
            )
        }
        Command::Bets => {
            let bets = session.pending_bets();
            if bets.is_empty() {
                "No bets on the table.".to_string()
            } else {
                bets.iter()
                    .enumerate()
                    .map(|(i, bet)| format!("{}. {bet}", i + 1))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        Command::Clear => format!("Took back {} bets.", session.clear_bets().len()),
        Command::Spin => format_report(&session.spin().await?),
        Command::Payouts => payout::render(session.payout_table()),
        Command::SetStartBalance(amount) => {
            session.set_start_balance(amount).await?;
            format!("Starting balance is now {amount}")
        }
        Command::SetTheme(theme) => {
            session.set_theme(theme).await?;
            format!("Theme is now {theme}")
        }
        Command::Help => HELP.to_string(),
        Command::Quit => "Goodbye!".to_string(),
    };
    Ok(reply)
}

fn prompt<R: RngCore>(session: &SessionController<R>) -> Result<()> {
    let mut stdout = std::io::stdout();
    match session.current_user() {
        Some(user) => write!(stdout, "{user}> ")?,
        None => write!(stdout, "> ")?,
    }
    stdout.flush()?;
    Ok(())
}

/// Reads keys in raw mode so nothing is echoed. `None` when cancelled with Esc or Ctrl+C.
fn read_hidden() -> std::io::Result<Option<String>> {
    enable_raw_mode()?;
    let entered = read_keys();
    disable_raw_mode()?;
    println!();
    entered
}

fn read_keys() -> std::io::Result<Option<String>> {
    let mut password = String::new();
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }
        match (code, modifiers) {
            (KeyCode::Enter, _) => return Ok(Some(password)),
            (KeyCode::Esc, _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => return Ok(None),
            (KeyCode::Backspace, _) => {
                password.pop();
            }
            (KeyCode::Char(c), _) => password.push(c),
            _ => {}
        }
    }
}

/// Hidden on a terminal; piped input just supplies the next line.
async fn read_password(lines: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>> {
    let mut stdout = std::io::stdout();
    write!(stdout, "Password: ")?;
    stdout.flush()?;
    if std::io::stdin().is_terminal() {
        tokio::task::spawn_blocking(read_hidden)
            .await?
            .context("could not read the password")
    } else {
        Ok(lines.next_line().await?)
    }
}

pub async fn start(data_dir: PathBuf, accounts_file: &str, seed: Option<u64>) -> Result<()> {
    let config_path = data_dir.join(CONFIG_FILE);
    let accounts_path = data_dir.join(accounts_file);

    let config = Config::load_or_init(&config_path).await;
    let store = AccountStore::load(accounts_path, config_path)
        .await
        .context("account data cannot be trusted, refusing to start")?;
    let engine = match seed {
        Some(seed) => {
            info!("wheel seeded with {seed}");
            SpinEngine::seeded(seed)
        }
        None => SpinEngine::from_entropy(),
    };
    let mut session = SessionController::new(config, store, engine);

    println!("American Roulette (0 and 00). Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&session)?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let mut command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(why) => {
                println!("{why}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Some(slot) = command.missing_password() {
            match read_password(&mut lines).await? {
                Some(password) => *slot = Some(password),
                None => {
                    println!("Cancelled.");
                    continue;
                }
            }
        }

        match execute(&mut session, command).await {
            Ok(reply) => println!("{reply}"),
            Err(RouletteError::Persistence(why)) => {
                error!("{why}");
                return Err(why).context("could not save game data, ending the session");
            }
            Err(why) => println!("Error: {why}"),
        }
    }

    let dropped = session.logout();
    if dropped > 0 {
        println!("{dropped} unresolved bets discarded.");
    }
    println!("Goodbye!");
    Ok(())
}

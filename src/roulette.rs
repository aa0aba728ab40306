use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::bet::Bet;
use crate::credits::Credits;

/// Red numbers on an American wheel. Every other number from 1 to 36 is black.
pub const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

/// One of the 38 pockets. `Number` only ever holds 1..=36.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pocket {
    Zero,
    DoubleZero,
    Number(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Black,
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parity {
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Range {
    Low,
    High,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("'{0}' is not a pocket (use 0, 00 or 1-36)")]
pub struct ParsePocketError(pub String);

impl Pocket {
    pub const COUNT: usize = 38;

    pub fn number(n: u8) -> Option<Pocket> {
        (1..=36).contains(&n).then_some(Pocket::Number(n))
    }

    /// Maps 0..38 onto the wheel: 0, 00, then 1 through 36.
    pub fn from_index(index: usize) -> Option<Pocket> {
        match index {
            0 => Some(Pocket::Zero),
            1 => Some(Pocket::DoubleZero),
            i if i < Self::COUNT => Some(Pocket::Number((i - 1) as u8)),
            _ => None,
        }
    }

    pub fn all() -> impl Iterator<Item = Pocket> {
        (0..Self::COUNT).filter_map(Pocket::from_index)
    }

    pub fn is_valid(self) -> bool {
        match self {
            Pocket::Number(n) => (1..=36).contains(&n),
            Pocket::Zero | Pocket::DoubleZero => true,
        }
    }

    fn value(self) -> Option<u8> {
        match self {
            Pocket::Number(n) => Some(n),
            Pocket::Zero | Pocket::DoubleZero => None,
        }
    }

    pub fn color(self) -> Color {
        match self.value() {
            Some(n) if RED_NUMBERS.contains(&n) => Color::Red,
            Some(_) => Color::Black,
            None => Color::Green,
        }
    }

    pub fn parity(self) -> Option<Parity> {
        self.value()
            .map(|n| if n % 2 == 0 { Parity::Even } else { Parity::Odd })
    }

    pub fn range(self) -> Option<Range> {
        self.value()
            .map(|n| if n <= 18 { Range::Low } else { Range::High })
    }

    /// 1 = 1-12, 2 = 13-24, 3 = 25-36.
    pub fn dozen(self) -> Option<u8> {
        self.value().map(|n| (n - 1) / 12 + 1)
    }

    /// 1 = 1, 4, 7 ...; 2 = 2, 5, 8 ...; 3 = 3, 6, 9 ...
    pub fn column(self) -> Option<u8> {
        self.value().map(|n| (n - 1) % 3 + 1)
    }
}

impl fmt::Display for Pocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pocket::Zero => f.write_str("0"),
            Pocket::DoubleZero => f.write_str("00"),
            Pocket::Number(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Pocket {
    type Err = ParsePocketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(Pocket::Zero),
            "00" => Ok(Pocket::DoubleZero),
            other => other
                .parse::<u8>()
                .ok()
                .filter(|_| !other.starts_with(['0', '+']))
                .and_then(Pocket::number)
                .ok_or_else(|| ParsePocketError(s.trim().to_string())),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Color::Red => "red",
            Color::Black => "black",
            Color::Green => "green",
        })
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Parity::Even => "even",
            Parity::Odd => "odd",
        })
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Range::Low => "1-18",
            Range::High => "19-36",
        })
    }
}

/// How a single bet came out. `amount` is the profit on a win and the stake on a loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetResult {
    pub bet: Bet,
    pub won: bool,
    pub amount: Credits,
}

impl BetResult {
    pub fn delta(&self) -> i64 {
        let cents = i64::try_from(self.amount.cents()).unwrap_or(i64::MAX);
        if self.won {
            cents
        } else {
            -cents
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinOutcome {
    pub outcome: Pocket,
    pub results: Vec<BetResult>,
    pub net_delta: i64,
}

impl SpinOutcome {
    pub fn total_staked(&self) -> Credits {
        Credits::from_cents(self.results.iter().map(|r| r.bet.stake().cents()).sum())
    }
}

/// Settles bets against a known outcome. Winners get `stake * ratio`, losers forfeit the stake.
pub fn resolve(bets: Vec<Bet>, outcome: Pocket) -> SpinOutcome {
    let results: Vec<BetResult> = bets
        .into_iter()
        .map(|bet| {
            if bet.covers(outcome) {
                let amount = bet.stake().saturating_mul(bet.bet_type().ratio());
                BetResult {
                    bet,
                    won: true,
                    amount,
                }
            } else {
                let amount = bet.stake();
                BetResult {
                    bet,
                    won: false,
                    amount,
                }
            }
        })
        .collect();
    let net_delta = results
        .iter()
        .map(BetResult::delta)
        .fold(0, i64::saturating_add);

    SpinOutcome {
        outcome,
        results,
        net_delta,
    }
}

/// The wheel. The random source is injected so tests can seed it.
pub struct SpinEngine<R = StdRng> {
    rng: R,
}

impl SpinEngine<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore> SpinEngine<R> {
    pub fn new(rng: R) -> Self {
        SpinEngine { rng }
    }

    pub fn draw(&mut self) -> Pocket {
        let index = self.rng.gen_range(0..Pocket::COUNT);
        Pocket::from_index(index).unwrap_or(Pocket::Zero)
    }

    pub fn spin(&mut self, bets: Vec<Bet>) -> SpinOutcome {
        let outcome = self.draw();
        let settled = resolve(bets, outcome);
        debug!(
            "ball landed on {} ({}), {} bets, net {}",
            outcome,
            outcome.color(),
            settled.results.len(),
            settled.net_delta
        );
        settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bet::{BetRequest, BetValidator};
    use std::collections::HashMap;

    fn straight(pocket: Pocket, stake: Credits) -> Bet {
        BetValidator::validate(BetRequest::straight(pocket, stake)).unwrap()
    }

    #[test]
    fn test_pocket_set() {
        let pockets: Vec<Pocket> = Pocket::all().collect();
        assert_eq!(pockets.len(), 38);
        assert_eq!(pockets[0], Pocket::Zero);
        assert_eq!(pockets[1], Pocket::DoubleZero);
        assert_eq!(pockets[37], Pocket::Number(36));
        assert!(pockets.iter().all(|p| p.is_valid()));
        assert_eq!(Pocket::from_index(38), None);
    }

    #[test]
    fn test_pocket_attributes() {
        let seven = Pocket::Number(7);
        assert_eq!(seven.color(), Color::Red);
        assert_eq!(seven.parity(), Some(Parity::Odd));
        assert_eq!(seven.range(), Some(Range::Low));
        assert_eq!(seven.dozen(), Some(1));
        assert_eq!(seven.column(), Some(1));

        let twenty_four = Pocket::Number(24);
        assert_eq!(twenty_four.color(), Color::Black);
        assert_eq!(twenty_four.parity(), Some(Parity::Even));
        assert_eq!(twenty_four.range(), Some(Range::High));
        assert_eq!(twenty_four.dozen(), Some(2));
        assert_eq!(twenty_four.column(), Some(3));

        for zero in [Pocket::Zero, Pocket::DoubleZero] {
            assert_eq!(zero.color(), Color::Green);
            assert_eq!(zero.parity(), None);
            assert_eq!(zero.range(), None);
            assert_eq!(zero.dozen(), None);
            assert_eq!(zero.column(), None);
        }

        let reds = Pocket::all().filter(|p| p.color() == Color::Red).count();
        let blacks = Pocket::all().filter(|p| p.color() == Color::Black).count();
        assert_eq!((reds, blacks), (18, 18));
    }

    #[test]
    fn test_pocket_parsing() {
        assert_eq!("0".parse(), Ok(Pocket::Zero));
        assert_eq!("00".parse(), Ok(Pocket::DoubleZero));
        assert_eq!(" 17 ".parse(), Ok(Pocket::Number(17)));
        assert!("37".parse::<Pocket>().is_err());
        assert!("07".parse::<Pocket>().is_err());
        assert!("000".parse::<Pocket>().is_err());
        assert!("red".parse::<Pocket>().is_err());
        assert!("+5".parse::<Pocket>().is_err());
        for pocket in Pocket::all() {
            assert_eq!(pocket.to_string().parse(), Ok(pocket));
        }
    }

    #[test]
    fn test_red_pays_even_money() {
        let red = BetValidator::validate(BetRequest::red(Credits::whole(10))).unwrap();
        let settled = resolve(vec![red], Pocket::Number(7));
        assert_eq!(settled.net_delta, 1000);
        assert!(settled.results[0].won);
    }

    #[test]
    fn test_largest_stake_settles_without_overflow() {
        let bet = straight(Pocket::Number(17), Credits::MAX);
        let settled = resolve(vec![bet], Pocket::Number(17));
        let expected = Credits::MAX.cents() * 35;
        assert_eq!(settled.results[0].amount, Credits::from_cents(expected));
        assert_eq!(settled.net_delta, expected as i64);
    }

    #[test]
    fn test_zero_loses_straight_on_seventeen() {
        let bet = straight(Pocket::Number(17), Credits::whole(5));
        let settled = resolve(vec![bet], Pocket::Zero);
        assert_eq!(settled.net_delta, -500);
        assert!(!settled.results[0].won);
        assert_eq!(settled.results[0].amount, Credits::whole(5));
    }

    #[test]
    fn test_exactly_one_straight_wins() {
        for outcome in Pocket::all() {
            let bets: Vec<Bet> = Pocket::all()
                .map(|p| straight(p, Credits::whole(1)))
                .collect();
            let settled = resolve(bets, outcome);
            let winners: Vec<&BetResult> = settled.results.iter().filter(|r| r.won).collect();
            assert_eq!(winners.len(), 1);
            assert!(winners[0].bet.covers(outcome));
            // 35 profit on the winner, 37 lost stakes.
            assert_eq!(settled.net_delta, 3500 - 3700);
        }
    }

    #[test]
    fn test_net_delta_matches_results() {
        let bets = vec![
            BetValidator::validate(BetRequest::red(Credits::whole(5))).unwrap(),
            BetValidator::validate(BetRequest::dozen(3, Credits::whole(10))).unwrap(),
            BetValidator::validate(BetRequest::corner(
                [8, 9, 11, 12].map(Pocket::Number).to_vec(),
                Credits::from_cents(50),
            ))
            .unwrap(),
        ];
        let mut engine = SpinEngine::seeded(7);
        for _ in 0..200 {
            let settled = engine.spin(bets.clone());
            let wins: i64 = settled
                .results
                .iter()
                .filter(|r| r.won)
                .map(|r| (r.bet.stake().cents() * r.bet.bet_type().ratio()) as i64)
                .sum();
            let losses: i64 = settled
                .results
                .iter()
                .filter(|r| !r.won)
                .map(|r| r.bet.stake().cents() as i64)
                .sum();
            assert_eq!(settled.net_delta, wins - losses);
            assert!(settled.net_delta >= -(settled.total_staked().cents() as i64));
        }
    }

    #[test]
    fn test_seeded_engine_is_reproducible() {
        let mut first = SpinEngine::seeded(42);
        let mut second = SpinEngine::seeded(42);
        let a: Vec<Pocket> = (0..50).map(|_| first.draw()).collect();
        let b: Vec<Pocket> = (0..50).map(|_| second.draw()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_draw_reaches_every_pocket() {
        let mut engine = SpinEngine::seeded(1);
        let mut counts: HashMap<Pocket, u32> = HashMap::new();
        for _ in 0..38_000 {
            *counts.entry(engine.draw()).or_default() += 1;
        }
        assert_eq!(counts.len(), 38);
        // Expected 1000 each; a loose bound keeps the test stable.
        assert!(counts.values().all(|&c| (700..1300).contains(&c)));
    }
}

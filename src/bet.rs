use std::collections::BTreeSet;
use std::fmt;

use crate::credits::Credits;
use crate::error::ValidationError;
use crate::payout::{self, Field};
use crate::roulette::{Color, Parity, Pocket, Range};

/// Chip denominations a stake is built from.
pub const ALLOWED_CHIPS: [Credits; 6] = [
    Credits::from_cents(50),
    Credits::whole(1),
    Credits::whole(2),
    Credits::whole(5),
    Credits::whole(10),
    Credits::whole(25),
];

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BetType {
    Straight,
    Split,
    Street,
    Corner,
    SixLine,
    Column,
    Dozen,
    RedBlack,
    EvenOdd,
    HighLow,
}

impl BetType {
    pub const ALL: [BetType; 10] = [
        BetType::Straight,
        BetType::Split,
        BetType::Street,
        BetType::Corner,
        BetType::SixLine,
        BetType::Column,
        BetType::Dozen,
        BetType::RedBlack,
        BetType::EvenOdd,
        BetType::HighLow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BetType::Straight => "Straight",
            BetType::Split => "Split",
            BetType::Street => "Street",
            BetType::Corner => "Corner",
            BetType::SixLine => "Six Line",
            BetType::Column => "Column",
            BetType::Dozen => "Dozen",
            BetType::RedBlack => "Red/Black",
            BetType::EvenOdd => "Even/Odd",
            BetType::HighLow => "1-18/19-36",
        }
    }

    pub fn ratio(self) -> u64 {
        payout::entry(self).ratio
    }

    pub fn field(self) -> Field {
        payout::entry(self).field
    }

    pub fn minimum(self) -> Credits {
        payout::entry(self).minimum
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// An unchecked bet as entered by the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetRequest {
    pub bet_type: BetType,
    pub selection: Vec<Pocket>,
    pub stake: Credits,
}

impl BetRequest {
    pub fn new(bet_type: BetType, selection: Vec<Pocket>, stake: Credits) -> Self {
        BetRequest {
            bet_type,
            selection,
            stake,
        }
    }

    pub fn straight(pocket: Pocket, stake: Credits) -> Self {
        Self::new(BetType::Straight, vec![pocket], stake)
    }

    pub fn split(pockets: Vec<Pocket>, stake: Credits) -> Self {
        Self::new(BetType::Split, pockets, stake)
    }

    pub fn street(pockets: Vec<Pocket>, stake: Credits) -> Self {
        Self::new(BetType::Street, pockets, stake)
    }

    pub fn corner(pockets: Vec<Pocket>, stake: Credits) -> Self {
        Self::new(BetType::Corner, pockets, stake)
    }

    pub fn six_line(pockets: Vec<Pocket>, stake: Credits) -> Self {
        Self::new(BetType::SixLine, pockets, stake)
    }

    fn category(bet_type: BetType, keep: impl Fn(Pocket) -> bool, stake: Credits) -> Self {
        Self::new(bet_type, Pocket::all().filter(|p| keep(*p)).collect(), stake)
    }

    pub fn red(stake: Credits) -> Self {
        Self::category(BetType::RedBlack, |p| p.color() == Color::Red, stake)
    }

    pub fn black(stake: Credits) -> Self {
        Self::category(BetType::RedBlack, |p| p.color() == Color::Black, stake)
    }

    pub fn even(stake: Credits) -> Self {
        Self::category(BetType::EvenOdd, |p| p.parity() == Some(Parity::Even), stake)
    }

    pub fn odd(stake: Credits) -> Self {
        Self::category(BetType::EvenOdd, |p| p.parity() == Some(Parity::Odd), stake)
    }

    pub fn low(stake: Credits) -> Self {
        Self::category(BetType::HighLow, |p| p.range() == Some(Range::Low), stake)
    }

    pub fn high(stake: Credits) -> Self {
        Self::category(BetType::HighLow, |p| p.range() == Some(Range::High), stake)
    }

    /// `dozen` is 1, 2 or 3. Anything else yields an empty selection the validator rejects.
    pub fn dozen(dozen: u8, stake: Credits) -> Self {
        Self::category(BetType::Dozen, |p| p.dozen() == Some(dozen), stake)
    }

    pub fn column(column: u8, stake: Credits) -> Self {
        Self::category(BetType::Column, |p| p.column() == Some(column), stake)
    }
}

/// A validated bet. Only [`BetValidator::validate`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bet {
    bet_type: BetType,
    covered: BTreeSet<Pocket>,
    stake: Credits,
}

impl Bet {
    pub fn bet_type(&self) -> BetType {
        self.bet_type
    }

    pub fn covered(&self) -> &BTreeSet<Pocket> {
        &self.covered
    }

    pub fn stake(&self) -> Credits {
        self.stake
    }

    pub fn covers(&self, pocket: Pocket) -> bool {
        self.covered.contains(&pocket)
    }

    /// Short label for the selection, e.g. `8, 9, 11, 12` or `red`.
    pub fn selection_label(&self) -> String {
        let first = self.covered.iter().next().copied();
        match (self.bet_type, first) {
            (BetType::RedBlack, Some(p)) => p.color().to_string(),
            (BetType::EvenOdd, Some(p)) => p.parity().map(|x| x.to_string()).unwrap_or_default(),
            (BetType::HighLow, Some(p)) => p.range().map(|x| x.to_string()).unwrap_or_default(),
            (BetType::Dozen, Some(p)) => match p.dozen() {
                Some(1) => "1-12".to_string(),
                Some(2) => "13-24".to_string(),
                _ => "25-36".to_string(),
            },
            (BetType::Column, Some(p)) => format!("column {}", p.column().unwrap_or_default()),
            _ => join_pockets(self.covered.iter().copied()),
        }
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {}",
            self.bet_type,
            self.selection_label(),
            self.stake
        )
    }
}

fn join_pockets(pockets: impl Iterator<Item = Pocket>) -> String {
    pockets.map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
}

fn set<const N: usize>(pockets: [Pocket; N]) -> BTreeSet<Pocket> {
    pockets.into_iter().collect()
}

fn numbers(range: impl Iterator<Item = u8>) -> BTreeSet<Pocket> {
    range.map(Pocket::Number).collect()
}

/// Layout rows are `3r+1, 3r+2, 3r+3` for r in 0..12.
fn row(r: u8) -> BTreeSet<Pocket> {
    numbers(3 * r + 1..=3 * r + 3)
}

pub struct BetValidator;

impl BetValidator {
    /// Checks stake, field minimum and layout geometry, in that order.
    pub fn validate(request: BetRequest) -> Result<Bet, ValidationError> {
        let BetRequest {
            bet_type,
            selection,
            stake,
        } = request;

        Self::check_stake(bet_type, stake)?;

        let invalid = || ValidationError::InvalidCombination {
            bet_type,
            selection: join_pockets(selection.iter().copied()),
        };
        if selection.iter().any(|p| !p.is_valid()) {
            return Err(invalid());
        }
        let covered: BTreeSet<Pocket> = selection.iter().copied().collect();
        if covered.len() != selection.len() {
            return Err(invalid());
        }
        if !Self::valid_combinations(bet_type).contains(&covered) {
            return Err(invalid());
        }

        Ok(Bet {
            bet_type,
            covered,
            stake,
        })
    }

    pub fn check_stake(bet_type: BetType, stake: Credits) -> Result<(), ValidationError> {
        if !stake.is_within_limit() {
            return Err(ValidationError::AboveLimit(stake));
        }
        if !Self::is_chip_sum(stake) {
            return Err(ValidationError::InvalidStake(stake));
        }
        let minimum = bet_type.minimum();
        if stake < minimum {
            return Err(ValidationError::BelowMinimum {
                bet_type,
                stake,
                minimum,
            });
        }
        Ok(())
    }

    /// The smallest chip is 0.50, so every positive multiple of it is reachable.
    pub fn is_chip_sum(stake: Credits) -> bool {
        let smallest = ALLOWED_CHIPS[0].cents();
        !stake.is_zero() && stake.cents() % smallest == 0
    }

    /// Greedy breakdown into `(chip, count)`, largest first. Empty when the stake is not a chip sum.
    pub fn chips(stake: Credits) -> Vec<(Credits, u64)> {
        if !Self::is_chip_sum(stake) {
            return Vec::new();
        }
        let mut remaining = stake.cents();
        let mut chips = Vec::new();
        for chip in ALLOWED_CHIPS.iter().rev() {
            let count = remaining / chip.cents();
            if count > 0 {
                remaining -= count * chip.cents();
                chips.push((*chip, count));
            }
        }
        chips
    }

    /// Every pocket set a bet of this type may cover on the American layout.
    pub fn valid_combinations(bet_type: BetType) -> Vec<BTreeSet<Pocket>> {
        use crate::roulette::Pocket::{DoubleZero as Dz, Number as N, Zero as Z};

        match bet_type {
            BetType::Straight => Pocket::all().map(|p| set([p])).collect(),
            BetType::Split => {
                let mut splits = vec![
                    set([Z, Dz]),
                    set([Z, N(1)]),
                    set([Z, N(2)]),
                    set([Dz, N(2)]),
                    set([Dz, N(3)]),
                ];
                for n in 1..=36u8 {
                    if n % 3 != 0 {
                        splits.push(set([N(n), N(n + 1)]));
                    }
                    if n <= 33 {
                        splits.push(set([N(n), N(n + 3)]));
                    }
                }
                splits
            }
            BetType::Street => {
                let mut streets: Vec<_> = (0..12).map(row).collect();
                streets.push(set([Z, N(1), N(2)]));
                streets.push(set([Z, Dz, N(2)]));
                streets.push(set([Dz, N(2), N(3)]));
                streets
            }
            BetType::Corner => (1..=32u8)
                .filter(|n| n % 3 != 0)
                .map(|n| set([N(n), N(n + 1), N(n + 3), N(n + 4)]))
                .collect(),
            BetType::SixLine => (0..11u8).map(|r| numbers(3 * r + 1..=3 * r + 6)).collect(),
            BetType::Column => (1..=3)
                .map(|c| BetRequest::column(c, Credits::ZERO).selection)
                .map(|s| s.into_iter().collect::<BTreeSet<_>>())
                .collect(),
            BetType::Dozen => (1..=3)
                .map(|d| BetRequest::dozen(d, Credits::ZERO).selection)
                .map(|s| s.into_iter().collect::<BTreeSet<_>>())
                .collect(),
            BetType::RedBlack => [BetRequest::red, BetRequest::black]
                .map(|build| build(Credits::ZERO).selection.into_iter().collect::<BTreeSet<_>>())
                .to_vec(),
            BetType::EvenOdd => [BetRequest::even, BetRequest::odd]
                .map(|build| build(Credits::ZERO).selection.into_iter().collect::<BTreeSet<_>>())
                .to_vec(),
            BetType::HighLow => [BetRequest::low, BetRequest::high]
                .map(|build| build(Credits::ZERO).selection.into_iter().collect::<BTreeSet<_>>())
                .to_vec(),
        }
    }
}

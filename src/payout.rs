use std::fmt::Write;

use crate::bet::BetType;
use crate::credits::Credits;

pub const MIN_INSIDE_BET: Credits = Credits::from_cents(50);
pub const MIN_OUTSIDE_BET: Credits = Credits::whole(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Inner,
    Outer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutEntry {
    pub bet_type: BetType,
    pub field: Field,
    /// Profit multiple, `ratio:1`.
    pub ratio: u64,
    pub minimum: Credits,
    pub covers: &'static str,
}

const fn inner(bet_type: BetType, ratio: u64, covers: &'static str) -> PayoutEntry {
    PayoutEntry {
        bet_type,
        field: Field::Inner,
        ratio,
        minimum: MIN_INSIDE_BET,
        covers,
    }
}

const fn outer(bet_type: BetType, ratio: u64, covers: &'static str) -> PayoutEntry {
    PayoutEntry {
        bet_type,
        field: Field::Outer,
        ratio,
        minimum: MIN_OUTSIDE_BET,
        covers,
    }
}

/// Indexed by `BetType as usize`.
pub const PAYOUT_TABLE: [PayoutEntry; 10] = [
    inner(BetType::Straight, 35, "one number, 0 and 00 included"),
    inner(BetType::Split, 17, "two adjacent numbers"),
    inner(BetType::Street, 11, "three numbers in a row"),
    inner(BetType::Corner, 8, "four numbers in a square"),
    inner(BetType::SixLine, 5, "six numbers, two rows"),
    outer(BetType::Column, 2, "column 1, 2 or 3"),
    outer(BetType::Dozen, 2, "1-12, 13-24 or 25-36"),
    outer(BetType::RedBlack, 1, "red or black"),
    outer(BetType::EvenOdd, 1, "even or odd"),
    outer(BetType::HighLow, 1, "1-18 or 19-36"),
];

pub fn entry(bet_type: BetType) -> &'static PayoutEntry {
    &PAYOUT_TABLE[bet_type as usize]
}

pub fn render(entries: &[PayoutEntry]) -> String {
    let mut out = String::new();
    for (field, heading) in [
        (Field::Inner, "Inner fields"),
        (Field::Outer, "Outer fields"),
    ] {
        let minimum = match field {
            Field::Inner => MIN_INSIDE_BET,
            Field::Outer => MIN_OUTSIDE_BET,
        };
        let _ = writeln!(out, "{heading} (min {minimum}):");
        for e in entries.iter().filter(|e| e.field == field) {
            let _ = writeln!(out, "  {:<9} {:>3}:1  {}", e.bet_type, e.ratio, e.covers);
        }
    }
    out.push_str("Chips: 0.50, 1, 2, 5, 10, 25. American Roulette contains 0 and 00.");
    out
}

//! Seeded, counter-indexed dice service.
//!
//! Every draw mixes the folded seed with the current counter and pushes it
//! through a PCG-XSH-RR output permutation, so the stream is a pure
//! function of `(seed, counter)`: draws can replay from any recorded
//! counter without regenerating the prefix. The counter advances by the
//! number of raw u32s consumed and every draw leaves a [`RollRecord`]
//! behind.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::fnv1a64;
use crate::state::{RngState, RollRecord};

/// PCG multiplier constant.
const PCG_MULTIPLIER: u64 = 6364136223846793005;

/// PCG increment constant.
const PCG_INCREMENT: u64 = 1442695040888963407;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RngError {
    /// A draw was requested while the RNG is unseeded.
    #[error("rng draw requested in unseeded mode")]
    NotSeeded,

    /// Dice request outside the supported shape (zero sides, zero count).
    #[error("invalid dice request: {0}")]
    InvalidRequest(String),
}

impl RngError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotSeeded => "RNG_NOT_SEEDED",
            Self::InvalidRequest(_) => "RNG_INVALID_REQUEST",
        }
    }
}

/// Advantage state for a d20 check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollMode {
    Normal,
    Advantage,
    Disadvantage,
}

/// Parsed dice notation: `NdS`, `NdS+M`, `NdS-M`, or bare `dS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiceExpr {
    pub count: u32,
    pub sides: u32,
    pub modifier: i64,
}

impl DiceExpr {
    pub fn new(count: u32, sides: u32, modifier: i64) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// Parse dice notation. Whitespace is not tolerated; notation is data,
    /// not user input.
    pub fn parse(notation: &str) -> Result<Self, RngError> {
        let invalid = || RngError::InvalidRequest(notation.to_owned());

        let (dice, modifier) = match notation.find(['+', '-']) {
            Some(split) => {
                let (dice, rest) = notation.split_at(split);
                let modifier: i64 = rest.parse().map_err(|_| invalid())?;
                (dice, modifier)
            }
            None => (notation, 0),
        };

        let (count_str, sides_str) = dice.split_once('d').ok_or_else(invalid)?;
        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str.parse().map_err(|_| invalid())?
        };
        let sides: u32 = sides_str.parse().map_err(|_| invalid())?;

        if count == 0 || sides == 0 {
            return Err(invalid());
        }
        Ok(Self {
            count,
            sides,
            modifier,
        })
    }

    fn notation(&self) -> String {
        if self.modifier == 0 {
            format!("{}d{}", self.count, self.sides)
        } else {
            format!("{}d{}{:+}", self.count, self.sides, self.modifier)
        }
    }
}

/// Outcome of a single recorded draw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollOutcome {
    pub total: i64,
    pub raw_draws: Vec<u32>,
}

fn pcg_step(state: u64) -> u64 {
    state.wrapping_mul(PCG_MULTIPLIER).wrapping_add(PCG_INCREMENT)
}

fn pcg_output(state: u64) -> u32 {
    let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
    let rot = (state >> 59) as u32;
    xorshifted.rotate_right(rot)
}

/// Fold a seed string into a 64-bit base state.
fn seed_state(seed: &str) -> u64 {
    fnv1a64(seed.as_bytes())
}

/// One raw u32 from `(seed, counter)`; advances the counter by one.
fn raw_draw(rng: &mut RngState) -> Result<u32, RngError> {
    let seed = match (&rng.mode, &rng.seed) {
        (crate::state::RngMode::Seeded, Some(seed)) if !seed.is_empty() => seed,
        _ => return Err(RngError::NotSeeded),
    };

    // Counter-indexed: mix the counter into the folded seed, then permute.
    let mixed = seed_state(seed) ^ rng.counter.wrapping_mul(0x9e3779b97f4a7c15);
    let value = pcg_output(pcg_step(mixed));
    rng.counter += 1;
    Ok(value)
}

fn die_from_raw(raw: u32, sides: u32) -> u32 {
    (raw % sides) + 1
}

fn record(
    rng: &mut RngState,
    kind: &str,
    request: String,
    total: i64,
    raw_draws: Vec<u32>,
    counter_before: u64,
) {
    rng.record(RollRecord {
        kind: kind.to_owned(),
        request,
        result_total: total,
        raw_draws,
        counter_before,
        counter_after: rng.counter,
    });
}

/// Roll a single die with the given number of sides, in `[1, sides]`.
pub fn roll_die(rng: &mut RngState, sides: u32) -> Result<u32, RngError> {
    if sides == 0 {
        return Err(RngError::InvalidRequest("d0".to_owned()));
    }
    let before = rng.counter;
    let raw = raw_draw(rng)?;
    let value = die_from_raw(raw, sides);
    record(rng, "die", format!("d{sides}"), value as i64, vec![raw], before);
    Ok(value)
}

/// Roll a dice expression (`NdS+M`): sum of dice plus modifier.
pub fn roll_dice(rng: &mut RngState, expr: &DiceExpr) -> Result<RollOutcome, RngError> {
    if expr.count == 0 || expr.sides == 0 {
        return Err(RngError::InvalidRequest(expr.notation()));
    }
    let before = rng.counter;
    let mut raw_draws = Vec::with_capacity(expr.count as usize);
    let mut total: i64 = expr.modifier;
    for _ in 0..expr.count {
        let raw = raw_draw(rng)?;
        total += die_from_raw(raw, expr.sides) as i64;
        raw_draws.push(raw);
    }
    record(rng, "dice", expr.notation(), total, raw_draws.clone(), before);
    Ok(RollOutcome { total, raw_draws })
}

/// Outcome of a d20 check, keeping the chosen natural roll visible for
/// crit / auto-miss decisions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckOutcome {
    /// The natural d20 kept after advantage/disadvantage selection.
    pub natural: u32,
    pub total: i64,
    pub raw_draws: Vec<u32>,
}

/// Roll `d20 + modifier`, under advantage or disadvantage when asked.
/// Advantage rolls twice and keeps the max; disadvantage keeps the min.
pub fn roll_check(
    rng: &mut RngState,
    modifier: i64,
    mode: RollMode,
) -> Result<CheckOutcome, RngError> {
    let before = rng.counter;
    let (natural, raw_draws, kind) = match mode {
        RollMode::Normal => {
            let raw = raw_draw(rng)?;
            (die_from_raw(raw, 20), vec![raw], "check")
        }
        RollMode::Advantage => {
            let first = raw_draw(rng)?;
            let second = raw_draw(rng)?;
            let kept = die_from_raw(first, 20).max(die_from_raw(second, 20));
            (kept, vec![first, second], "advantage")
        }
        RollMode::Disadvantage => {
            let first = raw_draw(rng)?;
            let second = raw_draw(rng)?;
            let kept = die_from_raw(first, 20).min(die_from_raw(second, 20));
            (kept, vec![first, second], "disadvantage")
        }
    };
    let total = natural as i64 + modifier;
    record(
        rng,
        kind,
        format!("d20{modifier:+}"),
        total,
        raw_draws.clone(),
        before,
    );
    Ok(CheckOutcome {
        natural,
        total,
        raw_draws,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RngState;

    #[test]
    fn same_seed_and_counter_reproduce_the_stream() {
        let mut a = RngState::seeded("e2e-1");
        let mut b = RngState::seeded("e2e-1");
        for _ in 0..16 {
            assert_eq!(roll_die(&mut a, 20).unwrap(), roll_die(&mut b, 20).unwrap());
        }
        assert_eq!(a.counter, 16);
        assert_eq!(a.counter, b.counter);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = RngState::seeded("alpha");
        let mut b = RngState::seeded("beta");
        let draws_a: Vec<u32> = (0..8).map(|_| roll_die(&mut a, 1000).unwrap()).collect();
        let draws_b: Vec<u32> = (0..8).map(|_| roll_die(&mut b, 1000).unwrap()).collect();
        assert_ne!(draws_a, draws_b);
    }

    #[test]
    fn unseeded_draw_is_refused() {
        let mut rng = RngState::unseeded();
        let err = roll_die(&mut rng, 6).unwrap_err();
        assert_eq!(err.code(), "RNG_NOT_SEEDED");
        assert_eq!(rng.counter, 0);
    }

    #[test]
    fn dice_sum_includes_modifier_and_advances_counter_per_die() {
        let mut rng = RngState::seeded("dice");
        let expr = DiceExpr::parse("3d6+2").unwrap();
        let outcome = roll_dice(&mut rng, &expr).unwrap();
        assert_eq!(rng.counter, 3);
        assert_eq!(outcome.raw_draws.len(), 3);
        assert!(outcome.total >= 3 + 2 && outcome.total <= 18 + 2);
    }

    #[test]
    fn advantage_consumes_two_draws_and_keeps_the_higher() {
        let mut rng = RngState::seeded("adv");
        let outcome = roll_check(&mut rng, 0, RollMode::Advantage).unwrap();
        assert_eq!(rng.counter, 2);
        let kept = outcome
            .raw_draws
            .iter()
            .map(|raw| (raw % 20) + 1)
            .max()
            .unwrap();
        assert_eq!(outcome.natural, kept);

        let mut rng2 = RngState::seeded("adv");
        let dis = roll_check(&mut rng2, 0, RollMode::Disadvantage).unwrap();
        let kept_min = dis.raw_draws.iter().map(|raw| (raw % 20) + 1).min().unwrap();
        assert_eq!(dis.natural, kept_min);
    }

    #[test]
    fn every_draw_is_recorded_with_contiguous_counters() {
        let mut rng = RngState::seeded("audit");
        roll_die(&mut rng, 6).unwrap();
        roll_check(&mut rng, 3, RollMode::Advantage).unwrap();
        let records = &rng.last_rolls;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].counter_before, 0);
        assert_eq!(records[0].counter_after, 1);
        assert_eq!(records[1].counter_before, 1);
        assert_eq!(records[1].counter_after, 3);
    }

    #[test]
    fn record_cap_does_not_touch_the_counter() {
        let mut rng = RngState::seeded("cap");
        for _ in 0..(MAX_RECORDS_PROBE) {
            roll_die(&mut rng, 6).unwrap();
        }
        assert_eq!(rng.last_rolls.len(), crate::state::MAX_ROLL_RECORDS);
        assert_eq!(rng.counter, MAX_RECORDS_PROBE as u64);
    }

    const MAX_RECORDS_PROBE: usize = crate::state::MAX_ROLL_RECORDS + 10;

    #[test]
    fn dice_notation_parsing() {
        assert_eq!(DiceExpr::parse("d6").unwrap(), DiceExpr::new(1, 6, 0));
        assert_eq!(DiceExpr::parse("2d8+3").unwrap(), DiceExpr::new(2, 8, 3));
        assert_eq!(DiceExpr::parse("1d4-1").unwrap(), DiceExpr::new(1, 4, -1));
        assert!(DiceExpr::parse("0d6").is_err());
        assert!(DiceExpr::parse("2x6").is_err());
        assert!(DiceExpr::parse("d0").is_err());
    }
}

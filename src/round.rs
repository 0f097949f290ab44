//! Round generation
//!
//! Every round of play has a risk profile the players know perfectly: the
//! multiplier paid on a win, the fraction lost on a loss and the probability
//! of winning. A [`Regime`] selects the rule that produces these parameters.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::SimError;

/// Smallest downside the stochastic regime will produce.
pub const DOWNSIDE_FLOOR: f64 = 0.1;

/// Risk profile of one round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundParameters {
    /// Upside multiplier (> 1)
    pub upside: f64,
    /// Downside fraction in (0, 1]
    pub downside: f64,
    /// Probability of a win in [0, 1]
    pub win_probability: f64,
}

impl RoundParameters {
    /// Build checked round parameters.
    ///
    /// Generators construct their values directly; this constructor exists for
    /// callers supplying their own rounds, whose downside must stay away from
    /// zero before it reaches the edge computation.
    pub fn new(upside: f64, downside: f64, win_probability: f64) -> Result<Self, SimError> {
        let valid = upside.is_finite()
            && upside >= 1.0
            && downside > 0.0
            && downside <= 1.0
            && (0.0..=1.0).contains(&win_probability);

        if !valid {
            return Err(SimError::DegenerateRoundParameters {
                upside,
                downside,
                win_probability,
            });
        }

        Ok(Self {
            upside,
            downside,
            win_probability,
        })
    }
}

/// Produces one round's parameters from a random stream.
pub trait RoundGenerator {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> RoundParameters;
}

/// Upside ~ U(1, 2), downside ~ U(0, 1) floored at 0.1, p ~ U(0, 1).
#[derive(Debug, Clone)]
pub struct StochasticRounds {
    upside: Uniform<f64>,
    unit: Uniform<f64>,
}

impl Default for StochasticRounds {
    fn default() -> Self {
        Self {
            upside: Uniform::new(1.0, 2.0),
            unit: Uniform::new(0.0, 1.0),
        }
    }
}

impl RoundGenerator for StochasticRounds {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> RoundParameters {
        let upside = self.upside.sample(rng);
        let downside = self.unit.sample(rng).max(DOWNSIDE_FLOOR);
        let win_probability = self.unit.sample(rng);

        RoundParameters {
            upside,
            downside,
            win_probability,
        }
    }
}

/// Deterministic rounds (upside 2, downside 1, p 0.6) for checking strategy math.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRounds;

impl RoundGenerator for StaticRounds {
    fn generate<R: Rng + ?Sized>(&self, _rng: &mut R) -> RoundParameters {
        RoundParameters {
            upside: 2.0,
            downside: 1.0,
            win_probability: 0.6,
        }
    }
}

/// Upside ~ U(1, 5), downside fixed at 1, p ~ U(0, 1) clamped to [0.2, 0.8].
#[derive(Debug, Clone)]
pub struct DynamicRounds {
    upside: Uniform<f64>,
    unit: Uniform<f64>,
}

impl Default for DynamicRounds {
    fn default() -> Self {
        Self {
            upside: Uniform::new(1.0, 5.0),
            unit: Uniform::new(0.0, 1.0),
        }
    }
}

impl RoundGenerator for DynamicRounds {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> RoundParameters {
        let upside = self.upside.sample(rng);
        let win_probability = self.unit.sample(rng).clamp(0.2, 0.8);

        RoundParameters {
            upside,
            downside: 1.0,
            win_probability,
        }
    }
}

/// Parameter-generation rule for a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Stochastic,
    Static,
    Dynamic,
}

impl Regime {
    pub const ALL: [Regime; 3] = [Regime::Stochastic, Regime::Static, Regime::Dynamic];

    pub fn from_selector(selector: i64) -> Result<Self, SimError> {
        match selector {
            0 => Ok(Regime::Stochastic),
            1 => Ok(Regime::Static),
            2 => Ok(Regime::Dynamic),
            other => Err(SimError::InvalidRegimeSelector(other)),
        }
    }

    /// Integer code used in report labels (`EV type 0`, ...).
    pub fn selector(self) -> usize {
        match self {
            Regime::Stochastic => 0,
            Regime::Static => 1,
            Regime::Dynamic => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Regime::Stochastic => "stochastic",
            Regime::Static => "static",
            Regime::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Regime {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(selector) = trimmed.parse::<i64>() {
            return Regime::from_selector(selector);
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "stochastic" => Ok(Regime::Stochastic),
            "static" => Ok(Regime::Static),
            "dynamic" => Ok(Regime::Dynamic),
            _ => Err(SimError::UnknownRegime(trimmed.to_string())),
        }
    }
}

impl TryFrom<i64> for Regime {
    type Error = SimError;

    fn try_from(selector: i64) -> Result<Self, Self::Error> {
        Regime::from_selector(selector)
    }
}

/// A built generator for one regime.
#[derive(Debug, Clone)]
pub enum RoundSource {
    Stochastic(StochasticRounds),
    Static(StaticRounds),
    Dynamic(DynamicRounds),
}

impl RoundGenerator for RoundSource {
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> RoundParameters {
        match self {
            RoundSource::Stochastic(rounds) => rounds.generate(rng),
            RoundSource::Static(rounds) => rounds.generate(rng),
            RoundSource::Dynamic(rounds) => rounds.generate(rng),
        }
    }
}

pub fn build_generator(regime: Regime) -> RoundSource {
    match regime {
        Regime::Stochastic => RoundSource::Stochastic(StochasticRounds::default()),
        Regime::Static => RoundSource::Static(StaticRounds),
        Regime::Dynamic => RoundSource::Dynamic(DynamicRounds::default()),
    }
}

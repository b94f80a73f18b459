use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const FIRST_CRASH_MIN_INDEX: usize = 3;
pub const CRASH_GAP_MIN_YEARS: usize = 8;
/// Width of both the first-crash window and the gap window, in years.
pub const CRASH_WINDOW_YEARS: usize = 3;
pub const CRASH_RETURN_MIN: f64 = -0.60;
pub const CRASH_RETURN_MAX: f64 = -0.30;

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    pub returns: Vec<f64>,
    pub crash_years: Vec<usize>,
}

impl ReturnSeries {
    pub fn mean(&self) -> f64 {
        if self.returns.is_empty() {
            return 0.0;
        }
        self.returns.iter().sum::<f64>() / self.returns.len() as f64
    }
}

fn standard_normal_pair(source: &mut dyn RandomSource) -> (f64, f64) {
    let u1 = source.next_unit().clamp(1e-12, 1.0);
    let u2 = source.next_unit();
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = 2.0 * PI * u2;
    (r * theta.cos(), r * theta.sin())
}

fn window_offset(source: &mut dyn RandomSource) -> usize {
    let u = source.next_unit().clamp(0.0, 1.0);
    ((u * CRASH_WINDOW_YEARS as f64).floor() as usize).min(CRASH_WINDOW_YEARS - 1)
}

/// Normal draws around `target_mean`, periodic crash years, then a uniform shift of the
/// non-crash years so the arithmetic mean lands exactly on `target_mean`.
///
/// Draw order is fixed: all normals first (in Box-Muller pairs), then the first crash index,
/// its magnitude, the next gap, its magnitude, and so on while inside the horizon.
pub fn generate_return_series(
    target_mean: f64,
    volatility: f64,
    horizon: usize,
    source: &mut dyn RandomSource,
) -> ReturnSeries {
    if horizon == 0 {
        return ReturnSeries {
            returns: Vec::new(),
            crash_years: Vec::new(),
        };
    }

    let volatility = volatility.max(0.0);
    let mut returns = Vec::with_capacity(horizon);
    while returns.len() < horizon {
        let (z0, z1) = standard_normal_pair(source);
        returns.push(target_mean + volatility * z0);
        if returns.len() < horizon {
            returns.push(target_mean + volatility * z1);
        }
    }

    let mut crash_years = Vec::new();
    let mut index = FIRST_CRASH_MIN_INDEX + window_offset(source);
    while index < horizon {
        let u = source.next_unit().clamp(0.0, 1.0);
        returns[index] = CRASH_RETURN_MIN + u * (CRASH_RETURN_MAX - CRASH_RETURN_MIN);
        crash_years.push(index);
        index += CRASH_GAP_MIN_YEARS + window_offset(source);
    }

    let adjustable = horizon - crash_years.len();
    if adjustable > 0 {
        let mean = returns.iter().sum::<f64>() / horizon as f64;
        let shift = (target_mean - mean) * horizon as f64 / adjustable as f64;
        for (i, value) in returns.iter_mut().enumerate() {
            if !crash_years.contains(&i) {
                *value += shift;
            }
        }
    }

    ReturnSeries {
        returns,
        crash_years,
    }
}

pub fn fixed_return_series(rate: f64, horizon: usize) -> ReturnSeries {
    ReturnSeries {
        returns: vec![rate; horizon],
        crash_years: Vec::new(),
    }
}

#[cfg(test)]
pub(crate) struct ScriptedRandom {
    values: Vec<f64>,
    cursor: usize,
}

#[cfg(test)]
impl ScriptedRandom {
    pub(crate) fn new(values: Vec<f64>) -> Self {
        Self { values, cursor: 0 }
    }

    pub(crate) fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

#[cfg(test)]
impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        let v = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        v
    }
}

use std::ops::RangeInclusive;

use rand::Rng;

use crate::traits::DelaySource;

/// Uniform draw from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDelay;

impl DelaySource for RandomDelay {
    fn delay_seconds(&self, range: RangeInclusive<u32>) -> u32 {
        rand::rng().random_range(range)
    }
}

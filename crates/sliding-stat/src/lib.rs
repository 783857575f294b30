/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swiftlock-rust/swiftlock
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
Fixed-capacity sliding window over `i64` samples, producing population
minimum, mean and standard deviation of the most recent samples. Adding a
sample when the window is full evicts the oldest one.
*/

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

/// Smallest window the statistics are considered meaningful for.
pub const MINIMUM_CAPACITY: usize = 16;

pub const DEFAULT_CAPACITY: usize = 128;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MinMeanDev {
    pub min: i64,
    pub mean: i64,
    pub deviation: i64,
}

impl Display for MinMeanDev {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "min: {}, mean: {}, deviation: {}",
            self.min, self.mean, self.deviation
        )
    }
}

#[derive(Debug)]
pub enum SlidingStatError {
    CapacityTooSmall { minimum: usize, encountered: usize },
}

#[derive(Debug)]
pub struct SlidingStat {
    samples: VecDeque<i64>,
    capacity: usize,
}

impl Default for SlidingStat {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY).expect("default capacity is above the minimum")
    }
}

impl SlidingStat {
    pub fn new(capacity: usize) -> Result<Self, SlidingStatError> {
        if capacity < MINIMUM_CAPACITY {
            Err(SlidingStatError::CapacityTooSmall {
                minimum: MINIMUM_CAPACITY,
                encountered: capacity,
            })?;
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    pub fn add(&mut self, sample: i64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Population statistics over the current window. `None` until the first
    /// sample has been added. Mean uses integer division; deviation is the
    /// integer part of the population standard deviation.
    pub fn values(&self) -> Option<MinMeanDev> {
        if self.samples.is_empty() {
            return None;
        }

        let count = self.samples.len() as i64;
        let mut min = i64::MAX;
        let mut sum: i64 = 0;
        for &sample in &self.samples {
            min = min.min(sample);
            sum += sample;
        }
        let mean = sum / count;

        let variance = self
            .samples
            .iter()
            .map(|&sample| {
                let diff = (sample - mean) as f64;
                diff * diff
            })
            .sum::<f64>()
            / count as f64;

        Some(MinMeanDev {
            min,
            mean,
            deviation: variance.sqrt() as i64,
        })
    }
}

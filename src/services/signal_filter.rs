// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fix acceptance policy: accuracy threshold plus warm-up discard.

use crate::config::LocationConfig;
use crate::models::Fix;

/// Outcome of running a fix through the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accepted,
    RejectedLowAccuracy,
    RejectedWarmup,
}

/// Per-session fix filter. Call [`reset`](Self::reset) whenever the
/// location session (re)starts.
#[derive(Debug, Clone)]
pub struct SignalFilter {
    accuracy_threshold_m: f32,
    warmup_fix_count: u32,
    warmup_remaining: u32,
}

impl SignalFilter {
    pub fn new(accuracy_threshold_m: f32, warmup_fix_count: u32) -> Self {
        Self {
            accuracy_threshold_m,
            warmup_fix_count,
            warmup_remaining: warmup_fix_count,
        }
    }

    pub fn from_config(config: &LocationConfig) -> Self {
        Self::new(config.accuracy_threshold_m, config.warmup_fix_count)
    }

    /// Restart the warm-up countdown.
    pub fn reset(&mut self) {
        self.warmup_remaining = self.warmup_fix_count;
    }

    pub fn accept(&mut self, fix: &Fix) -> FilterDecision {
        if fix
            .accuracy
            .is_some_and(|accuracy| accuracy > self.accuracy_threshold_m)
        {
            return FilterDecision::RejectedLowAccuracy;
        }

        // Only fixes that pass the accuracy check count toward warm-up
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return FilterDecision::RejectedWarmup;
        }

        FilterDecision::Accepted
    }

    pub fn is_warming_up(&self) -> bool {
        self.warmup_remaining > 0
    }
}

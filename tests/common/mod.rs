// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Common test utilities for the bigo test suite

#![allow(dead_code, unused_macros)]

use bigo::{Prover, ProverOptions, ResourceLimits};

pub mod generators;

/// Check if cvc5 is on PATH
pub fn cvc5_available() -> bool {
    which::which("cvc5").is_ok()
}

/// Prover backed by the cvc5 on PATH, default budgets
pub fn cvc5_prover() -> Prover {
    Prover::cvc5(ProverOptions::default())
}

/// Prover with a large budget for the harder quantified obligations
pub fn patient_prover() -> Prover {
    Prover::cvc5(ProverOptions::default().with_limits(ResourceLimits {
        time_limit_ms: 60_000,
        resource_limit: 10_000_000,
        grace_ms: 5_000,
    }))
}

/// Skip the current test when cvc5 is not installed
macro_rules! require_cvc5 {
    () => {
        if !crate::common::cvc5_available() {
            eprintln!("Skipping: cvc5 not available");
            return;
        }
    };
}

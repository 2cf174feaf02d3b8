// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! bigo: asymptotic inequalities discharged to cvc5
//!
//! Parses `f << g` style statements, compiles them to SMT-LIB with an
//! uninterpreted `LOG` tied to `exp` by triggered axioms, and reads the
//! solver's answer back as a three-valued verdict.

pub mod collab;
pub mod config;
pub mod core;
pub mod driver;
pub mod error;
pub mod parser;
pub mod smt;

pub use config::{ProverOptions, ResourceLimits, SolverConfig, TriggerStrategy};
pub use core::{BoundQuestion, Expr, ProofObligation, RelationKind, Transcendental, Verdict};
pub use driver::Prover;
pub use error::{ProverError, ProverResult};
pub use parser::Normalize;

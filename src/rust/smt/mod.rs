// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Lowering to SMT-LIB and driving the decision procedure

pub mod axioms;
pub mod compiler;
pub mod quantifier;
pub mod session;
pub mod solver;
pub mod term;

pub use compiler::{compile, Handle, VariableEnv};
pub use quantifier::Partition;
pub use session::{ProofSession, SessionContext};
pub use solver::{Cvc5Solver, DecisionProcedure, SolverOutcome};
pub use term::SmtTerm;

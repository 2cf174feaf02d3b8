// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error taxonomy for the expression compiler and proof driver
//!
//! A decision procedure answering `unknown` is not an error; it is reported
//! as [`crate::core::Verdict::Unknown`].

use thiserror::Error;

/// Result alias used throughout the library
pub type ProverResult<T> = std::result::Result<T, ProverError>;

/// Errors raised while normalizing, compiling, or checking an obligation
#[derive(Debug, Error)]
pub enum ProverError {
    /// Input text could not be parsed into a recognized algebraic form
    #[error("malformed expression '{input}' at offset {offset}: {message}")]
    MalformedExpression {
        input: String,
        offset: usize,
        message: String,
    },

    /// The term compiler has no lowering for this node shape
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// A supplied witness is not a positive number (or names no existential)
    #[error("invalid witness for '{name}': {reason}")]
    InvalidWitness { name: String, reason: String },

    /// An external collaborator answered outside its protocol
    #[error("unexpected output: {0:?}")]
    UnexpectedOutput(String),

    /// A variable handle from another session was presented
    #[error("handle '{name}' belongs to session {owner}, not session {current}")]
    StaleHandle {
        name: String,
        owner: u64,
        current: u64,
    },

    /// A driver phase was invoked out of order
    #[error("session is {actual}, expected {expected}")]
    SessionState {
        expected: &'static str,
        actual: &'static str,
    },

    /// The decision procedure could not be run or reported an error
    #[error("solver error: {0}")]
    Solver(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProverError {
    pub(crate) fn malformed(input: &str, offset: usize, message: impl Into<String>) -> Self {
        ProverError::MalformedExpression {
            input: input.to_string(),
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_witness(name: &str, reason: impl Into<String>) -> Self {
        ProverError::InvalidWitness {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

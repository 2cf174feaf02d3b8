// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! External collaborators: a language model that proposes subdomains and a
//! computer-algebra system that can answer bound questions directly

pub mod cas;
pub mod llm;

pub use cas::{
    bound_query, check_bound_with_cas, check_bound_with_cas_on_subdomains, ComputerAlgebra, OutputForm, WolframScript,
};
pub use llm::{
    parse_bracketed_list, poll_consensus, subdomain_prompt, suggest_subdomains, ConsensusPolicy, GeminiClient,
    GeminiConfig, LanguageModel,
};

// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Output formatting module for CLI
//!
//! Provides JSON and pretty-printed text output with colors

use anyhow::Result;
use bigo::driver::SubdomainReport;
use bigo::Verdict;
use colored::Colorize;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid output format: {}. Must be 'text' or 'json'", s)),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Output formatter for different output formats
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Output a warning message
    pub fn warning(&self, message: &str) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                eprintln!("{}", message.yellow());
            }
            OutputFormat::Json => {
                self.output_json(&JsonMessage {
                    level: "warning",
                    message,
                })?;
            }
        }
        Ok(())
    }

    /// Output a section title
    pub fn section(&self, title: &str) -> Result<()> {
        if self.format == OutputFormat::Text {
            println!("\n{}", title.cyan().bold());
        }
        Ok(())
    }

    /// Output the verdict for one statement
    pub fn verdict(&self, subject: &str, verdict: &Verdict) -> Result<()> {
        match self.format {
            OutputFormat::Text => println!("{}", Self::verdict_line(subject, verdict)),
            OutputFormat::Json => self.output_json(&VerdictMessage { subject, verdict })?,
        }
        Ok(())
    }

    fn verdict_line(subject: &str, verdict: &Verdict) -> String {
        match verdict {
            Verdict::Proved => format!("{} {}", "✓ proved:".green().bold(), subject),
            Verdict::Disproved => format!("{} {}", "✗ not proved:".red().bold(), subject),
            Verdict::Unknown { reason } => {
                format!("{} {} {}", "? unknown:".yellow().bold(), subject, format!("({})", reason).dimmed())
            }
        }
    }

    /// Output per-subdomain verdicts
    pub fn subdomain_report(&self, subject: &str, report: &SubdomainReport) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                println!("{}", subject.bold());
                for (i, result) in report.results.iter().enumerate() {
                    println!(
                        "  {}. {}",
                        i + 1,
                        Self::verdict_line(&result.subdomain.join(" && "), &result.verdict)
                    );
                }
                if report.proved_everywhere {
                    println!("{}", "✓ proved on every subdomain".green().bold());
                } else {
                    println!("{}", "✗ not proved on every subdomain".red().bold());
                }
            }
            OutputFormat::Json => self.output_json(report)?,
        }
        Ok(())
    }

    /// Output an SMT-LIB script
    pub fn script(&self, script: &str) -> Result<()> {
        match self.format {
            OutputFormat::Text => print!("{}", script),
            OutputFormat::Json => self.output_json(&ScriptMessage { script })?,
        }
        Ok(())
    }

    /// Output JSON
    fn output_json<T: Serialize + ?Sized>(&self, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        println!("{}", json);
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonMessage<'a> {
    level: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct VerdictMessage<'a> {
    subject: &'a str,
    #[serde(flatten)]
    verdict: &'a Verdict,
}

#[derive(Serialize)]
struct ScriptMessage<'a> {
    script: &'a str,
}

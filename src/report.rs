use std::fmt::Write as _;
use std::io::{BufWriter, Write};
use std::{fs, io, path::Path};

use chrono::{DateTime, Utc};

use crate::classify::Classification;
use crate::scenario::ScenarioOutcome;

#[derive(Debug)]
pub struct ProbeReport {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl ProbeReport {
    pub fn from_outcomes(outcomes: Vec<ScenarioOutcome>) -> Self {
        let passed = outcomes.iter().filter(|o| o.pass).count();
        Self {
            started_at: Utc::now(),
            total: outcomes.len(),
            passed,
            outcomes,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "tool-call conformance: {}/{} scenarios passed ({})",
            self.passed,
            self.total,
            self.started_at.format("%Y-%m-%dT%H:%M:%SZ")
        );

        for outcome in &self.outcomes {
            let status = if outcome.pass { "PASS" } else { "FAIL" };
            let observed = outcome
                .observed
                .map(|c| c.to_string())
                .unwrap_or_else(|| "no-response".to_string());
            let _ = writeln!(
                out,
                "{status} {} (expected {}, observed {observed})",
                outcome.id, outcome.expected
            );

            if outcome.pass {
                continue;
            }

            for diagnostic in &outcome.diagnostics {
                let _ = writeln!(out, "  - {diagnostic}");
            }
            for hint in hints_for(outcome.expected, outcome.observed) {
                let _ = writeln!(out, "  hint: {hint}");
            }
        }

        out
    }

    /// Append outcomes to a JSONL results file, one record per scenario.
    pub fn write_jsonl(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        let mut writer = BufWriter::new(file);

        for outcome in &self.outcomes {
            serde_json::to_writer(&mut writer, outcome)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            writer.write_all(b"\n")?;
        }

        writer.flush()
    }
}

/// Static troubleshooting table keyed by failure symptom. Data, not logic:
/// the hints mirror the documented upgrade and configuration checklist for
/// local servers.
pub fn hints_for(
    expected: Classification,
    observed: Option<Classification>,
) -> &'static [&'static str] {
    match (expected, observed) {
        (_, None) => &[
            "check that the model server is running and the base URL and port are correct",
            "slow local models may need a larger request timeout",
        ],
        (Classification::Structured, Some(Classification::None)) => &[
            "verify the server version supports structured tool calling",
            "verify the tool schema shape: type \"function\" with an object parameters schema and a required list",
            "verify the model was loaded with function calling enabled",
        ],
        (Classification::Structured, Some(Classification::TextualMarker)) => &[
            "the server returned the raw functools marker instead of tool_calls; upgrade the server or enable its tool-call conversion",
            "a marker response usually means the chat template emits tool calls verbatim in text",
        ],
        (Classification::None, Some(Classification::Structured)) => &[
            "the model called a tool where a plain answer was expected; check tool_choice and that tool results were sent back correctly",
        ],
        (Classification::TextualMarker, Some(Classification::None)) => &[
            "no marker found; the model may not support tool calling at all",
        ],
        _ => &[],
    }
}

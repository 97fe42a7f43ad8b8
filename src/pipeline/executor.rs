//! Sequential rule execution over a staged file.
//!
//! # Responsibilities
//! - Run the enabled rules in configuration order
//! - Await each rule before starting the next (rules rewrite the same file)
//! - Contain every per-rule failure: load errors, rule errors, panics
//!
//! # Design Decisions
//! - Best effort: a broken rule is logged and skipped, the upload proceeds
//! - The report is informational only; nothing downstream branches on it

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde::Serialize;
use tracing::Instrument;

use crate::config::RuleConfig;
use crate::observability::metrics;
use crate::rules::{Resolved, RuleLoader};

/// What happened to one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RuleOutcome {
    Applied,
    Failed(String),
    Misconfigured(String),
    LoadFailed(String),
}

impl RuleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RuleOutcome::Applied => "applied",
            RuleOutcome::Failed(_) => "failed",
            RuleOutcome::Misconfigured(_) => "misconfigured",
            RuleOutcome::LoadFailed(_) => "load_failed",
        }
    }
}

/// Per-rule entry of a [`PipelineReport`].
#[derive(Debug, Clone, Serialize)]
pub struct RuleReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: RuleOutcome,
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Outcome of one pipeline run, in execution order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub rules: Vec<RuleReport>,
}

impl PipelineReport {
    pub fn applied(&self) -> usize {
        self.rules.iter().filter(|r| r.outcome == RuleOutcome::Applied).count()
    }
}

/// Runs rule chains against staged files.
#[derive(Clone, Default)]
pub struct Pipeline {
    loader: Arc<RuleLoader>,
}

impl Pipeline {
    pub fn new(loader: RuleLoader) -> Self {
        Self {
            loader: Arc::new(loader),
        }
    }

    /// Run `chain` in order against `file`. Never fails.
    pub async fn run(&self, chain: &[RuleConfig], file: &Path) -> PipelineReport {
        let started = Instant::now();
        let mut report = PipelineReport::default();

        for rule in chain.iter().filter(|r| r.enabled) {
            let span = tracing::info_span!("rule", name = %rule.name, reference = %rule.rule);
            let rule_started = Instant::now();
            let outcome = self.run_one(&rule.rule, file).instrument(span.clone()).await;

            span.in_scope(|| match &outcome {
                RuleOutcome::Applied => tracing::info!("Rule applied"),
                RuleOutcome::Failed(e) => tracing::error!(error = %e, "Rule failed, continuing"),
                RuleOutcome::Misconfigured(reason) => {
                    tracing::warn!(reason = %reason, "Rule misconfigured, skipping")
                }
                RuleOutcome::LoadFailed(e) => tracing::error!(error = %e, "Rule failed to load, continuing"),
            });
            metrics::record_rule(&rule.name, outcome.label());

            report.rules.push(RuleReport {
                name: rule.name.clone(),
                outcome,
                elapsed: rule_started.elapsed(),
            });
        }

        metrics::record_pipeline(started);
        report
    }

    async fn run_one(&self, reference: &str, file: &Path) -> RuleOutcome {
        let rule = match self.loader.resolve(reference).await {
            Ok(Resolved::Ready(rule)) => rule,
            Ok(Resolved::Misconfigured(reason)) => return RuleOutcome::Misconfigured(reason),
            Err(e) => return RuleOutcome::LoadFailed(e.to_string()),
        };

        tracing::debug!(file = ?file, "Running rule");
        match AssertUnwindSafe(rule.process(file)).catch_unwind().await {
            Ok(Ok(())) => RuleOutcome::Applied,
            Ok(Err(e)) => RuleOutcome::Failed(e.to_string()),
            Err(_) => RuleOutcome::Failed("rule panicked".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Rule, RuleError};
    use async_trait::async_trait;

    struct Append(&'static str);

    #[async_trait]
    impl Rule for Append {
        async fn process(&self, file: &Path) -> Result<(), RuleError> {
            let mut content = tokio::fs::read_to_string(file).await?;
            content.push_str(self.0);
            tokio::fs::write(file, content).await?;
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl Rule for Broken {
        async fn process(&self, _file: &Path) -> Result<(), RuleError> {
            Err(RuleError::Other("boom".into()))
        }
    }

    struct Panics;

    #[async_trait]
    impl Rule for Panics {
        async fn process(&self, _file: &Path) -> Result<(), RuleError> {
            panic!("rule bug");
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            RuleLoader::new()
                .with_rule("a", Arc::new(Append("; A\n")))
                .with_rule("b", Arc::new(Append("; B\n")))
                .with_rule("broken", Arc::new(Broken))
                .with_rule("panics", Arc::new(Panics)),
        )
    }

    fn rule(name: &str, enabled: bool) -> RuleConfig {
        RuleConfig {
            name: name.into(),
            enabled,
            rule: format!("builtin:{name}"),
        }
    }

    async fn run(chain: &[RuleConfig]) -> (String, PipelineReport) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.gcode");
        tokio::fs::write(&path, "G1\n").await.unwrap();
        let report = pipeline().run(chain, &path).await;
        (tokio::fs::read_to_string(&path).await.unwrap(), report)
    }

    #[tokio::test]
    async fn test_rules_run_in_configured_order() {
        let (content, _) = run(&[rule("a", true), rule("b", true)]).await;
        assert_eq!(content, "G1\n; A\n; B\n");

        let (content, _) = run(&[rule("b", true), rule("a", true)]).await;
        assert_eq!(content, "G1\n; B\n; A\n");
    }

    #[tokio::test]
    async fn test_disabled_rule_has_no_effect() {
        let (content, report) = run(&[rule("a", false), rule("b", true)]).await;
        assert_eq!(content, "G1\n; B\n");
        assert_eq!(report.rules.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_chain() {
        let chain = [
            rule("a", true),
            rule("broken", true),
            rule("panics", true),
            rule("missing", true),
            RuleConfig {
                name: "gone".into(),
                enabled: true,
                rule: "/nonexistent/rule.sh".into(),
            },
            rule("b", true),
        ];
        let (content, report) = run(&chain).await;

        assert_eq!(content, "G1\n; A\n; B\n");
        let labels: Vec<_> = report.rules.iter().map(|r| r.outcome.label()).collect();
        assert_eq!(
            labels,
            vec!["applied", "failed", "failed", "misconfigured", "load_failed", "applied"]
        );
        assert_eq!(report.applied(), 2);
    }

    #[test]
    fn test_report_serializes_outcome_inline() {
        let report = PipelineReport {
            rules: vec![RuleReport {
                name: "a".into(),
                outcome: RuleOutcome::Failed("boom".into()),
                elapsed: Duration::from_millis(3),
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["rules"][0]["outcome"], "failed");
        assert_eq!(json["rules"][0]["detail"], "boom");
        assert_eq!(json["rules"][0]["elapsed"], 3);
    }
}

//! Article command handlers.

use super::{print_json, read_input};
use crate::Engine;
use freshwire::models::{Article, CommitOutcome, Decision, Evaluation};
use freshwire::services::deduplication::Fingerprints;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// One evaluated article.
#[derive(Serialize)]
struct EvaluationRow<'a> {
    title: &'a str,
    url: &'a str,
    #[serde(flatten)]
    evaluation: Evaluation,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<CommitOutcome>,
}

/// Totals printed after an ingest.
#[derive(Serialize, Default)]
struct IngestSummary {
    evaluated: usize,
    decisions: BTreeMap<&'static str, usize>,
    committed: usize,
    lost_races: usize,
    failed_commits: usize,
    degraded: usize,
}

/// Evaluate command.
pub fn cmd_evaluate(engine: &Engine, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let articles = Article::parse_batch(&read_input(file)?)?;
    let evaluations = engine.evaluate_batch(&articles);

    let rows: Vec<EvaluationRow<'_>> = articles
        .iter()
        .zip(evaluations)
        .map(|(article, evaluation)| EvaluationRow {
            title: &article.title,
            url: &article.url,
            evaluation,
            commit: None,
        })
        .collect();
    print_json(&rows)
}

/// Ingest command.
///
/// Commits each novel article in input order. A failed commit is reported
/// and the rest of the batch still runs.
pub fn cmd_ingest(
    engine: &Engine,
    file: &Path,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let articles = Article::parse_batch(&read_input(file)?)?;
    let evaluations = engine.evaluate_batch(&articles);
    let mut summary = IngestSummary {
        evaluated: articles.len(),
        ..IngestSummary::default()
    };

    let mut rows = Vec::with_capacity(articles.len());
    for (article, evaluation) in articles.iter().zip(evaluations) {
        *summary.decisions.entry(evaluation.decision.as_str()).or_default() += 1;
        if evaluation.degraded {
            summary.degraded += 1;
        }

        let commit = if evaluation.decision == Decision::Novel && !dry_run {
            match engine.commit(article) {
                Ok(outcome) => {
                    match outcome {
                        CommitOutcome::LostRace => summary.lost_races += 1,
                        CommitOutcome::Committed | CommitOutcome::AlreadyCommitted => {
                            summary.committed += 1;
                            record_topic(engine, article);
                        },
                    }
                    Some(outcome)
                },
                Err(e) => {
                    tracing::warn!(url = %article.url, error = %e, "Commit failed");
                    summary.failed_commits += 1;
                    None
                },
            }
        } else {
            None
        };

        rows.push(EvaluationRow {
            title: &article.title,
            url: &article.url,
            evaluation,
            commit,
        });
    }

    print_json(&rows)?;
    eprintln!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn record_topic(engine: &Engine, article: &Article) {
    let topic = engine.fingerprints(article).semantic.topic;
    if let Err(e) = engine.record_topic(topic) {
        tracing::warn!(topic = %topic, error = %e, "Topic not recorded");
    }
}

/// Fingerprint command.
pub fn cmd_fingerprint(engine: &Engine, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Serialize)]
    struct Row<'a> {
        title: &'a str,
        #[serde(flatten)]
        fingerprints: Fingerprints,
    }

    let articles = Article::parse_batch(&read_input(file)?)?;
    let rows: Vec<Row<'_>> = articles
        .iter()
        .map(|article| Row {
            title: &article.title,
            fingerprints: engine.fingerprints(article),
        })
        .collect();
    print_json(&rows)
}

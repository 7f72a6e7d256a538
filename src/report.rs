use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CandidateResult, Note, Submission};
use crate::venue::Venue;

/// More raise evidence first, then lower average score; title breaks ties.
pub fn rank_order(a: &CandidateResult, b: &CandidateResult) -> Ordering {
    b.raise_count()
        .cmp(&a.raise_count())
        .then_with(|| a.avg_score.total_cmp(&b.avg_score))
        .then_with(|| a.title.cmp(&b.title))
}

pub fn sort_results(results: &mut [CandidateResult]) {
    results.sort_by(rank_order);
}

pub fn format_scores(scores: &[i64]) -> String {
    let joined = scores
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{joined}]")
}

pub fn build_report(
    venue: &Venue,
    keywords: &[String],
    generated_at: DateTime<Utc>,
    results: &[CandidateResult],
) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "# Rebuttal Candidates: {} {}",
        venue.conference, venue.year
    );
    let _ = writeln!(
        output,
        "Generated {} for keywords: {}",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        keywords.join(", ")
    );
    let _ = writeln!(output, "{}", "=".repeat(60));

    if results.is_empty() {
        let _ = writeln!(output, "No controversial accepted papers matched.");
        return output;
    }

    let turnarounds = results.iter().filter(|r| r.raise_count() > 0).count();
    let _ = writeln!(
        output,
        "{} papers ({} with explicit score raises)",
        results.len(),
        turnarounds
    );
    let _ = writeln!(output);

    for (idx, result) in results.iter().enumerate() {
        let initial = result
            .reviews
            .iter()
            .map(|review| review.initial.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        let _ = writeln!(
            output,
            "{}. [{}] avg {:.2} min {} scores {} (initial [{}])",
            idx + 1,
            result.kind,
            result.avg_score,
            result.min_score,
            format_scores(&result.scores),
            initial
        );
        let _ = writeln!(output, "   Title: {}", result.title);
        let _ = writeln!(output, "   URL: {}", result.url);

        if let Some(recommendation) = &result.thread.meta_recommendation {
            let confidence = result
                .thread
                .meta_confidence
                .as_deref()
                .unwrap_or("n/a");
            let _ = writeln!(
                output,
                "   Meta review: {recommendation} (confidence {confidence})"
            );
        }
        if let Some(decision) = &result.thread.decision {
            let _ = writeln!(output, "   Decision: {decision}");
        }
        for evidence in &result.evidence {
            let _ = writeln!(
                output,
                "   Evidence ({}, \"{}\"): ...{}...",
                evidence.note_id, evidence.phrase, evidence.snippet
            );
        }
        let _ = writeln!(output, "{}", "-".repeat(30));
    }

    output
}

pub const CSV_HEADER: [&str; 9] = [
    "Title",
    "URL",
    "Avg Score",
    "Scores",
    "Raise Count",
    "Type",
    "Meta Recommendation",
    "Meta Confidence",
    "Evidence",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvRow {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Avg Score")]
    pub avg_score: f64,
    #[serde(rename = "Scores")]
    pub scores: String,
    #[serde(rename = "Raise Count")]
    pub raise_count: usize,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Meta Recommendation")]
    pub meta_recommendation: String,
    #[serde(rename = "Meta Confidence")]
    pub meta_confidence: String,
    #[serde(rename = "Evidence")]
    pub evidence: String,
}

impl From<&CandidateResult> for CsvRow {
    fn from(result: &CandidateResult) -> Self {
        CsvRow {
            title: result.title.clone(),
            url: result.url.clone(),
            avg_score: result.avg_score,
            scores: format_scores(&result.scores),
            raise_count: result.raise_count(),
            kind: result.kind.to_string(),
            meta_recommendation: result.thread.meta_recommendation.clone().unwrap_or_default(),
            meta_confidence: result.thread.meta_confidence.clone().unwrap_or_default(),
            evidence: result
                .evidence
                .iter()
                .map(|evidence| evidence.snippet.as_str())
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

pub fn write_csv_to<W: std::io::Write>(
    writer: W,
    results: &[CandidateResult],
) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(CSV_HEADER)?;
    for result in results {
        writer.serialize(CsvRow::from(result))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_csv(path: &Path, results: &[CandidateResult]) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_csv_to(file, results).with_context(|| format!("failed to write {}", path.display()))
}

pub fn build_venue_inventory(notes: &[Note]) -> String {
    let mut venue_ids: BTreeMap<String, usize> = BTreeMap::new();
    let mut venues: BTreeMap<String, usize> = BTreeMap::new();

    for note in notes {
        let submission = Submission::from(note);
        let label = |value: String| if value.is_empty() { "N/A".to_string() } else { value };
        *venue_ids.entry(label(submission.venue_id)).or_insert(0) += 1;
        *venues.entry(label(submission.venue)).or_insert(0) += 1;
    }

    let mut output = String::new();
    let _ = writeln!(output, "{} submissions", notes.len());
    let _ = writeln!(output);
    let _ = writeln!(output, "Unique venue ids:");
    for (venue_id, count) in &venue_ids {
        let _ = writeln!(output, "- {venue_id} ({count})");
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "Unique venues:");
    for (venue, count) in &venues {
        let _ = writeln!(output, "- {venue} ({count})");
    }
    output
}

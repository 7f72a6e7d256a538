use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::cache::{CacheError, CacheStore};
use crate::classify::{self, ControversyConfig};
use crate::fetch::{self, FetchError, ThreadFetcher};
use crate::filter::{self, TopicFilter};
use crate::models::{CandidateResult, InitialScore, Note, NoteRole, Submission, ThreadSummary};
use crate::openreview::ReviewSource;
use crate::scores::{self, ScoreBasis};
use crate::venue::Venue;

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub topic: TopicFilter,
    pub controversy: ControversyConfig,
    pub basis: ScoreBasis,
    pub check_edits: bool,
    /// Stop after this many accepted, on-topic papers.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NotAccepted,
    OffTopic,
    FetchFailed(String),
    NoReviews,
    NoScores,
    NotControversial,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FetchFailed(detail) => write!(f, "{}: {detail}", self.label()),
            _ => f.write_str(self.label()),
        }
    }
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NotAccepted => "not accepted",
            SkipReason::OffTopic => "off topic",
            SkipReason::FetchFailed(_) => "fetch failed",
            SkipReason::NoReviews => "no reviews",
            SkipReason::NoScores => "no parsable scores",
            SkipReason::NotControversial => "not controversial",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Candidate(CandidateResult),
    Skipped { forum_id: String, reason: SkipReason },
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub submissions: usize,
    pub outcomes: Vec<Outcome>,
}

impl RunSummary {
    pub fn skip_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.outcomes {
            if let Outcome::Skipped { reason, .. } = outcome {
                *counts.entry(reason.label()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn into_candidates(self) -> Vec<CandidateResult> {
        self.outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                Outcome::Candidate(candidate) => Some(candidate),
                Outcome::Skipped { .. } => None,
            })
            .collect()
    }
}

pub async fn run<S>(
    source: &S,
    cache: &CacheStore,
    venue: &Venue,
    config: &PipelineConfig,
) -> anyhow::Result<RunSummary>
where
    S: ReviewSource + ?Sized,
{
    let notes = fetch::fetch_submissions(source, cache, venue).await?;
    let mut summary = RunSummary {
        submissions: notes.len(),
        outcomes: Vec::with_capacity(notes.len()),
    };

    let mut fetcher = ThreadFetcher::open(source, cache, venue)?;
    let mut processed = 0usize;

    for note in &notes {
        let submission = Submission::from(note);
        let skip = |reason| Outcome::Skipped {
            forum_id: submission.id.clone(),
            reason,
        };

        if !filter::is_accepted(&submission, venue) {
            summary.outcomes.push(skip(SkipReason::NotAccepted));
            continue;
        }
        if !config.topic.matches(&submission) {
            summary.outcomes.push(skip(SkipReason::OffTopic));
            continue;
        }
        if config.limit.is_some_and(|limit| processed >= limit) {
            debug!("limit reached, leaving remaining papers unprocessed");
            break;
        }

        processed += 1;
        let outcome = evaluate(&mut fetcher, &submission, config).await?;
        if let Outcome::Skipped { forum_id, reason } = &outcome {
            debug!("Skipped {forum_id}: {reason}");
        }
        summary.outcomes.push(outcome);

        if processed % PROGRESS_EVERY == 0 {
            info!("Processed {processed} accepted on-topic papers");
        }
    }

    fetcher.flush()?;
    info!(
        "Evaluated {processed} accepted on-topic papers out of {} submissions",
        summary.submissions
    );
    Ok(summary)
}

async fn evaluate<S>(
    fetcher: &mut ThreadFetcher<'_, S>,
    submission: &Submission,
    config: &PipelineConfig,
) -> Result<Outcome, CacheError>
where
    S: ReviewSource + ?Sized,
{
    let skip = |reason| {
        Ok(Outcome::Skipped {
            forum_id: submission.id.clone(),
            reason,
        })
    };

    let thread = match fetcher.thread(&submission.id).await {
        Ok(thread) => thread,
        Err(FetchError::Cache(err)) => return Err(err),
        Err(FetchError::Api(err)) => {
            warn!("Skipping {}: {err}", submission.id);
            return skip(SkipReason::FetchFailed(err.to_string()));
        }
    };

    let reviews: Vec<&Note> = thread
        .iter()
        .filter(|note| note.role() == Some(NoteRole::OfficialReview))
        .collect();
    if reviews.is_empty() {
        return skip(SkipReason::NoReviews);
    }

    let mut review_scores = Vec::with_capacity(reviews.len());
    for review in reviews {
        let edits = if config.check_edits {
            match fetcher.edits(&review.id).await {
                Ok(edits) => Some(edits),
                Err(FetchError::Cache(err)) => return Err(err),
                Err(FetchError::Api(err)) => {
                    debug!("No edit history for review {}: {err}", review.id);
                    None
                }
            }
        } else {
            None
        };
        let scored = scores::extract(review, edits.as_deref());
        if scored.initial == InitialScore::Changed {
            debug!("Review {} changed its rating", scored.review_id);
        }
        review_scores.push(scored);
    }

    let basis = scores::basis_scores(&review_scores, config.basis);
    if basis.is_empty() {
        return skip(SkipReason::NoScores);
    }

    let evidence = classify::scan_evidence(&thread, &submission.id);
    let summary = summarize_thread(&thread);

    match classify::classify(
        submission,
        basis,
        review_scores,
        evidence,
        summary,
        &config.controversy,
    ) {
        Some(candidate) => {
            debug!(
                "Candidate {} ({}, avg {:.2})",
                candidate.forum_id, candidate.kind, candidate.avg_score
            );
            Ok(Outcome::Candidate(candidate))
        }
        None => skip(SkipReason::NotControversial),
    }
}

fn summarize_thread(thread: &[Note]) -> ThreadSummary {
    let first_with = |role| thread.iter().find(|note| note.role() == Some(role));
    let non_empty = |note: &Note, field: &str| {
        let value = note.content.text(field);
        (!value.trim().is_empty()).then_some(value)
    };

    let meta = first_with(NoteRole::MetaReview);
    let decision = first_with(NoteRole::Decision);

    ThreadSummary {
        meta_recommendation: meta.and_then(|note| non_empty(note, "recommendation")),
        meta_confidence: meta.and_then(|note| non_empty(note, "confidence")),
        decision: decision.and_then(|note| non_empty(note, "decision")),
    }
}

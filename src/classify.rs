use crate::models::{
    CandidateResult, Classification, Evidence, Note, ReviewScore, Submission, ThreadSummary,
};
use crate::venue::Venue;

pub const DEFAULT_MEAN_THRESHOLD: f64 = 6.0;
pub const DEFAULT_LOW_SCORE_THRESHOLD: i64 = 3;

const SNIPPET_BEFORE: usize = 50;
const SNIPPET_AFTER: usize = 150;

pub const RAISE_PHRASES: &[&str] = &[
    "raised my score",
    "raise my score",
    "raising my score",
    "increased my score",
    "increase my score",
    "increasing my score",
    "raised my rating",
    "raise my rating",
    "raising my rating",
    "increased my rating",
    "increase my rating",
    "increasing my rating",
    "updated my score",
    "update my score",
    "updated my rating",
    "improved my score",
    "score has been raised",
    "score has been increased",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControversyConfig {
    /// Papers with a mean strictly below this are controversial.
    pub mean_threshold: f64,
    /// Papers with any score at or below this are controversial.
    pub low_score_threshold: i64,
}

impl Default for ControversyConfig {
    fn default() -> Self {
        Self {
            mean_threshold: DEFAULT_MEAN_THRESHOLD,
            low_score_threshold: DEFAULT_LOW_SCORE_THRESHOLD,
        }
    }
}

/// Scans every textual field of every thread note except the submission
/// itself. A note yields at most one snippet, for its first phrase hit.
pub fn scan_evidence(notes: &[Note], submission_id: &str) -> Vec<Evidence> {
    notes
        .iter()
        .filter(|note| note.id != submission_id)
        .filter_map(first_hit)
        .collect()
}

fn first_hit(note: &Note) -> Option<Evidence> {
    note.content.strings().find_map(|text| {
        let lowered = text.to_lowercase();
        RAISE_PHRASES.iter().copied().find_map(|phrase| {
            lowered.find(phrase).map(|pos| Evidence {
                note_id: note.id.clone(),
                phrase,
                snippet: snippet(text, &lowered, pos),
            })
        })
    })
}

fn snippet(original: &str, lowered: &str, pos: usize) -> String {
    let at = lowered[..pos].chars().count();
    // Lowercasing can change the char count; fall back to the lowered text
    // when the two no longer line up.
    let source = if original.chars().count() == lowered.chars().count() {
        original
    } else {
        lowered
    };

    let start = at.saturating_sub(SNIPPET_BEFORE);
    let window: String = source
        .chars()
        .skip(start)
        .take(at + SNIPPET_AFTER - start)
        .collect();
    window.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn mean(scores: &[i64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let total: f64 = scores.iter().map(|&score| score as f64).sum();
    Some(total / scores.len() as f64)
}

pub fn is_controversial(scores: &[i64], evidence: &[Evidence], config: &ControversyConfig) -> bool {
    if !evidence.is_empty() {
        return true;
    }
    let (Some(avg), Some(&min)) = (mean(scores), scores.iter().min()) else {
        return false;
    };
    avg < config.mean_threshold || min <= config.low_score_threshold
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Builds the candidate record, or `None` when the paper has no scores or is
/// not controversial. `scores` must already be sorted.
pub fn classify(
    submission: &Submission,
    scores: Vec<i64>,
    reviews: Vec<ReviewScore>,
    evidence: Vec<Evidence>,
    thread: ThreadSummary,
    config: &ControversyConfig,
) -> Option<CandidateResult> {
    let avg = mean(&scores)?;
    let min_score = *scores.first()?;
    if !is_controversial(&scores, &evidence, config) {
        return None;
    }

    let kind = if evidence.is_empty() {
        Classification::BorderlineControversial
    } else {
        Classification::Turnaround
    };

    Some(CandidateResult {
        forum_id: submission.id.clone(),
        title: submission.title.clone(),
        url: Venue::forum_url(&submission.id),
        avg_score: round2(avg),
        min_score,
        scores,
        reviews,
        evidence,
        thread,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note(id: &str, field: &str, text: &str) -> Note {
        Note {
            id: id.to_string(),
            forum: "p1".to_string(),
            replyto: Some("p1".to_string()),
            invitations: vec!["ICLR.cc/2025/Conference/Submission1/-/Official_Comment".to_string()],
            content: [(field, json!({ "value": text }))].into_iter().collect(),
            cdate: None,
            details: None,
        }
    }

    fn submission() -> Submission {
        Submission {
            id: "p1".to_string(),
            title: "Diffusion language models".to_string(),
            abstract_text: String::new(),
            venue: "ICLR 2025 Poster".to_string(),
            venue_id: "ICLR.cc/2025/Conference".to_string(),
        }
    }

    #[test]
    fn low_minimum_without_evidence_is_borderline() {
        let result = classify(
            &submission(),
            vec![3, 7, 8],
            Vec::new(),
            Vec::new(),
            ThreadSummary::default(),
            &ControversyConfig::default(),
        )
        .unwrap();

        assert_eq!(result.avg_score, 6.0);
        assert_eq!(result.min_score, 3);
        assert_eq!(result.scores, vec![3, 7, 8]);
        assert_eq!(result.kind, Classification::BorderlineControversial);
        assert_eq!(result.url, "https://openreview.net/forum?id=p1");
    }

    #[test]
    fn raise_evidence_makes_turnaround() {
        let thread = vec![note(
            "c1",
            "comment",
            "Thanks for the clarifications. I have increased my rating after the rebuttal.",
        )];
        let evidence = scan_evidence(&thread, "p1");
        assert_eq!(evidence.len(), 1);

        let result = classify(
            &submission(),
            vec![8, 8, 8],
            Vec::new(),
            evidence,
            ThreadSummary::default(),
            &ControversyConfig::default(),
        )
        .unwrap();

        assert_eq!(result.kind, Classification::Turnaround);
        assert_eq!(result.raise_count(), 1);
    }

    #[test]
    fn solid_scores_without_evidence_are_excluded() {
        let config = ControversyConfig::default();
        for scores in [vec![6, 6, 6], vec![4, 8, 8], vec![6, 8, 10]] {
            assert!(!is_controversial(&scores, &[], &config));
            let result = classify(
                &submission(),
                scores,
                Vec::new(),
                Vec::new(),
                ThreadSummary::default(),
                &config,
            );
            assert!(result.is_none());
        }
    }

    #[test]
    fn threshold_is_configurable() {
        let strict = ControversyConfig {
            low_score_threshold: 4,
            ..ControversyConfig::default()
        };

        assert!(!is_controversial(&[4, 8, 8], &[], &ControversyConfig::default()));
        assert!(is_controversial(&[4, 8, 8], &[], &strict));
        assert!(is_controversial(&[5, 6, 6], &[], &ControversyConfig::default()));
    }

    #[test]
    fn mean_of_huge_scores_does_not_overflow() {
        let avg = mean(&[i64::MAX, i64::MAX]).unwrap();
        assert!(avg.is_finite());
        assert!(avg > 0.0);
        assert_eq!(mean(&[3, 7, 8]), Some(6.0));
    }

    #[test]
    fn empty_scores_never_qualify() {
        let evidence = scan_evidence(&[note("c1", "comment", "I raised my score.")], "p1");

        let result = classify(
            &submission(),
            Vec::new(),
            Vec::new(),
            evidence,
            ThreadSummary::default(),
            &ControversyConfig::default(),
        );
        assert!(result.is_none());
    }

    #[test]
    fn one_snippet_per_note_and_submission_skipped() {
        let thread = vec![
            note("p1", "abstract", "Reviewers may raise my score, says the abstract."),
            note(
                "c1",
                "comment",
                "I raised my score. Later I increased my rating again.",
            ),
            note("c2", "comment", "Nothing relevant here."),
        ];

        let evidence = scan_evidence(&thread, "p1");
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].note_id, "c1");
        assert_eq!(evidence[0].phrase, "raised my score");
    }

    #[test]
    fn snippet_is_a_bounded_window() {
        let text = format!("{}RAISED MY SCORE{}", "a".repeat(200), "b".repeat(400));
        let evidence = scan_evidence(&[note("c1", "comment", &text)], "p1");

        let snippet = &evidence[0].snippet;
        assert_eq!(snippet.chars().count(), SNIPPET_BEFORE + SNIPPET_AFTER);
        assert!(snippet.starts_with(&"a".repeat(SNIPPET_BEFORE)));
        assert!(snippet.contains("RAISED MY SCORE"));
    }

    #[test]
    fn snippet_handles_multibyte_text() {
        let text = "Après la réponse, j'ai décidé: I raised my score à 8 — merci.";
        let evidence = scan_evidence(&[note("c1", "comment", text)], "p1");

        assert!(evidence[0].snippet.contains("raised my score"));
        assert!(evidence[0].snippet.starts_with("Après"));
    }
}

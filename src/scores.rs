use clap::ValueEnum;
use serde_json::Value;

use crate::models::{InitialScore, Note, NoteEdit, ReviewScore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScoreBasis {
    /// Post-discussion score: `final_rating` when present, else `rating`.
    Final,
    /// Score before discussion. Reviews whose initial score is unknown drop out.
    Initial,
}

/// Integer prefix of a rating such as `"8: Strong Accept"`. JSON integers are
/// taken as-is; anything without leading digits yields `None`.
pub fn parse_rating(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => parse_rating_str(s),
        _ => None,
    }
}

pub fn parse_rating_str(raw: &str) -> Option<i64> {
    let head = raw.split(':').next()?.trim();
    let digits: String = head.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn field_score(review: &Note, field: &str) -> Option<i64> {
    review.content.get(field).and_then(parse_rating)
}

/// Scores of one review. With `edits`, the initial score is recovered from the
/// edit history; without, the `rating` field is taken as the initial score.
pub fn extract(review: &Note, edits: Option<&[NoteEdit]>) -> ReviewScore {
    let rating = field_score(review, "rating");
    let current = field_score(review, "final_rating").or(rating);

    let field_initial = match rating {
        Some(score) => InitialScore::Known(score),
        None => InitialScore::Unknown,
    };
    let initial = match edits {
        Some(edits) => initial_from_edits(edits).unwrap_or(field_initial),
        None => field_initial,
    };

    ReviewScore {
        review_id: review.id.clone(),
        initial,
        current,
    }
}

/// `None` when at most one edit ever set the rating, i.e. it never moved.
/// Otherwise the earliest value, or `Changed` when that value is unreadable.
pub fn initial_from_edits(edits: &[NoteEdit]) -> Option<InitialScore> {
    let mut rating_edits: Vec<&NoteEdit> = edits
        .iter()
        .filter(|edit| {
            edit.touched_content()
                .is_some_and(|content| content.contains("rating"))
        })
        .collect();

    if rating_edits.len() < 2 {
        return None;
    }

    rating_edits.sort_by_key(|edit| edit.cdate.unwrap_or(i64::MAX));
    let earliest = rating_edits[0]
        .touched_content()
        .and_then(|content| content.get("rating"))
        .and_then(parse_rating);

    Some(match earliest {
        Some(score) => InitialScore::Known(score),
        None => InitialScore::Changed,
    })
}

pub fn basis_scores(reviews: &[ReviewScore], basis: ScoreBasis) -> Vec<i64> {
    let mut scores: Vec<i64> = reviews
        .iter()
        .filter_map(|review| match basis {
            ScoreBasis::Final => review.current,
            ScoreBasis::Initial => match review.initial {
                InitialScore::Known(score) => Some(score),
                InitialScore::Changed | InitialScore::Unknown => None,
            },
        })
        .collect();
    scores.sort_unstable();
    scores
}

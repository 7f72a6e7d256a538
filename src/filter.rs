use clap::ValueEnum;

use crate::models::Submission;
use crate::venue::Venue;

const ACCEPTED_TRACKS: [&str; 3] = ["poster", "spotlight", "oral"];

/// Accepted when the venue id is the conference's own id, or the venue label
/// names an accepted track. Absent fields arrive as empty strings.
pub fn is_accepted(submission: &Submission, venue: &Venue) -> bool {
    if submission.venue_id == venue.accepted_venue_id() {
        return true;
    }
    let label = submission.venue.to_lowercase();
    ACCEPTED_TRACKS.iter().any(|track| label.contains(track))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MatchPolicy {
    /// Any keyword matches.
    Any,
    /// Every keyword matches.
    All,
    /// The first keyword must match, plus any one of the rest.
    FirstPlusAny,
}

#[derive(Debug, Clone)]
pub struct TopicFilter {
    keywords: Vec<String>,
    policy: MatchPolicy,
}

impl TopicFilter {
    pub fn new<I, S>(keywords: I, policy: MatchPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|kw| kw.as_ref().trim().to_lowercase())
            .filter(|kw| !kw.is_empty())
            .collect();
        Self { keywords, policy }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        let text = format!("{} {}", submission.title, submission.abstract_text).to_lowercase();
        let hit = |kw: &String| text.contains(kw.as_str());

        match self.policy {
            MatchPolicy::Any => self.keywords.iter().any(hit),
            MatchPolicy::All => !self.keywords.is_empty() && self.keywords.iter().all(hit),
            MatchPolicy::FirstPlusAny => match self.keywords.split_first() {
                Some((first, [])) => hit(first),
                Some((first, rest)) => hit(first) && rest.iter().any(hit),
                None => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Venue {
    pub conference: String,
    pub year: String,
}

pub const FORUM_URL_BASE: &str = "https://openreview.net/forum?id=";

impl Venue {
    pub fn new(conference: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            conference: conference.into(),
            year: year.into(),
        }
    }

    pub fn domain(&self) -> String {
        format!("{}.cc/{}/Conference", self.conference, self.year)
    }

    pub fn submission_invitation(&self) -> String {
        format!("{}/-/Submission", self.domain())
    }

    /// Venue id carried by every accepted paper, regardless of track.
    pub fn accepted_venue_id(&self) -> String {
        self.domain()
    }

    pub fn cache_key(&self, category: &str) -> String {
        format!("{category}_{}_{}", self.conference, self.year)
    }

    pub fn forum_url(forum_id: &str) -> String {
        format!("{FORUM_URL_BASE}{forum_id}")
    }
}

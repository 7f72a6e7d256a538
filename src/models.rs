use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub forum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replyto: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub invitations: Vec<String>,
    #[serde(default)]
    pub content: NoteContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Note {
    pub fn role(&self) -> Option<NoteRole> {
        NoteRole::ALL.into_iter().find(|role| {
            self.invitations
                .iter()
                .any(|invitation| invitation.contains(role.marker()))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteRole {
    OfficialReview,
    MetaReview,
    Decision,
}

impl NoteRole {
    const ALL: [NoteRole; 3] = [
        NoteRole::OfficialReview,
        NoteRole::MetaReview,
        NoteRole::Decision,
    ];

    pub fn marker(self) -> &'static str {
        match self {
            NoteRole::OfficialReview => "Official_Review",
            NoteRole::MetaReview => "Meta_Review",
            NoteRole::Decision => "Decision",
        }
    }
}

/// Field name to value mapping of a note. API v2 wraps every value as
/// `{"value": ...}`; bare values are accepted as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteContent(BTreeMap<String, Value>);

impl NoteContent {
    pub fn get(&self, field: &str) -> Option<&Value> {
        let raw = self.0.get(field)?;
        let value = match raw {
            Value::Object(map) => map.get("value").unwrap_or(raw),
            _ => raw,
        };
        (!value.is_null()).then_some(value)
    }

    pub fn text(&self, field: &str) -> String {
        match self.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Every string-valued field, including strings inside list values,
    /// in field-name order.
    pub fn strings(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.keys().flat_map(move |field| {
            let values: Vec<&str> = match self.get(field) {
                Some(Value::String(s)) => vec![s.as_str()],
                Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            values
        })
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for NoteContent {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        NoteContent(
            iter.into_iter()
                .map(|(field, value)| (field.into(), value))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEdit {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub cdate: Option<i64>,
    #[serde(default)]
    pub note: Option<EditedNote>,
    #[serde(default)]
    pub content: Option<NoteContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditedNote {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: Option<NoteContent>,
}

impl NoteEdit {
    pub fn touched_content(&self) -> Option<&NoteContent> {
        self.note
            .as_ref()
            .and_then(|note| note.content.as_ref())
            .or(self.content.as_ref())
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub id: String,
    pub title: String,
    pub abstract_text: String,
    pub venue: String,
    pub venue_id: String,
}

impl From<&Note> for Submission {
    fn from(note: &Note) -> Self {
        Submission {
            id: note.id.clone(),
            title: note.content.text("title"),
            abstract_text: note.content.text("abstract"),
            venue: note.content.text("venue"),
            venue_id: note.content.text("venueid"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialScore {
    Known(i64),
    /// The edit history shows the rating moved but not where it started.
    Changed,
    Unknown,
}

impl fmt::Display for InitialScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialScore::Known(score) => write!(f, "{score}"),
            InitialScore::Changed => write!(f, "Changed"),
            InitialScore::Unknown => write!(f, "?"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewScore {
    pub review_id: String,
    pub initial: InitialScore,
    pub current: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    pub note_id: String,
    pub phrase: &'static str,
    pub snippet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Turnaround,
    BorderlineControversial,
}

impl Classification {
    pub fn label(self) -> &'static str {
        match self {
            Classification::Turnaround => "Turnaround",
            Classification::BorderlineControversial => "Borderline/Controversial",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadSummary {
    pub meta_recommendation: Option<String>,
    pub meta_confidence: Option<String>,
    pub decision: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResult {
    pub forum_id: String,
    pub title: String,
    pub url: String,
    pub avg_score: f64,
    pub min_score: i64,
    pub scores: Vec<i64>,
    pub reviews: Vec<ReviewScore>,
    pub evidence: Vec<Evidence>,
    pub thread: ThreadSummary,
    pub kind: Classification,
}

impl CandidateResult {
    pub fn raise_count(&self) -> usize {
        self.evidence.len()
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Missing(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
        OneOrMany::Missing(()) => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_unwraps_value_objects() {
        let note: Note = serde_json::from_value(json!({
            "id": "abc",
            "forum": "abc",
            "invitations": ["ICLR.cc/2025/Conference/Submission1/-/Official_Review"],
            "content": {
                "rating": {"value": "8: accept"},
                "summary": "plain value"
            }
        }))
        .unwrap();

        assert_eq!(note.content.text("rating"), "8: accept");
        assert_eq!(note.content.text("summary"), "plain value");
        assert_eq!(note.content.text("missing"), "");
        assert_eq!(note.role(), Some(NoteRole::OfficialReview));
    }

    #[test]
    fn invitations_accept_single_string() {
        let note: Note = serde_json::from_value(json!({
            "id": "n1",
            "invitations": "ICLR.cc/2025/Conference/Submission1/-/Meta_Review"
        }))
        .unwrap();

        assert_eq!(note.invitations.len(), 1);
        assert_eq!(note.role(), Some(NoteRole::MetaReview));
    }

    #[test]
    fn comments_have_no_role() {
        let note: Note = serde_json::from_value(json!({
            "id": "n2",
            "invitations": ["ICLR.cc/2025/Conference/Submission1/-/Official_Comment"]
        }))
        .unwrap();

        assert_eq!(note.role(), None);
    }

    #[test]
    fn strings_skip_non_text_fields() {
        let content: NoteContent = [
            ("comment", json!({"value": "thanks"})),
            ("keywords", json!({"value": ["a", "b"]})),
            ("rating", json!({"value": 6})),
        ]
        .into_iter()
        .collect();

        let strings: Vec<&str> = content.strings().collect();
        assert_eq!(strings, vec!["thanks", "a", "b"]);
    }

    #[test]
    fn submission_tolerates_missing_fields() {
        let note: Note = serde_json::from_value(json!({
            "id": "p1",
            "content": {"title": {"value": "A Paper"}}
        }))
        .unwrap();

        let submission = Submission::from(&note);
        assert_eq!(submission.title, "A Paper");
        assert_eq!(submission.abstract_text, "");
        assert_eq!(submission.venue_id, "");
    }
}

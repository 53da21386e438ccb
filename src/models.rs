use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/**
 * A poll as stored by the backing API
 */
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    /**
     * Free text, the API does not expose the choices as a list
     */
    pub options: String,
    pub correct_option: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/**
 * The organization a poll belongs to
 */
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

/**
 * The editable fields of a Poll
 *
 * This is both what the edit form posts and what the update call sends, missing
 * fields deserialize as empty so that validation can report them.
 */
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PollForm {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: String,
    #[serde(default)]
    pub correct_option: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub organization_id: Option<String>,
}

impl From<&Poll> for PollForm {
    fn from(poll: &Poll) -> Self {
        Self {
            question: poll.question.clone(),
            options: poll.options.clone(),
            correct_option: poll.correct_option.clone(),
            organization_id: poll.organization_id.clone(),
        }
    }
}

impl PollForm {
    pub fn get(&self, field: PollField) -> Option<&str> {
        match field {
            PollField::Question => Some(self.question.as_str()),
            PollField::Options => Some(self.options.as_str()),
            PollField::CorrectOption => Some(self.correct_option.as_str()),
            PollField::OrganizationId => self.organization_id.as_deref(),
        }
    }

    pub fn set(&mut self, field: PollField, value: String) {
        match field {
            PollField::Question => self.question = value,
            PollField::Options => self.options = value,
            PollField::CorrectOption => self.correct_option = value,
            PollField::OrganizationId => {
                self.organization_id = if value.is_empty() { None } else { Some(value) }
            }
        }
    }
}

/**
 * Names of the form fields, matching the wire names of the Poll
 */
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum PollField {
    Question,
    Options,
    CorrectOption,
    OrganizationId,
}

impl PollField {
    pub fn name(self) -> &'static str {
        match self {
            PollField::Question => "question",
            PollField::Options => "options",
            PollField::CorrectOption => "correct_option",
            PollField::OrganizationId => "organization_id",
        }
    }
}

impl std::fmt::Display for PollField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/*
 * Browsers post an unselected <select> as an empty string
 */
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}

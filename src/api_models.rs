use serde::{Deserialize, Serialize};

/**
 * Query string accepted by the organization search used by the picker
 */
#[derive(Debug, Default, Deserialize)]
pub struct OrganizationQuery {
    /**
     * Free text matched by the API against organization names
     */
    #[serde(default)]
    pub search: Option<String>,
}

/**
 * One entry of the organization picker
 */
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrganizationOption {
    pub id: String,
    pub name: String,
    pub selected: bool,
}

/**
 * Error payload returned by the API on failure
 *
 * Only used to pull a readable message out of a failed response
 */
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.error)
    }
}

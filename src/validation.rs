/*
 * The Poll schema: the three text fields are required, the organization is
 * optional. Nothing here runs until the form is submitted.
 */
use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{PollField, PollForm};

const REQUIRED: [PollField; 3] = [
    PollField::Question,
    PollField::Options,
    PollField::CorrectOption,
];

/**
 * Field name to message, one message per failing field
 */
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: PollField) -> Option<&str> {
        self.0.get(field.name()).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    fn add(&mut self, field: PollField, message: String) {
        self.0.entry(field.name()).or_insert(message);
    }
}

/**
 * Check the form against the Poll schema
 */
pub fn validate(form: &PollForm) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    for field in REQUIRED.iter() {
        if form.get(*field).map_or(true, str::is_empty) {
            errors.add(*field, format!("{} is a required field", field));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

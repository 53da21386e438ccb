/*
 * Handlebars templates for the HTML pages
 */
use handlebars::{Handlebars, TemplateError};
use log::*;
use tide::{Response, StatusCode};

use crate::view::EditContext;

const LAYOUT: &str = include_str!("../templates/layout.hbs");
const EDIT_POLL: &str = include_str!("../templates/edit_poll.hbs");

pub const EDIT_POLL_TEMPLATE: &str = "edit_poll";

/**
 * Build the registry with every page template loaded
 */
pub fn registry() -> Result<Handlebars<'static>, TemplateError> {
    let mut hb = Handlebars::new();
    hb.register_partial("layout", LAYOUT)?;
    hb.register_template_string(EDIT_POLL_TEMPLATE, EDIT_POLL)?;
    Ok(hb)
}

/**
 * Render the edit page with the given status
 */
pub fn edit_page(
    hb: &Handlebars<'_>,
    status: StatusCode,
    context: &EditContext,
) -> Result<Response, tide::Error> {
    let body = hb.render(EDIT_POLL_TEMPLATE, context).map_err(|err| {
        error!("Failed to render {}: {}", EDIT_POLL_TEMPLATE, err);
        tide::Error::from_str(StatusCode::InternalServerError, "Failed to render page")
    })?;

    Ok(Response::builder(status)
        .body(body)
        .content_type(tide::http::mime::HTML)
        .build())
}

/*!
 * The routes module contains all the tide routes and the logic to fulfill the responses for each
 * route.
 *
 * Modules are nested for cleaner organization here
 */
use tide::Request;

use crate::AppState;

/**
 *  GET /
 */
pub async fn index(_req: Request<AppState>) -> Result<String, tide::Error> {
    Ok("Poll administration, sign in to continue".to_string())
}

pub mod polls {
    use std::convert::TryFrom;

    use log::*;
    use tide::{Body, Redirect, Request, Response, StatusCode};

    use crate::api_models::{OrganizationOption, OrganizationQuery};
    use crate::auth::Session;
    use crate::client::ApiError;
    use crate::models::PollForm;
    use crate::render;
    use crate::view::{PollEditView, SubmitOutcome, ViewState};
    use crate::AppState;

    /**
     * HTTP status used when an API failure is shown to the user
     */
    pub fn status_for(err: &ApiError) -> StatusCode {
        match err {
            ApiError::NotFound(_) => StatusCode::NotFound,
            ApiError::Status { status, .. } if *status >= 400 && *status < 500 => {
                StatusCode::try_from(*status).unwrap_or(StatusCode::BadRequest)
            }
            _ => StatusCode::BadGateway,
        }
    }

    /*
     * Route params arrive still percent-encoded
     */
    fn poll_id(req: &Request<AppState>) -> Result<String, tide::Error> {
        let raw = req
            .param("id")
            .map_err(|_| tide::Error::from_str(StatusCode::BadRequest, "No poll id specified"))?;
        urlencoding::decode(raw)
            .map(|id| id.into_owned())
            .map_err(|_| tide::Error::from_str(StatusCode::BadRequest, "Invalid poll id specified"))
    }

    fn user(req: &Request<AppState>) -> String {
        req.ext::<Session>()
            .map(|s| s.user_id.clone())
            .unwrap_or_default()
    }

    /**
     * Options for the organization picker, with the current one selected
     *
     * A failed search only costs the picker its choices, the current value is
     * always offered so it survives a resubmit.
     */
    async fn picker_options(state: &AppState, current: Option<&str>) -> Vec<OrganizationOption> {
        let mut options: Vec<OrganizationOption> = match state.api.search_organizations(None).await
        {
            Ok(organizations) => organizations
                .into_iter()
                .map(|org| OrganizationOption {
                    selected: current == Some(org.id.as_str()),
                    id: org.id,
                    name: org.name,
                })
                .collect(),
            Err(err) => {
                warn!("Could not load organizations for the picker: {}", err);
                vec![]
            }
        };

        if let Some(current) = current {
            if !options.iter().any(|o| o.id == current) {
                options.insert(
                    0,
                    OrganizationOption {
                        id: current.to_string(),
                        name: current.to_string(),
                        selected: true,
                    },
                );
            }
        }
        options
    }

    async fn render_view(
        state: &AppState,
        view: &PollEditView,
        status: StatusCode,
    ) -> Result<Response, tide::Error> {
        let organizations = match view.state() {
            ViewState::Ready | ViewState::Submitting => {
                picker_options(state, view.form().organization_id.as_deref()).await
            }
            _ => vec![],
        };
        render::edit_page(&state.templates, status, &view.context(organizations))
    }

    /**
     *  GET /polls/edit/:id
     */
    pub async fn edit(req: Request<AppState>) -> Result<Response, tide::Error> {
        let id = poll_id(&req)?;
        let state = req.state();
        debug!("{} editing poll {}", user(&req), id);

        let mut view = PollEditView::new(Some(id), &state.config.list_path);
        view.load(state.api.as_ref(), &state.cache).await;

        let status = match view.state() {
            ViewState::LoadError(err) => status_for(err),
            _ => StatusCode::Ok,
        };
        render_view(state, &view, status).await
    }

    /**
     *  POST /polls/edit/:id
     */
    pub async fn update(mut req: Request<AppState>) -> Result<Response, tide::Error> {
        let id = poll_id(&req)?;
        let body = req.body_string().await?;
        let values: PollForm = serde_qs::from_str(&body).map_err(|err| {
            warn!("Malformed form for poll {}: {}", id, err);
            tide::Error::from_str(StatusCode::BadRequest, "Malformed form submission")
        })?;
        let state = req.state();

        let ticket = state.submissions.try_acquire(&id);

        let mut view = PollEditView::new(Some(id.clone()), &state.config.list_path);
        view.load_cached(state.api.as_ref(), &state.cache).await;

        let _ticket = match ticket {
            Some(ticket) => ticket,
            None => {
                warn!("{} resubmitted poll {} while a save was pending", user(&req), id);
                view.mark_pending(values);
                return render_view(state, &view, StatusCode::Conflict).await;
            }
        };

        info!("{} submitting poll {}", user(&req), id);

        let outcome = view.submit(values, state.api.as_ref(), &state.cache).await;
        match outcome {
            SubmitOutcome::Navigate(path) => Ok(Redirect::see_other(path).into()),
            SubmitOutcome::Invalid(_) => {
                render_view(state, &view, StatusCode::UnprocessableEntity).await
            }
            SubmitOutcome::Failed(err) => render_view(state, &view, status_for(&err)).await,
            SubmitOutcome::Busy => render_view(state, &view, StatusCode::Conflict).await,
            SubmitOutcome::Unavailable => {
                let status = match view.state() {
                    ViewState::LoadError(err) => status_for(err),
                    _ => StatusCode::NotFound,
                };
                render_view(state, &view, status).await
            }
        }
    }

    /**
     *  GET /polls/edit/:id/organizations?search=
     */
    pub async fn organizations(req: Request<AppState>) -> Result<Body, tide::Error> {
        let query: OrganizationQuery = req.query()?;
        let state = req.state();

        match state.api.search_organizations(query.search.as_deref()).await {
            Ok(organizations) => Body::from_json(&organizations),
            Err(err) => {
                error!("Organization search failed: {}", err);
                Err(tide::Error::from_str(
                    status_for(&err),
                    "Failed to search organizations",
                ))
            }
        }
    }

}

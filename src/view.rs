/*
 * The load / edit / submit lifecycle of the poll edit page
 *
 * Each request builds its own view. The view never talks HTTP itself, it is
 * handed the API and the cache so the same flow runs in tests.
 */
use log::*;
use serde::Serialize;

use crate::api_models::OrganizationOption;
use crate::cache::{Fetched, RequestCache};
use crate::client::{ApiError, PollApi};
use crate::models::{Poll, PollField, PollForm};
use crate::validation::{self, ValidationErrors};

#[derive(Clone, Debug, PartialEq)]
pub enum ViewState {
    Loading,
    Ready,
    /**
     * The poll could not be fetched, the form is never shown for this id
     */
    LoadError(ApiError),
    Submitting,
}

/**
 * What the caller should do after a submit
 */
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    /**
     * Saved, leave for the given path
     */
    Navigate(String),
    Invalid(ValidationErrors),
    Failed(ApiError),
    /**
     * A submission is already pending
     */
    Busy,
    /**
     * Nothing has been loaded that could be submitted
     */
    Unavailable,
}

/**
 * Shown when a second submission arrives while one is still pending
 */
pub const PENDING_MESSAGE: &str = "A submission for this poll is already in progress";

/**
 * Cache key for a poll, `None` when there is no id to fetch
 */
pub fn cache_key(id: Option<&str>) -> Option<String> {
    id.map(|id| format!("/polls/{}", id))
}

#[derive(Debug)]
pub struct PollEditView {
    id: Option<String>,
    list_path: String,
    state: ViewState,
    poll: Option<Poll>,
    form: PollForm,
    errors: ValidationErrors,
    form_error: Option<ApiError>,
    dirty: bool,
}

impl PollEditView {
    pub fn new(id: Option<String>, list_path: &str) -> Self {
        Self {
            id,
            list_path: list_path.to_string(),
            state: ViewState::Loading,
            poll: None,
            form: PollForm::default(),
            errors: ValidationErrors::default(),
            form_error: None,
            dirty: false,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn form(&self) -> &PollForm {
        &self.form
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn form_error(&self) -> Option<&ApiError> {
        self.form_error.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /**
     * Point the view at another poll
     *
     * Returns true when the id changed, in which case the view is back to
     * `Loading` and the next load repopulates the form.
     */
    pub fn set_id(&mut self, id: Option<String>) -> bool {
        if self.id == id {
            return false;
        }
        self.id = id;
        self.state = ViewState::Loading;
        self.poll = None;
        self.form = PollForm::default();
        self.errors = ValidationErrors::default();
        self.form_error = None;
        self.dirty = false;
        true
    }

    /**
     * Fetch the poll from the API, refreshing the cache
     */
    pub async fn load<A>(&mut self, api: &A, cache: &RequestCache<Poll>)
    where
        A: PollApi + ?Sized,
    {
        let key = cache_key(self.id.as_deref());
        let id = self.id.clone().unwrap_or_default();
        let fetched = cache
            .fetch(key.as_deref(), || async move { api.get_poll(&id).await })
            .await;
        self.apply(fetched, cache, key.as_deref()).await;
    }

    /**
     * Populate from the cache when possible, fetching only on a miss
     */
    pub async fn load_cached<A>(&mut self, api: &A, cache: &RequestCache<Poll>)
    where
        A: PollApi + ?Sized,
    {
        let key = cache_key(self.id.as_deref());
        let id = self.id.clone().unwrap_or_default();
        let fetched = cache
            .get_or_fetch(key.as_deref(), || async move { api.get_poll(&id).await })
            .await;
        self.apply(fetched, cache, key.as_deref()).await;
    }

    /*
     * A poll that fails to load is dropped from the cache, so entries only
     * live for polls the API still serves.
     */
    async fn apply(
        &mut self,
        fetched: Fetched<Poll>,
        cache: &RequestCache<Poll>,
        key: Option<&str>,
    ) {
        match fetched {
            Fetched::Idle => {
                debug!("No poll id, nothing to load");
            }
            Fetched::Loaded(poll) => {
                self.populate(poll);
                self.state = ViewState::Ready;
            }
            Fetched::Failed(err) => {
                error!("Failed to load poll {:?}: {}", self.id, err);
                if let Some(key) = key {
                    cache.invalidate(key).await;
                }
                self.state = ViewState::LoadError(err);
            }
        }
    }

    fn populate(&mut self, poll: Poll) {
        self.form = PollForm::from(&poll);
        self.poll = Some(poll);
        self.errors = ValidationErrors::default();
        self.dirty = false;
    }

    pub fn edit(&mut self, field: PollField, value: String) {
        self.form.set(field, value);
        self.dirty = true;
    }

    /**
     * Replace every field at once, as a posted form does
     */
    pub fn set_values(&mut self, values: PollForm) {
        if values != self.form {
            self.dirty = true;
        }
        self.form = values;
    }

    /**
     * Show the form as locked by a submission running elsewhere
     *
     * Only a loaded view can be marked, the values shown are the ones posted.
     */
    pub fn mark_pending(&mut self, values: PollForm) {
        if self.state == ViewState::Ready {
            self.set_values(values);
            self.state = ViewState::Submitting;
        }
    }

    /**
     * Validate the given values and, when they pass, send them as the update
     */
    pub async fn submit<A>(
        &mut self,
        values: PollForm,
        api: &A,
        cache: &RequestCache<Poll>,
    ) -> SubmitOutcome
    where
        A: PollApi + ?Sized,
    {
        match self.state {
            ViewState::Ready => {}
            ViewState::Submitting => return SubmitOutcome::Busy,
            ViewState::Loading | ViewState::LoadError(_) => return SubmitOutcome::Unavailable,
        }
        // Ready implies an id was loaded
        let id = match self.id.clone() {
            Some(id) => id,
            None => return SubmitOutcome::Unavailable,
        };

        self.form_error = None;
        self.set_values(values);

        if let Err(errors) = validation::validate(&self.form) {
            debug!("Poll {} failed validation: {:?}", id, errors);
            self.errors = errors.clone();
            return SubmitOutcome::Invalid(errors);
        }
        self.errors = ValidationErrors::default();

        self.state = ViewState::Submitting;
        let result = api.update_poll(&id, &self.form).await;
        self.state = ViewState::Ready;

        match result {
            Ok(updated) => {
                info!("Updated poll {}", id);
                if let Some(key) = cache_key(Some(&id)) {
                    cache.set(&key, updated.clone()).await;
                }
                self.populate(updated);
                SubmitOutcome::Navigate(self.list_path.clone())
            }
            Err(err) => {
                error!("Failed to update poll {}: {}", id, err);
                self.form_error = Some(err.clone());
                SubmitOutcome::Failed(err)
            }
        }
    }

    /**
     * Everything the page template needs
     */
    pub fn context(&self, organizations: Vec<OrganizationOption>) -> EditContext {
        let show_form = matches!(self.state, ViewState::Ready | ViewState::Submitting);
        EditContext {
            id: self.id.clone(),
            path_id: self.id.as_deref().map(|id| urlencoding::encode(id).into_owned()),
            loading: self.state == ViewState::Loading,
            load_error: match &self.state {
                ViewState::LoadError(err) => Some(err.to_string()),
                _ => None,
            },
            form_error: match (&self.form_error, &self.state) {
                (Some(err), _) => Some(err.to_string()),
                (None, ViewState::Submitting) => Some(PENDING_MESSAGE.to_string()),
                (None, _) => None,
            },
            form: if show_form {
                Some(FormContext::new(&self.form, &self.errors))
            } else {
                None
            },
            organizations,
            submitting: self.state == ViewState::Submitting,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EditContext {
    pub id: Option<String>,
    /**
     * The id escaped for use as a single path segment
     */
    pub path_id: Option<String>,
    pub loading: bool,
    pub load_error: Option<String>,
    pub form_error: Option<String>,
    pub form: Option<FormContext>,
    pub organizations: Vec<OrganizationOption>,
    pub submitting: bool,
}

#[derive(Debug, Serialize)]
pub struct FormContext {
    pub question: FieldContext,
    pub options: FieldContext,
    pub correct_option: FieldContext,
    pub organization_id: FieldContext,
}

impl FormContext {
    fn new(form: &PollForm, errors: &ValidationErrors) -> Self {
        let field = |field: PollField| FieldContext {
            name: field.name(),
            value: form.get(field).unwrap_or_default().to_string(),
            error: errors.get(field).map(str::to_string),
        };
        Self {
            question: field(PollField::Question),
            options: field(PollField::Options),
            correct_option: field(PollField::CorrectOption),
            organization_id: field(PollField::OrganizationId),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FieldContext {
    pub name: &'static str,
    pub value: String,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::models::Organization;

    #[derive(Default)]
    struct StubApi {
        polls: Vec<Poll>,
        fail_update: Option<ApiError>,
        gets: Mutex<Vec<String>>,
        updates: Mutex<Vec<(String, PollForm)>>,
    }

    #[async_trait]
    impl PollApi for StubApi {
        async fn get_poll(&self, id: &str) -> Result<Poll, ApiError> {
            self.gets.lock().unwrap().push(id.to_string());
            self.polls
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("poll {}", id)))
        }

        async fn update_poll(&self, id: &str, form: &PollForm) -> Result<Poll, ApiError> {
            self.updates
                .lock()
                .unwrap()
                .push((id.to_string(), form.clone()));
            if let Some(err) = &self.fail_update {
                return Err(err.clone());
            }
            Ok(Poll {
                id: id.to_string(),
                question: form.question.clone(),
                options: form.options.clone(),
                correct_option: form.correct_option.clone(),
                organization_id: form.organization_id.clone(),
                created_at: None,
                updated_at: None,
            })
        }

        async fn search_organizations(
            &self,
            _query: Option<&str>,
        ) -> Result<Vec<Organization>, ApiError> {
            Ok(vec![])
        }
    }

    fn poll_42() -> Poll {
        Poll {
            id: "42".into(),
            question: "Q1".into(),
            options: "A,B".into(),
            correct_option: "A".into(),
            organization_id: Some("org-1".into()),
            created_at: None,
            updated_at: None,
        }
    }

    fn api() -> StubApi {
        StubApi {
            polls: vec![poll_42()],
            ..Default::default()
        }
    }

    async fn loaded(api: &StubApi, cache: &RequestCache<Poll>) -> PollEditView {
        let mut view = PollEditView::new(Some("42".into()), "/polls");
        view.load(api, cache).await;
        view
    }

    #[async_std::test]
    async fn load_populates_every_field() {
        let api = api();
        let cache = RequestCache::new();
        let view = loaded(&api, &cache).await;

        assert_eq!(view.state(), &ViewState::Ready);
        assert_eq!(view.form(), &PollForm::from(&poll_42()));
        assert!(!view.is_dirty());
        assert_eq!(cache.get("/polls/42").await, Some(poll_42()));

        let ctx = view.context(vec![]);
        let form = ctx.form.unwrap();
        assert_eq!(form.question.value, "Q1");
        assert_eq!(form.options.value, "A,B");
        assert_eq!(form.correct_option.value, "A");
        assert_eq!(form.organization_id.value, "org-1");
    }

    #[async_std::test]
    async fn missing_poll_hides_the_form() {
        let api = api();
        let cache = RequestCache::new();
        let mut view = PollEditView::new(Some("missing".into()), "/polls");
        view.load(&api, &cache).await;

        assert_eq!(
            view.state(),
            &ViewState::LoadError(ApiError::NotFound("poll missing".into()))
        );
        let ctx = view.context(vec![]);
        assert!(ctx.form.is_none());
        assert!(!ctx.loading);
        assert_eq!(ctx.load_error.as_deref(), Some("poll missing could not be found"));
    }

    #[async_std::test]
    async fn no_id_stays_loading_without_fetching() {
        let api = api();
        let cache = RequestCache::new();
        let mut view = PollEditView::new(None, "/polls");
        view.load(&api, &cache).await;

        assert_eq!(view.state(), &ViewState::Loading);
        assert!(api.gets.lock().unwrap().is_empty());
        assert!(view.context(vec![]).loading);
    }

    #[async_std::test]
    async fn load_cached_skips_the_api_on_a_hit() {
        let api = api();
        let cache = RequestCache::new();
        cache.set("/polls/42", poll_42()).await;

        let mut view = PollEditView::new(Some("42".into()), "/polls");
        view.load_cached(&api, &cache).await;
        assert_eq!(view.state(), &ViewState::Ready);
        assert!(api.gets.lock().unwrap().is_empty());
    }

    #[async_std::test]
    async fn changing_id_reloads() {
        let api = api();
        let cache = RequestCache::new();
        let mut view = loaded(&api, &cache).await;

        assert!(!view.set_id(Some("42".into())));
        assert_eq!(view.state(), &ViewState::Ready);

        assert!(view.set_id(Some("missing".into())));
        assert_eq!(view.state(), &ViewState::Loading);
        assert_eq!(view.form(), &PollForm::default());
    }

    #[async_std::test]
    async fn edit_marks_dirty() {
        let api = api();
        let cache = RequestCache::new();
        let mut view = loaded(&api, &cache).await;

        view.edit(PollField::Question, "Q2".into());
        assert!(view.is_dirty());
        assert_eq!(view.form().question, "Q2");
        // validation waits for submit
        view.edit(PollField::Options, String::new());
        assert!(view.errors().is_empty());
    }

    #[async_std::test]
    async fn successful_submit_updates_once_and_navigates() {
        let api = api();
        let cache = RequestCache::new();
        let mut view = loaded(&api, &cache).await;

        let mut values = view.form().clone();
        values.question = "Q2".into();
        let outcome = view.submit(values, &api, &cache).await;

        assert_eq!(outcome, SubmitOutcome::Navigate("/polls".into()));
        let updates = api.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0],
            (
                "42".to_string(),
                PollForm {
                    question: "Q2".into(),
                    options: "A,B".into(),
                    correct_option: "A".into(),
                    organization_id: Some("org-1".into()),
                }
            )
        );
        assert_eq!(cache.get("/polls/42").await.unwrap().question, "Q2");
        assert!(!view.is_dirty());
        assert_eq!(view.state(), &ViewState::Ready);
    }

    #[async_std::test]
    async fn invalid_submit_never_reaches_the_api() {
        let api = api();
        let cache = RequestCache::new();
        let mut view = loaded(&api, &cache).await;

        let mut values = view.form().clone();
        values.question.clear();
        let outcome = view.submit(values, &api, &cache).await;

        match outcome {
            SubmitOutcome::Invalid(errors) => {
                assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["question"])
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
        assert!(api.updates.lock().unwrap().is_empty());
        let ctx = view.context(vec![]);
        assert_eq!(
            ctx.form.unwrap().question.error.as_deref(),
            Some("question is a required field")
        );
    }

    #[async_std::test]
    async fn failed_submit_keeps_the_edits() {
        let mut api = api();
        api.fail_update = Some(ApiError::Status {
            status: 500,
            message: "database unavailable".into(),
        });
        let cache = RequestCache::new();
        let mut view = loaded(&api, &cache).await;

        let mut values = view.form().clone();
        values.question = "Q2".into();
        let outcome = view.submit(values.clone(), &api, &cache).await;

        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        assert_eq!(view.form(), &values);
        assert_eq!(view.state(), &ViewState::Ready);
        assert!(view.form_error().is_some());
        assert_eq!(cache.get("/polls/42").await.unwrap().question, "Q1");

        let ctx = view.context(vec![]);
        assert_eq!(
            ctx.form_error.as_deref(),
            Some("the API responded with 500: database unavailable")
        );
        assert_eq!(ctx.form.unwrap().question.value, "Q2");
    }

    #[async_std::test]
    async fn resubmit_clears_the_previous_error() {
        let mut api = api();
        api.fail_update = Some(ApiError::Transport("timed out".into()));
        let cache = RequestCache::new();
        let mut view = loaded(&api, &cache).await;

        let values = view.form().clone();
        view.submit(values.clone(), &api, &cache).await;
        assert!(view.form_error().is_some());

        api.fail_update = None;
        let outcome = view.submit(values, &api, &cache).await;
        assert_eq!(outcome, SubmitOutcome::Navigate("/polls".into()));
        assert!(view.form_error().is_none());
    }

    #[async_std::test]
    async fn submit_requires_a_loaded_poll() {
        let api = api();
        let cache = RequestCache::new();

        let mut view = PollEditView::new(Some("missing".into()), "/polls");
        view.load(&api, &cache).await;
        let outcome = view.submit(PollForm::from(&poll_42()), &api, &cache).await;
        assert_eq!(outcome, SubmitOutcome::Unavailable);

        let mut view = PollEditView::new(Some("42".into()), "/polls");
        let outcome = view.submit(PollForm::from(&poll_42()), &api, &cache).await;
        assert_eq!(outcome, SubmitOutcome::Unavailable);
        assert!(api.updates.lock().unwrap().is_empty());
    }

    #[async_std::test]
    async fn pending_submission_disables_submit() {
        let api = api();
        let cache = RequestCache::new();
        let mut view = loaded(&api, &cache).await;

        let mut values = view.form().clone();
        values.question = "Q2".into();
        view.mark_pending(values.clone());

        let ctx = view.context(vec![]);
        assert!(ctx.submitting);
        assert_eq!(ctx.form_error.as_deref(), Some(PENDING_MESSAGE));
        assert_eq!(ctx.form.unwrap().question.value, "Q2");

        let outcome = view.submit(values, &api, &cache).await;
        assert_eq!(outcome, SubmitOutcome::Busy);
        assert!(api.updates.lock().unwrap().is_empty());
    }

    #[async_std::test]
    async fn only_a_loaded_view_can_be_marked_pending() {
        let mut view = PollEditView::new(Some("42".into()), "/polls");
        view.mark_pending(PollForm::from(&poll_42()));
        assert_eq!(view.state(), &ViewState::Loading);
        assert!(view.context(vec![]).form_error.is_none());
    }

    #[async_std::test]
    async fn failed_load_drops_the_cached_poll() {
        let api = api();
        let cache = RequestCache::new();
        let mut stale = poll_42();
        stale.id = "missing".into();
        cache.set("/polls/missing", stale).await;

        let mut view = PollEditView::new(Some("missing".into()), "/polls");
        view.load(&api, &cache).await;
        assert!(matches!(view.state(), ViewState::LoadError(_)));
        assert_eq!(cache.get("/polls/missing").await, None);
    }

    #[test]
    fn path_id_is_escaped_as_one_segment() {
        let view = PollEditView::new(Some("a b/c".into()), "/polls");
        let ctx = view.context(vec![]);
        assert_eq!(ctx.id.as_deref(), Some("a b/c"));
        assert_eq!(ctx.path_id.as_deref(), Some("a%20b%2Fc"));
    }
}

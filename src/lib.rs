/*
 * Admin pages for editing polls held by the polls REST API
 */
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use handlebars::Handlebars;
use log::*;

pub mod api_models;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod models;
pub mod render;
pub mod routes;
pub mod validation;
pub mod view;

use auth::{AccessOperation, AccessService, AuthGuard, Permission, SessionSource, SessionStore};
use cache::RequestCache;
use client::PollApi;
use config::Config;
use models::Poll;

/**
 * Struct for carrying application state into tide request handlers
 */
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn PollApi>,
    pub cache: Arc<RequestCache<Poll>>,
    pub templates: Arc<Handlebars<'static>>,
    pub sessions: SessionStore,
    pub submissions: SubmitGuard,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        api: Arc<dyn PollApi>,
        config: Config,
    ) -> Result<Self, handlebars::TemplateError> {
        Ok(Self {
            api,
            cache: Arc::new(RequestCache::new()),
            templates: Arc::new(render::registry()?),
            sessions: SessionStore::default(),
            submissions: SubmitGuard::default(),
            config: Arc::new(config),
        })
    }
}

impl SessionSource for AppState {
    fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

/**
 * The permission required to use the edit page
 */
pub fn poll_update_permission() -> Permission {
    Permission::new(AccessService::Project, "poll", AccessOperation::Update)
}

/**
 * Construct the tide server with every route registered
 */
pub fn app(state: AppState) -> tide::Server<AppState> {
    let guard = AuthGuard::new(poll_update_permission(), &state.config.login_redirect);
    let mut app = tide::with_state(state);

    app.at("/").get(routes::index);
    app.at("/polls/edit/:id")
        .with(guard.clone())
        .get(routes::polls::edit)
        .post(routes::polls::update);
    app.at("/polls/edit/:id/organizations")
        .with(guard)
        .get(routes::polls::organizations);
    app
}

/**
 * Tracks which polls have a submission in flight
 */
#[derive(Clone, Debug, Default)]
pub struct SubmitGuard {
    pending: Arc<Mutex<HashSet<String>>>,
}

impl SubmitGuard {
    /**
     * Claim the poll for one submission, `None` if another one is pending
     */
    pub fn try_acquire(&self, id: &str) -> Option<SubmitTicket> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.insert(id.to_string()) {
            Some(SubmitTicket {
                id: id.to_string(),
                pending: self.pending.clone(),
            })
        } else {
            debug!("Submission for poll {} already pending", id);
            None
        }
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }
}

/**
 * Releases its poll when dropped
 */
#[derive(Debug)]
pub struct SubmitTicket {
    id: String,
    pending: Arc<Mutex<HashSet<String>>>,
}

impl Drop for SubmitTicket {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

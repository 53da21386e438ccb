/*
 * Session lookup and the authorization guard placed in front of routes
 */
use std::collections::HashMap;
use std::sync::Arc;

use async_std::sync::RwLock;
use async_trait::async_trait;
use log::*;
use serde::{Deserialize, Serialize};
use tide::{Middleware, Next, Redirect, Request, Response, StatusCode};
use uuid::Uuid;

/**
 * Cookie carrying the id of the caller's session
 */
pub const SESSION_COOKIE: &str = "session_id";

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessService {
    Platform,
    Project,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOperation {
    Create,
    Read,
    Update,
    Delete,
}

/**
 * One operation on one entity within a service
 */
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Permission {
    pub service: AccessService,
    pub entity: String,
    pub operation: AccessOperation,
}

impl Permission {
    pub fn new(service: AccessService, entity: &str, operation: AccessOperation) -> Self {
        Self {
            service,
            entity: entity.to_string(),
            operation,
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {} ({:?})", self.operation, self.entity, self.service)
    }
}

/**
 * An authenticated user and what they are allowed to do
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub permissions: Vec<Permission>,
}

impl Session {
    pub fn allows(&self, required: &Permission) -> bool {
        self.permissions.iter().any(|granted| granted == required)
    }
}

/**
 * Sessions issued by the sign-in service, keyed by the cookie value
 */
#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub async fn insert(&self, id: Uuid, session: Session) {
        self.sessions.write().await.insert(id, session);
    }

    pub async fn get(&self, id: &Uuid) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &Uuid) -> Option<Session> {
        self.sessions.write().await.remove(id)
    }
}

/**
 * Application state that can resolve sessions
 */
pub trait SessionSource {
    fn sessions(&self) -> &SessionStore;
}

/**
 * Route middleware requiring a session holding `required`
 *
 * Requests without a session are redirected to `redirect_to` before the
 * endpoint runs. Sessions lacking the permission get a 403. Otherwise the
 * `Session` is attached to the request extensions.
 */
#[derive(Clone, Debug)]
pub struct AuthGuard {
    required: Permission,
    redirect_to: String,
}

impl AuthGuard {
    pub fn new(required: Permission, redirect_to: &str) -> Self {
        Self {
            required,
            redirect_to: redirect_to.to_string(),
        }
    }
}

#[async_trait]
impl<State> Middleware<State> for AuthGuard
where
    State: SessionSource + Clone + Send + Sync + 'static,
{
    async fn handle(&self, mut req: Request<State>, next: Next<'_, State>) -> tide::Result {
        let session_id = req
            .cookie(SESSION_COOKIE)
            .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());
        let store = req.state().sessions().clone();

        let session = match session_id {
            Some(id) => store.get(&id).await,
            None => None,
        };

        match session {
            None => {
                info!(
                    "Unauthenticated request for {}, redirecting to {}",
                    req.url().path(),
                    self.redirect_to
                );
                Ok(Redirect::new(&self.redirect_to).into())
            }
            Some(session) if !session.allows(&self.required) => {
                warn!(
                    "User {} lacks permission to {} for {}",
                    session.user_id,
                    self.required,
                    req.url().path()
                );
                Ok(Response::builder(StatusCode::Forbidden)
                    .body(format!("Not permitted: {}", self.required))
                    .build())
            }
            Some(session) => {
                debug!("Authorized {} for {}", session.user_id, req.url().path());
                req.set_ext(session);
                Ok(next.run(req).await)
            }
        }
    }
}

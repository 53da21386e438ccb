use std::sync::Arc;

use log::*;

use polledit::auth::Session;
use polledit::client::RestClient;
use polledit::config::Config;
use polledit::{poll_update_permission, AppState};

fn invalid(err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

#[async_std::main]
async fn main() -> Result<(), std::io::Error> {
    pretty_env_logger::init();

    let config = Config::from_env().map_err(|err| {
        error!("Could not load configuration! {}", err);
        invalid(err)
    })?;

    let api = RestClient::new(
        config.api_url.clone(),
        config.api_token.clone(),
        config.api_timeout,
    )
    .map_err(|err| {
        error!("Could not build the API client! {}", err);
        invalid(err)
    })?;

    let bind_address = config.bind_address.clone();
    let seed_session = config.seed_session;
    let state = AppState::new(Arc::new(api), config).map_err(|err| {
        error!("Could not load templates! {}", err);
        invalid(err)
    })?;

    if let Some(id) = seed_session {
        info!("Seeding admin session {}", id);
        state
            .sessions
            .insert(
                id,
                Session {
                    user_id: "admin".to_string(),
                    permissions: vec![poll_update_permission()],
                },
            )
            .await;
    }

    let app = polledit::app(state);
    info!("Listening on {}", bind_address);
    app.listen(bind_address).await?;
    Ok(())
}

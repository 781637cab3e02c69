use std::sync::Arc;

use kellerclub_drinks_backend::error::AppError;
use kellerclub_drinks_backend::handlers::AppState;
use kellerclub_drinks_backend::server::{run_server, setup_tracing};
use kellerclub_drinks_backend::templating::Templates;
use kellerclub_drinks_config::get_settings;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    setup_tracing();

    let settings = get_settings()?;
    info!(datastore = ?settings.datastore, "starting up server...");
    let datastore = kellerclub_drinks_database::from_settings(&settings.datastore)?;
    let templates = Templates::new()?;

    run_server(AppState {
        settings: Arc::new(settings),
        datastore,
        templates: Arc::new(templates),
    })
    .await
}

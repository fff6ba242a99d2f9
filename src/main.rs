use feature_flag_evaluator::{
    config::Config,
    evaluation::{Evaluator, MatcherTable},
    routes,
    state::AppState,
    store::FlagStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let mut matchers = MatcherTable::new();
    let store = FlagStore::load(&config.flagset_path, &mut matchers).await?;
    let state = AppState::new(store, Evaluator::new(matchers));

    let app = routes::routes(state);

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;

    info!("server listening on http://{}", config.addr());

    axum::serve(listener, app).await?;
    Ok(())
}

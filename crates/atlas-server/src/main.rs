use tracing_subscriber::EnvFilter;

use atlas_server::{build_app, scheduler, AppState};

#[tokio::main]
async fn main() {
    let mut filter = EnvFilter::from_default_env();
    match "atlas=info".parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Invalid default log directive: {e}"),
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = atlas_core::AppConfig::from_env();
    let addr = format!("{}:{}", config.server_host, config.server_port);

    let state = match AppState::build(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialise application state");
            std::process::exit(1);
        }
    };

    tokio::spawn(scheduler::run_metrics_loop(state.clone()));

    let app = build_app(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind listener");
            std::process::exit(1);
        }
    };
    tracing::info!("Atlas ERP server listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server terminated");
        std::process::exit(1);
    }
}

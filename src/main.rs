use log::{error, info};
use service::{config::Config, logging::Logger};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!(
        "Starting hyperlocal platform API [{}] in {:?}...",
        config.api_version(),
        config.runtime_env()
    );

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    let gateway = domain::gateway::from_config(&config);
    let service_state = service::AppState::new(config, &db);

    // Domain events fan out to connected SSE clients
    let sse_manager = Arc::new(sse::Manager::new());
    let event_publisher = events::EventPublisher::new().with_handler(Arc::new(
        sse::SseDomainEventHandler::new(Arc::clone(&sse_manager)),
    ));

    let app_state = web::AppState::new(service_state, sse_manager, event_publisher, gateway);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server exited with error: {e}");
        std::process::exit(1);
    }
}

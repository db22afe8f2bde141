use coralkv::config::ServerConfig;
use coralkv::server::Server;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match ServerConfig::from_args(std::env::args()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("invalid arguments: {}", error);
            std::process::exit(2);
        }
    };

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(error) => {
            tracing::error!(error = %error, "failed to start server");
            std::process::exit(1);
        }
    };

    if let Some(address) = server.local_addr() {
        tracing::info!(%address, "listening");
    }
    server.run().await;
}

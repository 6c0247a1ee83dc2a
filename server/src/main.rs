use clap::Parser;
use env_logger::Env;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;

/// Main-method of the application.
/// Parses command-line arguments, then runs the coordinator until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    let server = Server::bind(config).await?;
    let handle = server.handle();
    let server_task = tokio::spawn(server.run());

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            handle.shutdown();
        }
    }

    Ok(())
}

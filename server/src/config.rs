use clap::Parser;
use std::time::Duration;

/// Chess matchmaking and game-session server.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "3001")]
    pub port: u16,
    /// Maximum number of concurrent connections
    #[clap(short, long, default_value = "1024")]
    pub max_clients: usize,
    /// Seconds between keepalive pings
    #[clap(long, default_value = "10")]
    pub ping_interval_secs: u64,
    /// Seconds of silence after which a connection is dropped
    #[clap(long, default_value = "30")]
    pub idle_timeout_secs: u64,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            max_clients: 1024,
            ping_interval_secs: 10,
            idle_timeout_secs: 30,
        }
    }
}

use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Capture-the-flag session server")]
struct Args {
    /// Address to bind to
    #[clap(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[clap(short, long, env = "PORT_NUMBER", default_value = "8080")]
    port: u16,

    /// Players needed before the game starts
    #[clap(short, long, env = "MIN_PLAYERS", default_value = "4")]
    min_players: usize,

    /// Number of flags on the map
    #[clap(long = "flags", env = "FLAG_COUNT", default_value = "7")]
    flag_count: usize,

    /// Maximum concurrent connections
    #[clap(long, env = "MAX_CLIENTS", default_value = "16")]
    max_clients: usize,

    /// Stop the server once the last player exits
    #[clap(long, env = "EXIT_WHEN_EMPTY")]
    exit_when_empty: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        min_players: args.min_players,
        flag_count: args.flag_count,
        max_clients: args.max_clients,
        exit_when_empty: args.exit_when_empty,
    };

    info!("Starting server on {}", config.bind_addr);
    info!(
        "Game starts at {} players, {} flags",
        config.min_players, config.flag_count
    );

    let server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use vpnfleet::fleet::FleetManager;
use vpnfleet::fleet::control::HttpControlApi;
use vpnfleet::fleet::credentials::{CredentialProvider, FileCredentialProvider};
use vpnfleet::fleet::docker::DockerRuntime;
use vpnfleet::fleet::ports::PortPool;
use vpnfleet::fleet::registry::Registry;
use vpnfleet::server::config::ServerConfig;
use vpnfleet::version::VERSION;
use vpnfleet::web::{AppState, create_axum_router};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "vpnfleet.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,bollard=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
        return;
    }
    info!("Shutdown signal received, stopping server.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // Logging depends on log_dir, so config comes first.
    let server_config = ServerConfig::load(args.config.as_deref())?;
    init_logging(&server_config.log_dir);
    info!("Starting vpnfleet, version: {}", VERSION);

    let runtime = DockerRuntime::connect(server_config.docker_socket.as_deref()).map_err(|e| {
        error!(error = %e, "Failed to connect to the container runtime.");
        e.to_string()
    })?;

    let credentials = FileCredentialProvider::new(&server_config.config_dir);
    match credentials.ensure_auth_file().await {
        Ok(path) => match credentials.credentials().await {
            Ok(creds) => info!(path = ?path, username = %creds.username, "Auth config initialized."),
            Err(e) => error!(path = ?path, error = %e, "Auth config exists but could not be parsed."),
        },
        Err(e) => error!(error = %e, "Failed to initialize auth config."),
    }

    let control = HttpControlApi::new(
        server_config.control_host.clone(),
        server_config.status_timeout(),
    )?;
    let ports = server_config.port_allocator()?;

    let fleet = FleetManager::new(
        server_config.image_settings(),
        ports,
        Registry::new(&server_config.registry_path),
        Arc::new(runtime),
        Arc::new(control),
        Arc::new(credentials),
    )
    .with_reconnect_policy(server_config.reconnect_policy());

    let addr: SocketAddr = server_config.listen_address.parse()?;
    let app_state = Arc::new(AppState {
        fleet: Arc::new(fleet),
        config: Arc::new(server_config),
    });
    let app = create_axum_router(app_state.clone());

    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4()?
    } else {
        tokio::net::TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1024)?;

    let control_range = ports.range(PortPool::Control);
    let proxy_range = ports.range(PortPool::Proxy);
    info!(
        address = %addr,
        image = %app_state.config.image,
        control_ports = %control_range,
        proxy_ports = %proxy_range,
        "Fleet manager listening."
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

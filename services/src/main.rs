use paperdrop_services::config::Config;
use paperdrop_services::database::SqliteStore;
use paperdrop_services::qr::QrGenerator;
use paperdrop_services::routes;
use paperdrop_services::uploads::UploadStore;
use std::net::{IpAddr, SocketAddr};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const BUILD_DATE: &str = env!("BUILD_DATE");
const BUILD_COMMIT: &str = env!("BUILD_COMMIT");
const BUILD_BRANCH: &str = env!("BUILD_BRANCH");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();
    print_build_info();

    let config = Config::init()?;
    info!(
        environment = %config.environment(),
        server_addr = %config.server_addr(),
        port = %config.port(),
        public_base_url = %config.public_base_url(),
        "Configuration loaded"
    );

    let store = SqliteStore::open(config.database_path()).await?;
    let uploads = UploadStore::new(config.uploads_dir()).await?;

    let addr = SocketAddr::from((config.server_addr().parse::<IpAddr>()?, config.port()));
    let router = routes(store, uploads, QrGenerator, config);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,paperdrop_services=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn print_build_info() {
    info!(
        build_date = BUILD_DATE,
        build_commit = BUILD_COMMIT,
        build_branch = BUILD_BRANCH,
        "Build information"
    );
}

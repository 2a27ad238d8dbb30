use sql_migration_wizard::config::AppConfig;
use sql_migration_wizard::{serve, WizardService};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("SQL migration wizard: target selection and assessment service");

    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}, catalog={}",
        config.server.host, config.server.port, config.provider.catalog_path
    );

    let bind_address = config.server_address();
    let service = WizardService::from_config(config).await?;

    let listener = TcpListener::bind(&bind_address).await?;
    println!("Wizard server running on http://{}", bind_address);

    serve(listener, service).await
}

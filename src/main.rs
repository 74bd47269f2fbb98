use catalog_connector::observability::init_tracing;
use catalog_connector::{CatalogError, CatalogServer, Config};

#[tokio::main]
async fn main() -> Result<(), CatalogError> {
    init_tracing()?;

    tracing::info!("Starting catalog connector");

    let config = Config::from_env()?;
    let server = CatalogServer::new(config).await?;
    server.run().await?;

    Ok(())
}

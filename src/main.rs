use std::io::Write;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use csv_index_provisioner::{
    config::{Config, StoreBackend},
    indexes,
    provision::{provision, ProvisionOptions},
    report,
    storage::Database,
    store::{IndexCatalog, MongoStore},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "csv-index-provisioner starting"
    );

    let config = Config::load()?;
    let collection = config.store.collection_name.clone();

    let catalog: Arc<dyn IndexCatalog> = match config.store.backend {
        StoreBackend::Mongo => {
            let store = MongoStore::connect(
                &config.store.mongodb_uri,
                &config.store.database_name,
                &collection,
            )
            .await?;
            info!(
                database = %config.store.database_name,
                collection = %collection,
                "Connected to MongoDB"
            );
            Arc::new(store)
        }
        StoreBackend::Embedded => {
            let db = Database::open(&config.store.data_dir)?;
            info!("Embedded database opened at: {}", config.store.data_dir);
            Arc::new(db)
        }
    };

    let plan = indexes::active_plan(&config);
    let options = ProvisionOptions {
        collection: collection.clone(),
        rebuild: config.indexes.rebuild,
        ttl_seconds: config.indexes.ttl_seconds,
    };

    let mut out = std::io::stdout().lock();
    let result = provision(catalog.as_ref(), &plan, &options, &mut out).await?;
    report::write_reference(&mut out, &collection, &plan)?;
    out.flush()?;

    info!(
        created = result.created.len(),
        unchanged = result.unchanged.len(),
        total = result.indexes.len(),
        discrepancies = result.discrepancies.len(),
        "Index provisioning complete"
    );
    Ok(())
}

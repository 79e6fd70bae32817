use std::sync::Arc;
use std::time::Duration;

use lead_intake::config::{IntakeConfig, StoreBackend};
use lead_intake::delivery::{self, LogGateway, MessageGateway, WhatsAppClient};
use lead_intake::flow::IntakeEngine;
use lead_intake::leads::{FallbackLog, PersistenceGateway, SupplierRouter};
use lead_intake::session::memory::spawn_sweep_task;
use lead_intake::session::{CooldownStore, MemoryStore, SessionStore};
use lead_intake::store::{LeadRepository, LibSqlBackend, StaticDirectory, SupplierDirectory};
use lead_intake::webhook::{WebhookState, webhook_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = IntakeConfig::from_env()?;

    eprintln!("📋 Lead Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook", config.port);

    // ── Delivery ─────────────────────────────────────────────────────────
    let transport: Arc<dyn MessageGateway> = match config.whatsapp {
        Some(ref wa) => {
            eprintln!("   WhatsApp: phone number {}", wa.phone_number_id);
            Arc::new(WhatsAppClient::new(wa.token.clone(), wa.phone_number_id.clone()))
        }
        None => {
            eprintln!("   WhatsApp: not configured, messages are logged only");
            Arc::new(LogGateway)
        }
    };
    let gateway = delivery::build_gateway(config.delivery, transport, config.queue.clone());
    eprintln!("   Delivery: {:?}", config.delivery);

    // ── Stores ───────────────────────────────────────────────────────────
    let sessions: Arc<dyn SessionStore>;
    let cooldowns: Arc<dyn CooldownStore>;
    let repository: Option<Arc<dyn LeadRepository>>;
    let directory: Arc<dyn SupplierDirectory>;

    match config.store {
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            let _sweep_handle = spawn_sweep_task(Arc::clone(&store), Duration::from_secs(60));
            sessions = store.clone();
            cooldowns = store;
            repository = None;
            directory = Arc::new(match config.suppliers_file {
                Some(ref path) => StaticDirectory::from_json_file(path)?,
                None => StaticDirectory::default(),
            });
            eprintln!("   Store: memory (leads go to {})", config.fallback_log.display());
        }
        StoreBackend::LibSql => {
            let db = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);
            if let Some(ref path) = config.suppliers_file {
                for supplier in StaticDirectory::from_json_file(path)?.suppliers() {
                    db.upsert_supplier(supplier).await?;
                }
            }
            sessions = db.clone();
            cooldowns = db.clone();
            repository = Some(db.clone());
            directory = db;
            eprintln!("   Store: libsql ({})", config.db_path.display());
        }
    }

    // ── Leads ────────────────────────────────────────────────────────────
    let sink = Arc::new(PersistenceGateway::new(
        repository,
        FallbackLog::new(config.fallback_log.clone()),
        Arc::clone(&gateway),
        config.admin_phone.clone(),
    ));
    let router = Arc::new(SupplierRouter::new(directory, Arc::clone(&gateway)));

    let engine = Arc::new(IntakeEngine::new(
        sessions,
        cooldowns,
        gateway,
        sink,
        router,
        config.engine_settings(),
    ));

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = webhook_routes(WebhookState {
        engine,
        verify_token: config.verify_token.clone(),
    });
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Webhook server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

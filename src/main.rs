use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skincare_ai::api::{self, AppState};
use skincare_ai::core::{build_email_provider, ModelLoader, ModelRegistry};
use skincare_ai::infrastructure::connect_store;
use skincare_ai::utils::config::Config;
use skincare_ai::workers::{CleanupConfig, CleanupWorker};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Chargement de la configuration (avant le logging, qui en dépend)
    let config = Config::from_env().context("❌ Impossible de charger la configuration")?;

    setup_tracing(&config);
    info!("🚀 Démarrage de {} v{}", skincare_ai::NAME, skincare_ai::VERSION);
    info!("🔧 Mode: {}", config.run_mode);

    if config.is_production() && config.email_provider == "log" {
        warn!("⚠️  EMAIL_PROVIDER=log en production: les codes OTP ne seront pas envoyés");
    }

    // Initialisation des services
    let store = connect_store(&config)
        .await
        .context("❌ Impossible d'initialiser la base de données")?;

    let registry = Arc::new(ModelRegistry::new(&config));
    let available = registry.available_models();
    if available.is_empty() {
        warn!("⚠️  Aucun modèle trouvé dans {:?}: les analyses seront en erreur", config.models_dir);
    } else {
        info!("✅ Modèles disponibles: {:?}", available);
    }
    let models: Arc<dyn ModelLoader> = registry;

    let email_provider =
        build_email_provider(&config).context("❌ Impossible d'initialiser l'envoi d'emails")?;

    let state = AppState::build(config.clone(), store.clone(), models, email_provider)
        .context("❌ Impossible de construire les services")?;
    state
        .storage
        .init()
        .await
        .context("❌ Impossible d'initialiser le stockage média")?;

    // Démarrage du worker de nettoyage
    match CleanupConfig::from_config(&config) {
        Some(cleanup_config) => {
            let worker = CleanupWorker::new(cleanup_config, store);
            tokio::spawn(worker.start());
        }
        None => info!("⏸️  Nettoyage des OTP désactivé (OTP_CLEANUP_INTERVAL_MINUTES=0)"),
    }

    let app_state = web::Data::new(state);
    let media_root = config.media_root.clone();
    let max_upload = config.max_upload_bytes();

    // Configuration du serveur Actix-Web
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            // marge pour les en-têtes multipart
            .app_data(web::PayloadConfig::new(max_upload + 64 * 1024))
            .configure(api::config)
            .service(actix_files::Files::new("/media", media_root.clone()))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.workers)
    .shutdown_timeout(10);

    info!("✅ Backend démarré avec succès!");
    info!("🔗 API disponible sur http://{}:{}/api/v1", config.server_host, config.server_port);

    server.run().await?;
    Ok(())
}

/// Configure le tracing pour le logging structuré
fn setup_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_line_number(true)
                    .with_file(true),
            )
            .init();
    }
}

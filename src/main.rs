use std::sync::Arc;

use property_onboarding::api::{HttpResourceApi, ResourceApi};
use property_onboarding::config::OnboardingConfig;
use property_onboarding::draft::{DraftStore, FileSnapshotStore, SnapshotStore};
use property_onboarding::error::Result;
use property_onboarding::finalize::{Finalizer, finalize_routes};
use property_onboarding::wizard::{WizardRouteState, wizard_routes};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = OnboardingConfig::from_env()?;

    eprintln!("🏠 Property Onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Resource API: {}", config.api_base_url);
    eprintln!("   Drafts: {}", config.data_dir.display());
    eprintln!("   Draft API: http://0.0.0.0:{}/api/onboarding/draft", config.http_port);
    eprintln!("   Progress WS: ws://0.0.0.0:{}/ws/onboarding/progress", config.http_port);

    // ── Draft ────────────────────────────────────────────────────────────
    let snapshots: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::open(&config.data_dir)?);
    let draft = Arc::new(DraftStore::load(snapshots));

    // ── Finalization ─────────────────────────────────────────────────────
    let api: Arc<dyn ResourceApi> = Arc::new(HttpResourceApi::from_config(&config)?);
    let finalizer = Arc::new(Finalizer::new(
        api,
        Arc::clone(&draft),
        config.finalize.clone(),
    ));

    let app = wizard_routes(WizardRouteState::new(draft))
        .merge(finalize_routes(finalizer))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    tracing::info!(port = config.http_port, "Onboarding server started");
    axum::serve(listener, app).await?;

    Ok(())
}

use anyhow::Result;
use axum::Router;
use gridcheck::{api, config, state, telemetry};
use config::Config;
use state::AppState;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;

    let band = cfg.compliance.band();
    if band != gridcheck::domain::VoltageBand::VDE_AR_N_4110 {
        warn!(
            min_pu = band.min_pu,
            max_pu = band.max_pu,
            "voltage band overridden, verdicts deviate from VDE-AR-N 4110 defaults"
        );
    }

    let app_state = AppState::new(&cfg).await?;

    #[allow(unused_mut)]
    let mut app: Router = api::router(app_state, &cfg);

    #[cfg(feature = "metrics")]
    {
        app = api::with_metrics(app);
    }

    let addr = cfg.server.socket_addr()?;
    info!(%addr, "starting grid compliance service");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}

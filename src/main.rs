// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;

use attendance_ledger::{
    api::router,
    config::{AppConfig, LogFormat, DEFAULT_LOG_FILTER},
    service::AttendanceService,
    state::AppState,
};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    let addr: SocketAddr = config.bind_addr().parse()?;
    let service = AttendanceService::new(config)?;
    let state = AppState::new(service);
    let app = router(state.clone());

    tracing::info!(%addr, "Attendance ledger listening (docs at /docs)");

    let server = axum_server::bind(addr).serve(app.into_make_service());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    state.serve_until(server, shutdown).await?;
    Ok(())
}

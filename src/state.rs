// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::ApiError;
use crate::service::AttendanceService;

/// Shared handler state. The service is the single writer of the data
/// directory, so every request is serialized through one lock.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Mutex<AttendanceService>>,
}

impl AppState {
    pub fn new(service: AttendanceService) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
        }
    }

    /// Run `f` against the service on the blocking pool.
    ///
    /// Register access is synchronous file I/O and must stay off the
    /// async workers.
    pub async fn with_service<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut AttendanceService) -> T + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || {
            let mut guard = service.blocking_lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Service task failed");
            ApiError::internal("service task failed")
        })
    }

    /// Drive `server` until it stops or `shutdown` resolves, then remove the
    /// scratch files the service still tracks. A server error is returned
    /// only after cleanup has run.
    pub async fn serve_until<S, D>(&self, server: S, shutdown: D) -> io::Result<()>
    where
        S: Future<Output = io::Result<()>>,
        D: Future<Output = ()>,
    {
        let served = tokio::select! {
            result = server => result,
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
        };
        if let Err(e) = &served {
            tracing::error!(error = %e, "Server stopped");
        }

        let removed = self.service.lock().await.cleanup_scratch();
        tracing::info!(removed, "Scratch files cleaned up");
        served
    }
}

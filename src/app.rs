use crate::config::Config;
use crate::state::AppState;
use crate::utils::fmt_duration;
use crate::vtop::Portal;
use crate::web::create_router;
use anyhow::Context;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    portal: Arc<Portal>,
}

impl App {
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let portal = Portal::new(&config).context("Failed to create portal client")?;
        info!(
            login_page_url = %portal.login_page_url(),
            accept_invalid_certs = config.accept_invalid_certs,
            page_timeout = fmt_duration(config.page_timeout),
            submit_timeout = fmt_duration(config.submit_timeout),
            "portal client configured"
        );
        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for the portal");
        }

        Ok(App {
            config,
            portal: Arc::new(portal),
        })
    }

    pub fn portal(&self) -> &Portal {
        &self.portal
    }

    /// Serve the web API until a shutdown signal arrives.
    pub async fn serve(self, port: Option<u16>) -> Result<ExitCode, anyhow::Error> {
        let port = port.unwrap_or(self.config.port);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let router = create_router(AppState::new(self.portal.clone()));

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!(address = %addr, "web server listening");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tokio::select! {
            result = &mut server => {
                error!("web server stopped unexpectedly");
                result.context("Web server task panicked")?.context("Web server failed")?;
                return Ok(ExitCode::FAILURE);
            }
            _ = shutdown_signal() => {}
        }

        let timeout = self.config.shutdown_timeout;
        info!(timeout = fmt_duration(timeout), "shutdown signal received, draining requests");
        let _ = shutdown_tx.send(());

        match tokio::time::timeout(timeout, server).await {
            Ok(result) => {
                result.context("Web server task panicked")?.context("Web server failed")?;
                info!("web server shut down gracefully");
                Ok(ExitCode::SUCCESS)
            }
            Err(_) => {
                warn!(timeout = fmt_duration(timeout), "graceful shutdown timed out");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

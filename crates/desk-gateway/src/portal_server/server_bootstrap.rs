//! Portal server bootstrap and router wiring.

use super::*;

/// Multipart framing overhead allowed on top of `max_upload_bytes`.
const UPLOAD_BODY_SLACK_BYTES: usize = 64 * 1024;

/// Binds `config.bind` and serves the portal until ctrl-c.
pub async fn run_portal_server(config: PortalServerConfig) -> Result<()> {
    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("failed to create {}", config.upload_dir.display()))?;

    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --bind '{}'", config.bind))?;

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind portal server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound portal server address")?;

    let executor = config.command_executor();
    tracing::info!(
        addr = %local_addr,
        upload_dir = %config.upload_dir.display(),
        dry_run_commands = config.dry_run_commands,
        report_cache_ttl_secs = config.report_cache_ttl.as_secs(),
        "portal server listening"
    );

    let state = Arc::new(PortalServerState::new(config, executor)?);
    let app = build_portal_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("portal server exited unexpectedly")?;

    tracing::info!("portal server stopped");
    Ok(())
}

pub fn build_portal_router(state: Arc<PortalServerState>) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_add(UPLOAD_BODY_SLACK_BYTES);
    Router::new()
        .route(INDEX_ENDPOINT, get(handle_index))
        .route(HEALTH_ENDPOINT, get(handle_health))
        .route(LOGIN_ENDPOINT, post(handle_login))
        .route(LOGOUT_ENDPOINT, get(handle_logout).post(handle_logout))
        .route(DASHBOARD_ENDPOINT, get(handle_dashboard))
        .route(FILES_ENDPOINT, get(handle_files_list))
        .route(UPLOAD_ENDPOINT, post(handle_file_upload))
        .route(ANALYTICS_ENDPOINT, get(handle_reports_list))
        .route(ANALYTICS_CREATE_ENDPOINT, post(handle_report_create))
        .route(ANALYTICS_DETAIL_ENDPOINT, get(handle_report_view))
        .route(ADMIN_ENDPOINT, get(handle_admin_overview))
        .route(ADMIN_USERS_ENDPOINT, get(handle_admin_users))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

use super::*;
use auth_runtime::session_id_from_headers;

pub(super) async fn handle_index(
    State(state): State<Arc<PortalServerState>>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    let user = if session_id_from_headers(&headers).is_some() {
        authenticate_portal_request(&state, &headers).await.ok()
    } else {
        None
    };
    Json(json!({
        "title": PORTAL_TITLE,
        "user": user,
    }))
}

pub(super) async fn handle_dashboard(
    State(state): State<Arc<PortalServerState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, PortalApiError> {
    let user = authenticate_portal_request(&state, &headers).await?;
    let stats = json!({
        "total_users": state.users.len(),
        "total_files": state.files.count().await,
        "total_reports": state.reports.report_count().await,
        "user_files": state.files.count_owned_by(user.id).await,
    });
    Ok(Json(json!({
        "title": "Dashboard",
        "user": user,
        "stats": stats,
    })))
}

/// Admin landing page data: the caller plus every account.
pub(super) async fn handle_admin_overview(
    State(state): State<Arc<PortalServerState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, PortalApiError> {
    let user = authenticate_portal_request(&state, &headers).await?;
    require_admin(&user)?;
    Ok(Json(json!({
        "title": "System Administration",
        "user": user,
        "users": state.users.all(),
    })))
}

pub(super) async fn handle_admin_users(
    State(state): State<Arc<PortalServerState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, PortalApiError> {
    let user = authenticate_portal_request(&state, &headers).await?;
    require_admin(&user)?;
    Ok(Json(json!({
        "title": "User Management",
        "users": state.users.all(),
    })))
}

pub(super) async fn handle_health(State(state): State<Arc<PortalServerState>>) -> Response {
    let (status, cache_status) = match state.cache.ping().await {
        Ok(()) => (StatusCode::OK, "connected".to_string()),
        Err(error) => {
            tracing::warn!(%error, "cache health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, format!("error: {error}"))
        }
    };
    (
        status,
        Json(json!({
            "status": if status.is_success() { "healthy" } else { "degraded" },
            "cache": {
                "backend": state.cache.backend_name(),
                "status": cache_status,
            },
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

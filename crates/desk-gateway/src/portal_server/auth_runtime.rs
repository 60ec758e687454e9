//! Cookie sessions backed by the TTL cache.
use super::*;
use user_directory::sha256_hex;

#[derive(Debug, Deserialize)]
pub(super) struct LoginForm {
    username: String,
    password: String,
}

pub(super) fn session_cache_key(session_id: &str) -> String {
    format!("{SESSION_CACHE_KEY_PREFIX}{session_id}")
}

pub(super) fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn issue_session_id(state: &PortalServerState, username: &str) -> String {
    let seed = format!(
        "{username}:{}:{}",
        current_unix_timestamp_ms(),
        state.next_session_nonce()
    );
    sha256_hex(seed.as_bytes())
}

/// Resolves the session cookie to a user; any miss is `401`.
pub(super) async fn authenticate_portal_request(
    state: &PortalServerState,
    headers: &HeaderMap,
) -> Result<PortalUser, PortalApiError> {
    let session_id = session_id_from_headers(headers).ok_or_else(PortalApiError::unauthorized)?;
    let username = match state.cache.get(&session_cache_key(&session_id)).await {
        Ok(Some(username)) => username,
        Ok(None) => return Err(PortalApiError::unauthorized()),
        Err(error) => {
            tracing::warn!(%error, "session lookup failed");
            return Err(PortalApiError::unauthorized());
        }
    };
    state
        .users
        .find_by_username(&username)
        .cloned()
        .ok_or_else(PortalApiError::unauthorized)
}

pub(super) fn require_admin(user: &PortalUser) -> Result<(), PortalApiError> {
    if user.is_admin() {
        return Ok(());
    }
    Err(PortalApiError::forbidden(
        "admin_required",
        "administrator role required",
    ))
}

pub(super) async fn handle_login(
    State(state): State<Arc<PortalServerState>>,
    Form(form): Form<LoginForm>,
) -> Response {
    let Some(user) = state
        .users
        .verify_credentials(&form.username, &form.password)
        .cloned()
    else {
        tracing::warn!(username = %form.username, "portal login rejected");
        return PortalApiError::new(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid username or password",
        )
        .into_response();
    };

    let session_id = issue_session_id(&state, &user.username);
    if let Err(error) = state
        .cache
        .set(
            &session_cache_key(&session_id),
            user.username.clone(),
            state.config.session_ttl,
        )
        .await
    {
        return PortalApiError::internal(format!("failed to persist session: {error}"))
            .into_response();
    }

    let cookie = format!(
        "{SESSION_COOKIE_NAME}={session_id}; Path=/; Max-Age={}; HttpOnly",
        state.config.session_ttl.as_secs()
    );
    let cookie = match HeaderValue::from_str(&cookie) {
        Ok(cookie) => cookie,
        Err(error) => {
            return PortalApiError::internal(format!("invalid session cookie: {error}"))
                .into_response();
        }
    };

    tracing::info!(user_id = user.id, username = %user.username, "portal login");
    (
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(json!({
            "message": "login succeeded",
            "user": user,
        })),
    )
        .into_response()
}

pub(super) async fn handle_logout(
    State(state): State<Arc<PortalServerState>>,
    headers: HeaderMap,
) -> Response {
    if let Some(session_id) = session_id_from_headers(&headers) {
        if let Err(error) = state.cache.delete(&session_cache_key(&session_id)).await {
            tracing::warn!(%error, "failed to drop portal session");
        }
    }
    (
        StatusCode::OK,
        [(
            SET_COOKIE,
            HeaderValue::from_static("session_id=; Path=/; Max-Age=0; HttpOnly"),
        )],
        Json(json!({ "message": "logged out" })),
    )
        .into_response()
}

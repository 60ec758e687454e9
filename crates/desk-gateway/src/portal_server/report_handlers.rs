use super::*;
use desk_payload::DecodeOutcome;

#[derive(Debug, Deserialize)]
pub(super) struct ReportCreateForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    data: String,
}

fn decode_summary(outcome: &DecodeOutcome) -> serde_json::Value {
    json!({
        "stage": outcome.stage,
        "decoded_kind": outcome.state.as_ref().map(|state| state.kind()),
        "decoded": outcome
            .state
            .as_ref()
            .and_then(|state| state.as_dynamic())
            .map(|value| value.to_json()),
        "dispatched_commands": outcome.dispatch_log.commands,
        "failed_commands": outcome.dispatch_log.failed,
    })
}

fn parse_report_id(raw: &str) -> Result<u64, PortalApiError> {
    raw.trim().parse::<u64>().map_err(|_| {
        PortalApiError::bad_request("invalid_report_id", format!("'{raw}' is not a report id"))
    })
}

pub(super) async fn handle_reports_list(
    State(state): State<Arc<PortalServerState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, PortalApiError> {
    let user = authenticate_portal_request(&state, &headers).await?;
    let reports: Vec<Report> = state
        .reports
        .list(OwnerFilter::for_principal(&user.principal()))
        .await;
    Ok(Json(json!({
        "title": "Analytics",
        "user": user,
        "reports": reports,
    })))
}

pub(super) async fn handle_report_create(
    State(state): State<Arc<PortalServerState>>,
    headers: HeaderMap,
    Form(form): Form<ReportCreateForm>,
) -> Result<Json<serde_json::Value>, PortalApiError> {
    let user = authenticate_portal_request(&state, &headers).await?;
    let report_id = state
        .reports
        .create_from_text(user.id, &form.title, &form.description, &form.data)
        .await?;
    Ok(Json(json!({
        "message": "report created",
        "id": report_id,
    })))
}

/// Loads the report and decodes its live cache entry.
pub(super) async fn handle_report_view(
    State(state): State<Arc<PortalServerState>>,
    headers: HeaderMap,
    UrlPath(raw_id): UrlPath<String>,
) -> Result<Json<serde_json::Value>, PortalApiError> {
    let user = authenticate_portal_request(&state, &headers).await?;
    let report_id = parse_report_id(&raw_id)?;
    let view = state.reports.view_as(&user.principal(), report_id).await?;
    Ok(Json(json!({
        "report": view.report,
        "payload": view.decode.as_ref().map(decode_summary),
    })))
}

//! Report records and the cache-backed payload round trip.
//!
//! `create` stores a record and, when the report carries data, writes the
//! encoded payload to the TTL cache under `report:<id>`. `view` re-reads that
//! cache entry by recomputed key and drives it through the payload codec.
//!
//! The record keeps its own copy of the encoded payload (`encoded_payload`), but
//! `view` never consults it: the cache entry is the decode input. If the entry is
//! overwritten or expires independently, the decoded content no longer matches
//! the record. This divergence is kept on purpose and covered by tests.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use desk_cache::TtlCache;
use desk_core::{SharedClock, SystemClock};
use desk_payload::{DecodeOutcome, DynamicValue, EncodeError, PayloadCodec, PayloadFormat};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Prefix of report payload cache keys.
pub const REPORT_CACHE_KEY_PREFIX: &str = "report:";
/// Lifetime of a report payload cache entry.
pub const DEFAULT_REPORT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Result type for report store operations.
pub type StoreResult<T> = Result<T, ReportStoreError>;

/// Client-facing report errors. Decode and dispatch failures never appear here.
#[derive(Debug, Error)]
pub enum ReportStoreError {
    #[error("report {field} cannot be empty")]
    Validation { field: &'static str },
    #[error("report data is not a JSON object: {0}")]
    Format(String),
    #[error("report data cannot be stored: {0}")]
    Encode(#[from] EncodeError),
    #[error("report {0} not found")]
    NotFound(u64),
    #[error("user {user_id} may not access report {report_id}")]
    Permission { user_id: u64, report_id: u64 },
}

/// Cache key for a report's payload.
pub fn report_cache_key(report_id: u64) -> String {
    format!("{REPORT_CACHE_KEY_PREFIX}{report_id}")
}

/// Parses the create form's `data` field. Empty text and JSON `null` mean no
/// payload; anything other than a JSON object is a format error.
pub fn parse_report_data(raw: &str) -> StoreResult<Option<DynamicValue>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let value = DynamicValue::from_json_text(raw)
        .map_err(|error| ReportStoreError::Format(error.to_string()))?;
    match value {
        DynamicValue::Null => Ok(None),
        DynamicValue::Map(_) => Ok(Some(value)),
        other => Err(ReportStoreError::Format(format!(
            "expected an object, found {}",
            other.kind()
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub owner_id: u64,
    pub created_at: DateTime<Utc>,
    pub data: Option<DynamicValue>,
    /// Transport-encoded payload written alongside the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_format: Option<PayloadFormat>,
}

/// Identity used for report access checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: u64,
    pub is_admin: bool,
}

impl Principal {
    pub fn can_access(&self, report: &Report) -> bool {
        self.is_admin || report.owner_id == self.user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerFilter {
    All,
    Owner(u64),
}

impl OwnerFilter {
    /// Everything for admins, own reports otherwise.
    pub fn for_principal(principal: &Principal) -> Self {
        if principal.is_admin {
            Self::All
        } else {
            Self::Owner(principal.user_id)
        }
    }

    fn matches(&self, report: &Report) -> bool {
        match self {
            Self::All => true,
            Self::Owner(owner_id) => report.owner_id == *owner_id,
        }
    }
}

/// Report plus whatever the view-time decode produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportView {
    pub report: Report,
    /// `None` when no live cache entry existed.
    pub decode: Option<DecodeOutcome>,
}

#[derive(Debug)]
struct ReportStoreInner {
    reports: BTreeMap<u64, Report>,
    next_id: u64,
}

impl Default for ReportStoreInner {
    fn default() -> Self {
        Self {
            reports: BTreeMap::new(),
            next_id: 1,
        }
    }
}

/// Owns report records and the side-channel payload cache.
pub struct ReportStore {
    inner: RwLock<ReportStoreInner>,
    cache: Arc<dyn TtlCache>,
    codec: PayloadCodec,
    cache_ttl: Duration,
    clock: SharedClock,
}

impl ReportStore {
    pub fn new(cache: Arc<dyn TtlCache>, codec: PayloadCodec) -> Self {
        Self {
            inner: RwLock::new(ReportStoreInner::default()),
            cache,
            codec,
            cache_ttl: DEFAULT_REPORT_CACHE_TTL,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &Arc<dyn TtlCache> {
        &self.cache
    }

    pub fn codec(&self) -> &PayloadCodec {
        &self.codec
    }

    /// Validates form input, parses `data_text`, then creates the report.
    pub async fn create_from_text(
        &self,
        owner_id: u64,
        title: &str,
        description: &str,
        data_text: &str,
    ) -> StoreResult<u64> {
        validate_required(title, description)?;
        let data = parse_report_data(data_text)?;
        self.create(owner_id, title, description, data).await
    }

    /// Assigns the next id, writes the payload cache entry when `data` is
    /// present, and stores the record. Data that cannot be encoded fails the
    /// whole call: no id is consumed and nothing is stored.
    pub async fn create(
        &self,
        owner_id: u64,
        title: &str,
        description: &str,
        data: Option<DynamicValue>,
    ) -> StoreResult<u64> {
        validate_required(title, description)?;

        let encoded = self.codec.encode(data.as_ref()).inspect_err(|error| {
            tracing::warn!(owner_id, %error, "report payload encoding failed; report rejected");
        })?;

        let mut inner = self.inner.write().await;
        let report_id = inner.next_id;

        let (encoded_payload, payload_format) = match encoded {
            Some(payload) => {
                let blob = BASE64.encode(&payload.bytes);
                let key = report_cache_key(report_id);
                if let Err(error) = self.cache.set(&key, blob.clone(), self.cache_ttl).await {
                    tracing::warn!(report_id, %error, "failed to write report payload cache entry");
                }
                (Some(blob), Some(payload.format))
            }
            None => (None, None),
        };

        let report = Report {
            id: report_id,
            title: title.to_string(),
            description: description.to_string(),
            owner_id,
            created_at: self.now(),
            data,
            encoded_payload,
            payload_format,
        };
        tracing::info!(
            report_id,
            owner_id,
            payload_format = ?report.payload_format,
            "report created"
        );
        inner.reports.insert(report_id, report);
        inner.next_id = report_id.saturating_add(1);
        Ok(report_id)
    }

    pub async fn get(&self, report_id: u64) -> Option<Report> {
        self.inner.read().await.reports.get(&report_id).cloned()
    }

    /// Reports matching `filter`, ordered by id.
    pub async fn list(&self, filter: OwnerFilter) -> Vec<Report> {
        self.inner
            .read()
            .await
            .reports
            .values()
            .filter(|report| filter.matches(report))
            .cloned()
            .collect()
    }

    pub async fn report_count(&self) -> usize {
        self.inner.read().await.reports.len()
    }

    /// Loads the report and decodes its current cache entry, if any.
    pub async fn view(&self, report_id: u64) -> StoreResult<ReportView> {
        let report = self.load(report_id).await?;
        Ok(self.decode_view(report).await)
    }

    /// `view` behind the owner-or-admin check.
    pub async fn view_as(&self, principal: &Principal, report_id: u64) -> StoreResult<ReportView> {
        let report = self.load(report_id).await?;
        if !principal.can_access(&report) {
            return Err(ReportStoreError::Permission {
                user_id: principal.user_id,
                report_id,
            });
        }
        Ok(self.decode_view(report).await)
    }

    async fn load(&self, report_id: u64) -> StoreResult<Report> {
        self.get(report_id)
            .await
            .ok_or(ReportStoreError::NotFound(report_id))
    }

    async fn decode_view(&self, report: Report) -> ReportView {
        let decode = self.decode_cached_payload(report.id).await;
        ReportView { report, decode }
    }

    async fn decode_cached_payload(&self, report_id: u64) -> Option<DecodeOutcome> {
        let key = report_cache_key(report_id);
        let blob = match self.cache.get(&key).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                tracing::debug!(report_id, "no live payload cache entry");
                return None;
            }
            Err(error) => {
                tracing::warn!(report_id, %error, "payload cache read failed");
                return None;
            }
        };
        let bytes = match BASE64.decode(blob.as_bytes()) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(report_id, %error, "payload cache entry is not valid base64");
                return None;
            }
        };
        let outcome = self.codec.decode(&bytes).await;
        tracing::info!(
            report_id,
            stage = ?outcome.stage,
            dispatched = outcome.dispatch_log.len(),
            "report payload decoded"
        );
        Some(outcome)
    }

    fn now(&self) -> DateTime<Utc> {
        i64::try_from(self.clock.now_unix_ms())
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now)
    }
}

fn validate_required(title: &str, description: &str) -> StoreResult<()> {
    if title.is_empty() {
        return Err(ReportStoreError::Validation { field: "title" });
    }
    if description.is_empty() {
        return Err(ReportStoreError::Validation {
            field: "description",
        });
    }
    Ok(())
}

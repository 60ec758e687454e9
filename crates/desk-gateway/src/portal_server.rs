use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{DateTime, Utc};
use desk_cache::{InMemoryTtlCache, TtlCache};
use desk_core::current_unix_timestamp_ms;
use desk_payload::{
    CommandDispatcher, CommandExecutor, DryRunCommandExecutor, PayloadCodec,
    ShellCommandExecutor, TypeRegistry,
};
use desk_report_store::{OwnerFilter, Principal, Report, ReportStore, ReportStoreError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

mod auth_runtime;
mod dashboard_handlers;
mod file_handlers;
mod report_handlers;
mod server_bootstrap;
mod types;
mod user_directory;

use auth_runtime::{authenticate_portal_request, handle_login, handle_logout, require_admin};
use dashboard_handlers::{
    handle_admin_overview, handle_admin_users, handle_dashboard, handle_health, handle_index,
};
use file_handlers::{handle_files_list, handle_file_upload, FileDirectory};
use report_handlers::{handle_report_create, handle_report_view, handle_reports_list};
use types::PortalApiError;
use user_directory::{PortalUser, UserDirectory};

pub use server_bootstrap::{build_portal_router, run_portal_server};

const INDEX_ENDPOINT: &str = "/";
const HEALTH_ENDPOINT: &str = "/health";
const LOGIN_ENDPOINT: &str = "/login";
const LOGOUT_ENDPOINT: &str = "/logout";
const DASHBOARD_ENDPOINT: &str = "/dashboard";
const FILES_ENDPOINT: &str = "/files";
const UPLOAD_ENDPOINT: &str = "/upload";
const ANALYTICS_ENDPOINT: &str = "/analytics";
const ANALYTICS_CREATE_ENDPOINT: &str = "/analytics/create";
const ANALYTICS_DETAIL_ENDPOINT: &str = "/analytics/{id}";
const ADMIN_ENDPOINT: &str = "/admin";
const ADMIN_USERS_ENDPOINT: &str = "/admin/users";

const PORTAL_TITLE: &str = "Office Portal";
const SESSION_COOKIE_NAME: &str = "session_id";
const SESSION_CACHE_KEY_PREFIX: &str = "session:";

/// Runtime settings for the portal server.
#[derive(Debug, Clone)]
pub struct PortalServerConfig {
    pub bind: String,
    pub upload_dir: PathBuf,
    pub report_cache_ttl: Duration,
    pub session_ttl: Duration,
    pub max_upload_bytes: usize,
    /// Log template commands instead of executing them.
    pub dry_run_commands: bool,
}

impl Default for PortalServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            upload_dir: PathBuf::from("uploads"),
            report_cache_ttl: desk_report_store::DEFAULT_REPORT_CACHE_TTL,
            session_ttl: Duration::from_secs(60 * 60),
            max_upload_bytes: 10 * 1024 * 1024,
            dry_run_commands: false,
        }
    }
}

impl PortalServerConfig {
    /// Command executor selected by this configuration.
    pub fn command_executor(&self) -> Arc<dyn CommandExecutor> {
        if self.dry_run_commands {
            Arc::new(DryRunCommandExecutor)
        } else {
            Arc::new(ShellCommandExecutor::default())
        }
    }
}

/// Shared state behind every portal handler.
pub struct PortalServerState {
    config: PortalServerConfig,
    users: UserDirectory,
    files: FileDirectory,
    reports: Arc<ReportStore>,
    cache: Arc<dyn TtlCache>,
    session_counter: AtomicU64,
}

impl PortalServerState {
    /// Builds the type registry, codec, cache and stores for `config`.
    pub fn new(config: PortalServerConfig, executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        let registry =
            Arc::new(TypeRegistry::builtin().context("failed to register builtin payload types")?);
        let codec = PayloadCodec::new(registry, CommandDispatcher::new(executor));
        let cache: Arc<dyn TtlCache> = Arc::new(InMemoryTtlCache::new());
        let reports = Arc::new(
            ReportStore::new(cache.clone(), codec).with_cache_ttl(config.report_cache_ttl),
        );
        Ok(Self::from_parts(config, cache, reports))
    }

    /// Assembles state from an existing cache and report store.
    pub fn from_parts(
        config: PortalServerConfig,
        cache: Arc<dyn TtlCache>,
        reports: Arc<ReportStore>,
    ) -> Self {
        Self {
            config,
            users: UserDirectory::seeded(),
            files: FileDirectory::default(),
            reports,
            cache,
            session_counter: AtomicU64::new(0),
        }
    }

    pub fn reports(&self) -> &Arc<ReportStore> {
        &self.reports
    }

    fn next_session_nonce(&self) -> u64 {
        self.session_counter.fetch_add(1, Ordering::Relaxed)
    }
}

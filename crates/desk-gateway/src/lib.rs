//! HTTP surface of the office portal.
//!
//! Login sessions, dashboard, file uploads and the analytics report endpoints
//! whose view path drives the payload decode pipeline.

pub mod portal_server;

pub use portal_server::{
    build_portal_router, run_portal_server, PortalServerConfig, PortalServerState,
};

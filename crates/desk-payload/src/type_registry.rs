//! Type tag → decode hook registry.
//!
//! Built once at startup through [`TypeRegistryBuilder`], then frozen and shared
//! behind an `Arc`; lookups take no lock.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::dynamic_value::DynamicValue;
use crate::primary_wire;

/// Tag of the report data record decoded at view time.
pub const REPORT_DATA_TAG: &str = "report.data";
/// Tag of the portal system configuration record.
pub const SYSTEM_CONFIG_TAG: &str = "system.config";

/// Failure inside one decode stage. Never surfaced past the codec.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no decode hook registered for type tag '{0}'")]
    UnknownTag(String),
    #[error("primary payload is malformed: {0}")]
    Primary(#[from] bincode::Error),
    #[error("secondary payload is malformed: {0}")]
    Secondary(#[from] serde_json::Error),
    #[error("decoded {found} where {expected} was expected")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
}

/// Registry construction errors; these abort startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeRegistryError {
    #[error("type tag cannot be empty")]
    EmptyTag,
    #[error("type tag '{0}' is already registered")]
    DuplicateTag(String),
}

/// Portal settings record, carried in the primary format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub cache_timeout_seconds: u64,
    pub max_file_size_bytes: u64,
    pub debug: bool,
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            cache_timeout_seconds: 24 * 60 * 60,
            max_file_size_bytes: 10 * 1024 * 1024,
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

/// Typed state produced by a successful decode.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    /// Primary decode of a report's data map.
    ReportData(DynamicValue),
    SystemConfig(SystemConfig),
    /// Secondary decode result; no type information.
    Untyped(DynamicValue),
}

impl DecodedPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReportData(_) => "report_data",
            Self::SystemConfig(_) => "system_config",
            Self::Untyped(_) => "untyped",
        }
    }

    /// Returns the dynamic value carried by data-shaped variants.
    pub fn as_dynamic(&self) -> Option<&DynamicValue> {
        match self {
            Self::ReportData(value) | Self::Untyped(value) => Some(value),
            Self::SystemConfig(_) => None,
        }
    }
}

/// Decode hook bound to a type tag.
pub type DecodeHook = Arc<dyn Fn(&[u8]) -> Result<DecodedPayload, DecodeError> + Send + Sync>;

/// Collects hooks before the registry is frozen.
#[derive(Default)]
pub struct TypeRegistryBuilder {
    hooks: HashMap<String, DecodeHook>,
}

impl TypeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `tag` to `hook`. A tag may be bound only once.
    pub fn register<F>(mut self, tag: &str, hook: F) -> Result<Self, TypeRegistryError>
    where
        F: Fn(&[u8]) -> Result<DecodedPayload, DecodeError> + Send + Sync + 'static,
    {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(TypeRegistryError::EmptyTag);
        }
        if self.hooks.contains_key(tag) {
            return Err(TypeRegistryError::DuplicateTag(tag.to_string()));
        }
        self.hooks.insert(tag.to_string(), Arc::new(hook));
        Ok(self)
    }

    /// Registers the portal's builtin record types.
    pub fn with_builtin_types(self) -> Result<Self, TypeRegistryError> {
        self.register(REPORT_DATA_TAG, decode_report_data)?
            .register(SYSTEM_CONFIG_TAG, decode_system_config)
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry { hooks: self.hooks }
    }
}

/// Frozen tag → hook mapping.
pub struct TypeRegistry {
    hooks: HashMap<String, DecodeHook>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::new()
    }

    /// Registry holding only the builtin record types.
    pub fn builtin() -> Result<Self, TypeRegistryError> {
        Ok(TypeRegistryBuilder::new().with_builtin_types()?.build())
    }

    pub fn lookup(&self, tag: &str) -> Option<&DecodeHook> {
        self.hooks.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.hooks.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

fn decode_report_data(bytes: &[u8]) -> Result<DecodedPayload, DecodeError> {
    let value = primary_wire::decode_dynamic(bytes)?;
    if value.as_map().is_none() {
        return Err(DecodeError::UnexpectedShape {
            expected: "map",
            found: value.kind(),
        });
    }
    Ok(DecodedPayload::ReportData(value))
}

fn decode_system_config(bytes: &[u8]) -> Result<DecodedPayload, DecodeError> {
    let config = primary_wire::decode_typed::<SystemConfig>(bytes)?;
    Ok(DecodedPayload::SystemConfig(config))
}

#[cfg(test)]
mod tests {
    use super::{
        DecodeError, DecodedPayload, SystemConfig, TypeRegistry, TypeRegistryBuilder,
        TypeRegistryError, REPORT_DATA_TAG, SYSTEM_CONFIG_TAG,
    };
    use crate::primary_wire::{encode_dynamic, encode_typed};
    use crate::DynamicValue;
    use serde_json::json;

    #[test]
    fn unit_builtin_registry_exposes_sorted_tags() {
        let registry = TypeRegistry::builtin().expect("builtin registry");
        assert_eq!(registry.tags(), vec![REPORT_DATA_TAG, SYSTEM_CONFIG_TAG]);
        assert!(registry.contains(REPORT_DATA_TAG));
        assert!(registry.lookup("missing.tag").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn regression_duplicate_tag_fails_fast() {
        let error = TypeRegistryBuilder::new()
            .with_builtin_types()
            .expect("builtin")
            .register(REPORT_DATA_TAG, |_| {
                Ok(DecodedPayload::Untyped(DynamicValue::Null))
            })
            .err()
            .expect("duplicate must fail");
        assert_eq!(
            error,
            TypeRegistryError::DuplicateTag(REPORT_DATA_TAG.to_string())
        );
    }

    #[test]
    fn regression_empty_tag_is_rejected() {
        let error = TypeRegistryBuilder::new()
            .register("  ", |_| Ok(DecodedPayload::Untyped(DynamicValue::Null)))
            .err()
            .expect("empty tag must fail");
        assert_eq!(error, TypeRegistryError::EmptyTag);
    }

    #[test]
    fn functional_report_data_hook_requires_map() {
        let registry = TypeRegistry::builtin().expect("builtin registry");
        let hook = registry.lookup(REPORT_DATA_TAG).expect("hook");

        let map = DynamicValue::from(json!({"revenue": 1000}));
        let decoded = hook(&encode_dynamic(&map).expect("encode map")).expect("decode map");
        assert_eq!(decoded, DecodedPayload::ReportData(map));

        let list = DynamicValue::from(json!([1, 2]));
        let error = hook(&encode_dynamic(&list).expect("encode list")).expect_err("list");
        assert!(matches!(
            error,
            DecodeError::UnexpectedShape {
                expected: "map",
                found: "list"
            }
        ));
    }

    #[test]
    fn functional_system_config_hook_decodes_typed_record() {
        let registry = TypeRegistry::builtin().expect("builtin registry");
        let hook = registry.lookup(SYSTEM_CONFIG_TAG).expect("hook");
        let config = SystemConfig {
            debug: true,
            log_level: "debug".to_string(),
            ..SystemConfig::default()
        };
        let decoded = hook(&encode_typed(&config).expect("encode")).expect("decode");
        assert_eq!(decoded, DecodedPayload::SystemConfig(config));
        assert_eq!(decoded.kind(), "system_config");
        assert!(decoded.as_dynamic().is_none());
    }
}

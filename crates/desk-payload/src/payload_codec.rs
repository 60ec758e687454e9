//! Report payload encoding and the fallback decode chain.
//!
//! Decode walks `primary → secondary → template dispatch`, each stage tried only
//! when the previous one failed. No stage error reaches the caller: failures are
//! logged and recorded on the [`DecodeOutcome`].

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::command_dispatcher::{CommandDispatcher, DispatchLog};
use crate::dynamic_value::{DynamicValue, MAX_NESTING_DEPTH};
use crate::primary_wire;
use crate::type_registry::{DecodeError, DecodedPayload, TypeRegistry, REPORT_DATA_TAG};

/// Top-level key that routes a payload to the secondary format.
pub const TEMPLATE_KEY: &str = "template";
/// Key inside the template map holding the command list.
pub const TEMPLATE_COMMANDS_KEY: &str = "commands";

/// Wire format chosen by `encode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    Primary,
    Secondary,
}

/// Raw encoded payload; transport encoding is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub format: PayloadFormat,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to encode primary payload: {0}")]
    Primary(#[from] bincode::Error),
    #[error("failed to encode secondary payload: {0}")]
    Secondary(#[from] serde_json::Error),
    #[error("payload nests {depth} levels, limit is {max}")]
    TooDeep { depth: usize, max: usize },
}

/// Terminal state reached by `decode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStage {
    PrimaryDecoded,
    SecondaryDecoded,
    TemplateDispatched,
    #[default]
    Exhausted,
}

/// Result of one decode run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeOutcome {
    pub stage: DecodeStage,
    pub state: Option<DecodedPayload>,
    pub dispatch_log: DispatchLog,
    pub primary_error: Option<String>,
    pub secondary_error: Option<String>,
}

impl DecodeOutcome {
    pub fn dispatched(&self) -> bool {
        self.stage == DecodeStage::TemplateDispatched
    }

    /// True when decoding produced neither state nor side effects.
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.dispatch_log.is_empty()
    }
}

/// Encodes report data and decodes cached payloads back into typed state.
#[derive(Clone)]
pub struct PayloadCodec {
    registry: Arc<TypeRegistry>,
    target_tag: String,
    dispatcher: CommandDispatcher,
}

impl PayloadCodec {
    /// Codec targeting the report data record.
    pub fn new(registry: Arc<TypeRegistry>, dispatcher: CommandDispatcher) -> Self {
        Self {
            registry,
            target_tag: REPORT_DATA_TAG.to_string(),
            dispatcher,
        }
    }

    pub fn with_target_tag(mut self, tag: impl Into<String>) -> Self {
        self.target_tag = tag.into();
        self
    }

    pub fn target_tag(&self) -> &str {
        &self.target_tag
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Encodes `data`; maps carrying a `template` key use the secondary format
    /// verbatim, everything else the primary format.
    pub fn encode(&self, data: Option<&DynamicValue>) -> Result<Option<EncodedPayload>, EncodeError> {
        let Some(data) = data else {
            return Ok(None);
        };

        let depth = data.depth();
        if depth > MAX_NESTING_DEPTH {
            return Err(EncodeError::TooDeep {
                depth,
                max: MAX_NESTING_DEPTH,
            });
        }

        if data.contains_key(TEMPLATE_KEY) {
            let bytes = serde_json::to_vec(data)?;
            return Ok(Some(EncodedPayload {
                format: PayloadFormat::Secondary,
                bytes,
            }));
        }

        let bytes = primary_wire::encode_dynamic(data)?;
        Ok(Some(EncodedPayload {
            format: PayloadFormat::Primary,
            bytes,
        }))
    }

    /// Runs the fallback chain over `bytes`. Always reaches a terminal stage.
    pub async fn decode(&self, bytes: &[u8]) -> DecodeOutcome {
        let mut outcome = DecodeOutcome::default();

        match self.decode_primary(bytes) {
            Ok(state) => {
                outcome.stage = DecodeStage::PrimaryDecoded;
                outcome.state = Some(state);
                return outcome;
            }
            Err(error) => {
                tracing::debug!(
                    target_tag = %self.target_tag,
                    %error,
                    "primary payload decode failed; trying secondary format"
                );
                outcome.primary_error = Some(error.to_string());
            }
        }

        let document = match decode_secondary(bytes) {
            Ok(document) => document,
            Err(error) => {
                tracing::warn!(%error, bytes = bytes.len(), "payload decode exhausted");
                outcome.secondary_error = Some(error.to_string());
                return outcome;
            }
        };

        if let Some(commands) = template_commands(&document) {
            tracing::info!(commands = commands.len(), "payload template dispatch");
            outcome.dispatch_log = self.dispatcher.dispatch(&commands).await;
            outcome.stage = DecodeStage::TemplateDispatched;
        } else {
            outcome.stage = DecodeStage::SecondaryDecoded;
        }
        outcome.state = Some(DecodedPayload::Untyped(document));
        outcome
    }

    fn decode_primary(&self, bytes: &[u8]) -> Result<DecodedPayload, DecodeError> {
        let hook = self
            .registry
            .lookup(&self.target_tag)
            .ok_or_else(|| DecodeError::UnknownTag(self.target_tag.clone()))?;
        hook(bytes)
    }
}

fn decode_secondary(bytes: &[u8]) -> Result<DynamicValue, DecodeError> {
    let document: DynamicValue = serde_json::from_slice(bytes)?;
    if document.as_map().is_none() {
        return Err(DecodeError::UnexpectedShape {
            expected: "map",
            found: document.kind(),
        });
    }
    Ok(document)
}

/// Extracts `template.commands` string entries in order. Non-string entries are
/// skipped; any other shape yields `None`.
pub fn template_commands(document: &DynamicValue) -> Option<Vec<String>> {
    let commands = document
        .get(TEMPLATE_KEY)?
        .get(TEMPLATE_COMMANDS_KEY)?
        .as_list()?;
    Some(
        commands
            .iter()
            .filter_map(DynamicValue::as_str)
            .map(str::to_string)
            .collect(),
    )
}

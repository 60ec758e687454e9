//! Report payload model and the polymorphic decode pipeline.
//!
//! `DynamicValue` models untyped report data, `TypeRegistry` maps type tags to
//! decode hooks, `PayloadCodec` encodes data and walks the primary → secondary →
//! template fallback chain, and `CommandDispatcher` hands template commands to an
//! injected `CommandExecutor`.

pub mod command_dispatcher;
pub mod dynamic_value;
pub mod payload_codec;
pub mod primary_wire;
pub mod type_registry;

pub use command_dispatcher::{
    CommandDispatcher, CommandExecutionError, CommandExecutor, CommandExit, DispatchLog,
    DryRunCommandExecutor, RecordingCommandExecutor, ShellCommandExecutor,
};
pub use dynamic_value::{DynamicNumber, DynamicValue, MAX_NESTING_DEPTH};
pub use payload_codec::{
    template_commands, DecodeOutcome, DecodeStage, EncodeError, EncodedPayload, PayloadCodec,
    PayloadFormat, TEMPLATE_COMMANDS_KEY, TEMPLATE_KEY,
};
pub use type_registry::{
    DecodeError, DecodeHook, DecodedPayload, SystemConfig, TypeRegistry, TypeRegistryBuilder,
    TypeRegistryError, REPORT_DATA_TAG, SYSTEM_CONFIG_TAG,
};

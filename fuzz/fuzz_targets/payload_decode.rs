#![no_main]

use std::sync::Arc;

use desk_payload::{
    template_commands, CommandDispatcher, DecodeStage, PayloadCodec, RecordingCommandExecutor,
    TypeRegistry,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(registry) = TypeRegistry::builtin() else {
        return;
    };
    let executor = Arc::new(RecordingCommandExecutor::new());
    let codec = PayloadCodec::new(
        Arc::new(registry),
        CommandDispatcher::new(executor.clone()),
    );
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread().build() else {
        return;
    };

    let outcome = runtime.block_on(codec.decode(data));
    match outcome.stage {
        DecodeStage::PrimaryDecoded => assert!(executor.invocations().is_empty()),
        DecodeStage::SecondaryDecoded | DecodeStage::TemplateDispatched => {
            let document = outcome.state.as_ref().and_then(|state| state.as_dynamic());
            let commands = document.and_then(template_commands);
            assert_eq!(outcome.dispatched(), commands.is_some());
            assert_eq!(executor.invocations(), commands.unwrap_or_default());
        }
        DecodeStage::Exhausted => {
            assert!(outcome.is_empty());
            assert!(executor.invocations().is_empty());
        }
    }
});

//! `_triggerEvent(name, ...params)`

use super::{engine_of, expect_arg_count, string_arg};
use crate::engine::ScriptEngine;
use crate::error::EngineResult;
use tracing::trace;

pub(super) fn install(engine: &ScriptEngine) -> EngineResult<()> {
    let weak = engine.downgrade();
    let trigger = engine.new_function("_triggerEvent", move |args| {
        const METHOD: &str = "_triggerEvent";
        expect_arg_count(args, 1, METHOD)?;
        let name = string_arg(args, 0, METHOD)?;
        let engine = engine_of(&weak)?;
        if !engine.trigger_event(&name, &args[1..]) {
            trace!(event = %name, "No callback registered");
        }
        Ok(None)
    })?;
    engine.set_global_property("_triggerEvent", trigger)
}

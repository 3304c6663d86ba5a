//! `setTimeout(fn, delayMs, ...args)`

use super::{deliver, expect_arg_count, function_arg};
use crate::engine::ScriptEngine;
use crate::error::EngineResult;
use hostjs_io::{ProviderResult, scheduler};
use std::time::Duration;

pub(super) fn install(engine: &ScriptEngine) -> EngineResult<()> {
    let weak = engine.downgrade();
    let set_timeout = engine.new_function("setTimeout", move |args| {
        const METHOD: &str = "setTimeout";
        expect_arg_count(args, 1, METHOD)?;
        let callback = function_arg(args, 0, METHOD)?;
        let delay = match args.get(1) {
            Some(delay) => delay_millis(delay.as_number()?),
            None => 0,
        };
        let extra = args.iter().skip(2).cloned().collect::<Vec<_>>();

        let weak = weak.clone();
        scheduler::spawn_with_completion(
            async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                ProviderResult::Ok(())
            },
            move |_| deliver(&weak, callback, METHOD, move |_| Ok(extra)),
        );
        Ok(None)
    })?;
    engine.set_global_property("setTimeout", set_timeout)
}

/// NaN and negative delays run as soon as possible.
fn delay_millis(delay: f64) -> u64 {
    if delay.is_finite() && delay > 0.0 {
        delay as u64
    } else {
        0
    }
}

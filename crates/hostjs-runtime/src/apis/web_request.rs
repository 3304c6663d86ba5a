//! `_webRequest`

use super::{
    AdapterFn, deliver, engine_of, expect_arg_count, function_arg, install_object, string_arg,
};
use crate::engine::{ScriptEngine, WeakScriptEngine};
use crate::error::{EngineError, EngineResult};
use crate::value::ScriptValue;
use hostjs_io::{ProviderError, ProviderResult, ServerResponse};

/// Reported in `status` when the request completed
pub const STATUS_OK: u32 = 0;
/// Reported in `status` for any failure to obtain a response
pub const STATUS_FAILURE: u32 = 0x8000_4005;
/// Reported in `status` for a URL the provider refused
pub const STATUS_MALFORMED_URI: u32 = 0x804B_000A;

pub(super) fn install(engine: &ScriptEngine) -> EngineResult<()> {
    install_object(engine, "_webRequest", vec![("GET", get(engine.downgrade()))])
}

fn get(weak: WeakScriptEngine) -> AdapterFn {
    Box::new(move |args| {
        const METHOD: &str = "_webRequest.GET";
        expect_arg_count(args, 3, METHOD)?;
        let url = string_arg(args, 0, METHOD)?;
        let headers = header_pairs(&args[1])?;
        let callback = function_arg(args, 2, METHOD)?;
        let engine = engine_of(&weak)?;

        let weak = weak.clone();
        engine.web_request().get(
            &url,
            &headers,
            Box::new(move |result: ProviderResult<ServerResponse>| {
                deliver(&weak, callback, METHOD, |engine| {
                    Ok(vec![response_object(engine, result)?])
                })
            }),
        );
        Ok(None)
    })
}

/// String pairs of a headers object. `undefined` and `null` mean none.
fn header_pairs(headers: &ScriptValue) -> EngineResult<Vec<(String, String)>> {
    if headers.is_undefined()? || headers.is_null()? {
        return Ok(Vec::new());
    }
    if !headers.is_object()? {
        return Err(EngineError::invalid_argument(
            "Second argument to _webRequest.GET must be an object",
        ));
    }
    headers
        .own_property_names()?
        .into_iter()
        .map(|name| {
            let value = headers.get_property(&name)?.as_string()?;
            Ok((name, value))
        })
        .collect()
}

fn response_object(
    engine: &ScriptEngine,
    result: ProviderResult<ServerResponse>,
) -> EngineResult<ScriptValue> {
    let object = engine.new_object()?;
    let response_headers = engine.new_object()?;
    match result {
        Ok(response) => {
            for (name, value) in &response.headers {
                response_headers.set_property(name, value)?;
            }
            object.set_property("status", STATUS_OK)?;
            object.set_property("responseStatus", u32::from(response.status_code))?;
            object.set_property("responseText", response.body)?;
            object.set_property("error", "")?;
        }
        Err(e) => {
            let status = match e {
                ProviderError::InvalidUrl(_) => STATUS_MALFORMED_URI,
                _ => STATUS_FAILURE,
            };
            object.set_property("status", status)?;
            object.set_property("responseStatus", 0)?;
            object.set_property("responseText", "")?;
            object.set_property("error", e.to_string())?;
        }
    }
    object.set_property("responseHeaders", response_headers)?;
    Ok(object)
}

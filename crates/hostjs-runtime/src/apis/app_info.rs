//! `_appInfo`

use crate::engine::ScriptEngine;
use crate::error::EngineResult;

pub(super) fn install(engine: &ScriptEngine) -> EngineResult<()> {
    let info = engine.app_info().clone();
    let object = engine.new_object()?;
    object.set_property("id", info.id)?;
    object.set_property("version", info.version)?;
    object.set_property("name", info.name)?;
    object.set_property("application", info.application)?;
    object.set_property("applicationVersion", info.application_version)?;
    object.set_property("locale", info.locale)?;
    object.set_property("developmentBuild", info.development_build)?;
    engine.set_global_property("_appInfo", object)
}

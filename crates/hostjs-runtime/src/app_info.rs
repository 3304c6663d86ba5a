//! Host application description exposed to scripts as `_appInfo`.

use serde::{Deserialize, Serialize};

/// Identifies the embedding application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppInfo {
    pub id: String,
    pub version: String,
    pub name: String,
    pub application: String,
    pub application_version: String,
    pub locale: String,
    pub development_build: bool,
}

impl AppInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            locale: "en-US".to_string(),
            ..Self::default()
        }
    }

    pub fn with_application(
        mut self,
        application: impl Into<String>,
        application_version: impl Into<String>,
    ) -> Self {
        self.application = application.into();
        self.application_version = application_version.into();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn development_build(mut self, development_build: bool) -> Self {
        self.development_build = development_build;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let info = AppInfo::new("adblock", "1.2.3")
            .with_application("browser", "99.0")
            .with_locale("de-DE")
            .with_id("abc")
            .development_build(true);

        assert_eq!(info.name, "adblock");
        assert_eq!(info.version, "1.2.3");
        assert_eq!(info.application, "browser");
        assert_eq!(info.application_version, "99.0");
        assert_eq!(info.locale, "de-DE");
        assert_eq!(info.id, "abc");
        assert!(info.development_build);
    }

    #[test]
    fn test_camel_case_json() {
        let info: AppInfo = serde_json::from_str(
            r#"{"name": "x", "applicationVersion": "2", "developmentBuild": true}"#,
        )
        .unwrap();
        assert_eq!(info.name, "x");
        assert_eq!(info.application_version, "2");
        assert!(info.development_build);
        assert_eq!(info.locale, "");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["applicationVersion"], "2");
    }
}

// Papra connection settings and their persistence on top of `Preferences`.

use crate::error::StoreError;
use crate::store::Preferences;
use serde_json::Value;

pub const KEY_SERVER_URL: &str = "server_url";
pub const KEY_API_KEY: &str = "api_key";
pub const KEY_ORGANIZATION_ID: &str = "organization_id";
pub const KEY_USE_HTTPS: &str = "use_https";

const HTTPS: &str = "https://";
const HTTP: &str = "http://";

/// The four values the settings screen collects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub api_key: String,
    pub organization_id: String,
    pub use_https: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server_url: String::new(),
            api_key: String::new(),
            organization_id: String::new(),
            use_https: true,
        }
    }
}

/// Everything needed to address the documents endpoint. Only built from
/// settings with no empty field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub server_url: String,
    pub api_key: String,
    pub organization_id: String,
}

impl UploadTarget {
    pub fn documents_url(&self) -> String {
        format!(
            "{}/api/organizations/{}/documents",
            self.server_url.trim_end_matches('/'),
            self.organization_id
        )
    }
}

/// Give `raw` a scheme and strip trailing slashes.
///
/// An explicit `http://` or `https://` typed by the user wins over the
/// toggle. A value that is nothing but a scheme normalizes to the empty
/// string, which keeps the function idempotent.
pub fn normalize_server_url(raw: &str, use_https: bool) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let (scheme, rest) = split_scheme(trimmed)
        .unwrap_or(if use_https { (HTTPS, trimmed) } else { (HTTP, trimmed) });
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return String::new();
    }
    format!("{}{}", scheme, rest)
}

fn split_scheme(url: &str) -> Option<(&'static str, &str)> {
    [HTTPS, HTTP].into_iter().find_map(|scheme| {
        let head = url.get(..scheme.len())?;
        head.eq_ignore_ascii_case(scheme)
            .then(|| (scheme, &url[scheme.len()..]))
    })
}

impl Settings {
    pub fn load(prefs: &Preferences) -> Self {
        Settings {
            server_url: prefs.get_string(KEY_SERVER_URL, ""),
            api_key: prefs.get_string(KEY_API_KEY, ""),
            organization_id: prefs.get_string(KEY_ORGANIZATION_ID, ""),
            use_https: prefs.get_bool(KEY_USE_HTTPS, true),
        }
    }

    /// Normalized copy: URL gets a scheme and loses trailing slashes, the
    /// key and organization id are trimmed.
    pub fn normalized(&self) -> Self {
        Settings {
            server_url: normalize_server_url(&self.server_url, self.use_https),
            api_key: self.api_key.trim().to_string(),
            organization_id: self.organization_id.trim().to_string(),
            use_https: self.use_https,
        }
    }

    /// Normalize and overwrite all four entries in one commit. Returns the
    /// values that were actually stored.
    pub fn save(&self, prefs: &mut Preferences) -> Result<Settings, StoreError> {
        let clean = self.normalized();
        prefs.commit([
            (KEY_SERVER_URL, Value::from(clean.server_url.as_str())),
            (KEY_API_KEY, Value::from(clean.api_key.as_str())),
            (KEY_ORGANIZATION_ID, Value::from(clean.organization_id.as_str())),
            (KEY_USE_HTTPS, Value::from(clean.use_https)),
        ])?;
        Ok(clean)
    }

    /// Human-readable names of the required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.server_url.trim().is_empty() {
            missing.push("server URL");
        }
        if self.api_key.trim().is_empty() {
            missing.push("API key");
        }
        if self.organization_id.trim().is_empty() {
            missing.push("organization id");
        }
        missing
    }

    pub fn upload_target(&self) -> Result<UploadTarget, Vec<&'static str>> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(missing);
        }
        Ok(UploadTarget {
            server_url: self.server_url.trim().trim_end_matches('/').to_string(),
            api_key: self.api_key.trim().to_string(),
            organization_id: self.organization_id.trim().to_string(),
        })
    }

    /// API key with everything but the last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.is_empty() {
            return String::new();
        }
        let visible = if chars.len() > 8 { 4 } else { 0 };
        let hidden = chars.len() - visible;
        let tail: String = chars[hidden..].iter().collect();
        format!("{}{}", "*".repeat(hidden.min(12)), tail)
    }
}

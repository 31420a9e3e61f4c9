// Where things live on disk: the config directory holds the preference
// store and its master key, the cache directory holds staged uploads.

use crate::settings::Settings;
use crate::store::Preferences;
use std::path::PathBuf;

pub const APP_NAME: &str = "papra-share";
pub const CONFIG_DIR_ENV: &str = "PAPRA_SHARE_CONFIG_DIR";
pub const CACHE_DIR_ENV: &str = "PAPRA_SHARE_CACHE_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl AppDirs {
    /// Explicit directories win; otherwise use the platform locations, or
    /// the working directory when the platform has none.
    pub fn resolve(config_dir: Option<PathBuf>, cache_dir: Option<PathBuf>) -> Self {
        let config_dir = config_dir.unwrap_or_else(|| {
            dirs::config_dir()
                .map(|d| d.join(APP_NAME))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        let cache_dir = cache_dir.unwrap_or_else(|| {
            dirs::cache_dir()
                .map(|d| d.join(APP_NAME))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        AppDirs {
            config_dir,
            cache_dir,
        }
    }

    pub fn open_preferences(&self) -> Preferences {
        Preferences::open(&self.config_dir)
    }

    pub fn load_settings(&self) -> Settings {
        Settings::load(&self.open_preferences())
    }
}

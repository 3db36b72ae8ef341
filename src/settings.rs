use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;
use crate::reconcile::Policy;

pub const DEFAULT_SOURCE_URL: &str = "https://coinmaster-daily.com/pt";
pub const DEFAULT_REGION: &str = "links";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_TITLE: &str = "Reward";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const DEFAULT_ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en;q=0.8";
const CONFIG_FILE: &str = "reward_scraper";
const ENV_PREFIX: &str = "REWARDS";

/// Whether each collection block yields one link or all of its links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorMode {
    First,
    All,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub source_url: String,
    #[serde(default)]
    pub store: String,
    pub region: String,
    #[serde(default)]
    pub window: Option<usize>,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub accept_language: String,
    pub block_selector: String,
    pub anchor_selector: String,
    pub meta_selector: String,
    pub anchor_mode: AnchorMode,
    pub default_title: String,
}

/// Values given on the command line. They win over every other source.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub source_url: Option<String>,
    pub store: Option<String>,
    pub region: Option<String>,
    pub window: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// Defaults, then the config file, then `REWARDS_*` variables, then CLI flags.
    pub fn load(overrides: Overrides) -> Result<Self, ConfigError> {
        let file = match &overrides.config_file {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name(CONFIG_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .set_default("source_url", DEFAULT_SOURCE_URL)?
            .set_default("region", DEFAULT_REGION)?
            .set_default("timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .set_default("accept_language", DEFAULT_ACCEPT_LANGUAGE)?
            .set_default("block_selector", ".fs-collect")?
            .set_default("anchor_selector", "a")?
            .set_default("meta_selector", ".fs-meta")?
            .set_default("anchor_mode", "first")?
            .set_default("default_title", DEFAULT_TITLE)?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("source_url", overrides.source_url)?
            .set_override_option("store", overrides.store)?
            .set_override_option("region", overrides.region)?
            .set_override_option("window", overrides.window.map(|n| n as u64))?
            .set_override_option("timeout_secs", overrides.timeout_secs)?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.trim().is_empty() {
            return Err(ConfigError::MissingStore);
        }
        if self.window == Some(0) {
            return Err(ConfigError::ZeroWindow);
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        match Url::parse(&self.source_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => Ok(()),
            _ => Err(ConfigError::SourceUrl(self.source_url.clone())),
        }
    }

    pub fn policy(&self) -> Policy {
        match self.window {
            Some(max_size) => Policy::RollingWindow { max_size },
            None => Policy::Append,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Settings with every default applied and the given store, for tests.
    #[cfg(test)]
    pub fn for_store(store: &str) -> Self {
        Settings {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            store: store.to_string(),
            region: DEFAULT_REGION.to_string(),
            window: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            block_selector: ".fs-collect".to_string(),
            anchor_selector: "a".to_string(),
            meta_selector: ".fs-meta".to_string(),
            anchor_mode: AnchorMode::First,
            default_title: DEFAULT_TITLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn with_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn file_values_and_defaults() {
        let f = with_file("store = \"data/rewards.sqlite\"\nwindow = 30\n");
        let s = Settings::load(Overrides {
            config_file: Some(f.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(s.store, "data/rewards.sqlite");
        assert_eq!(s.window, Some(30));
        assert_eq!(s.region, "links");
        assert_eq!(s.timeout(), Duration::from_secs(20));
        assert_eq!(s.anchor_mode, AnchorMode::First);
        assert_eq!(s.policy(), Policy::RollingWindow { max_size: 30 });
    }

    #[test]
    fn cli_overrides_win() {
        let f = with_file("store = \"a.sqlite\"\nregion = \"from_file\"\nanchor_mode = \"all\"\n");
        let s = Settings::load(Overrides {
            config_file: Some(f.path().to_path_buf()),
            store: Some("b.sqlite".into()),
            timeout_secs: Some(5),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(s.store, "b.sqlite");
        assert_eq!(s.region, "from_file");
        assert_eq!(s.timeout_secs, 5);
        assert_eq!(s.anchor_mode, AnchorMode::All);
        assert_eq!(s.policy(), Policy::Append);
    }

    #[test]
    fn store_is_required() {
        let f = with_file("region = \"links\"\n");
        let err = Settings::load(Overrides {
            config_file: Some(f.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingStore));
    }

    #[test]
    fn rejects_bad_values() {
        let mut s = Settings::for_store("x.sqlite");
        s.window = Some(0);
        assert!(matches!(s.validate(), Err(ConfigError::ZeroWindow)));

        let mut s = Settings::for_store("x.sqlite");
        s.source_url = "ftp://coinmaster-daily.com".into();
        assert!(matches!(s.validate(), Err(ConfigError::SourceUrl(_))));

        let mut s = Settings::for_store("x.sqlite");
        s.timeout_secs = 0;
        assert!(matches!(s.validate(), Err(ConfigError::ZeroTimeout)));
    }
}

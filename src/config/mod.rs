use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
    value::magic::RelativePathBuf,
};
use platform_dirs::AppDirs;
use serde::{Deserialize, Serialize};

use crate::{quarantine::QuarantinePolicy, urls::RegistryUrls};

pub(crate) mod duration;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaginationConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, `RUST_LOG` takes precedence when set.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Configuration {
    /// Public base URL of the registry, used in pull commands and links.
    pub url: String,
    /// Root directory of stored blob content.
    #[serde(serialize_with = "RelativePathBuf::serialize_original")]
    pub storage: RelativePathBuf,
    pub untagged_images: bool,
    pub pagination: PaginationConfig,
    pub quarantine: QuarantinePolicy,
    #[serde(with = "crate::config::duration::option", default)]
    pub request_timeout: Option<Duration>,
    pub logging: LoggingConfig,
}

impl Configuration {
    pub fn figment(configs: Vec<PathBuf>) -> Figment {
        let fig = Figment::from(Serialized::defaults(Configuration::default()));

        let fig = match AppDirs::new(Some("artifact-resolver"), true) {
            Some(app_dirs) => {
                let config_path = app_dirs.config_dir.join("config.yaml");
                match config_path.exists() {
                    true => fig.admerge(Yaml::file(config_path)),
                    false => fig,
                }
            }
            None => fig,
        };

        let fig = configs
            .into_iter()
            .fold(fig, |fig, config_path| fig.admerge(Yaml::file(config_path)));

        fig.admerge(Env::prefixed("ARTIFACT_RESOLVER_").split("__"))
    }

    pub fn config(figment: Figment) -> Result<Configuration> {
        let config: Configuration = figment.extract().context("Failed to load configuration")?;

        RegistryUrls::parse(&config.url).context("url must be an absolute http(s) URL")?;

        if config.pagination.default_page_size == 0 || config.pagination.max_page_size == 0 {
            bail!("Page sizes must be at least 1");
        }

        if config.pagination.default_page_size > config.pagination.max_page_size {
            bail!("pagination.default_page_size greater than pagination.max_page_size");
        }

        if config.request_timeout == Some(Duration::ZERO) {
            bail!("request_timeout must be greater than zero");
        }

        Ok(config)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            url: "http://localhost".into(),
            storage: "var".to_string().into(),
            untagged_images: false,
            pagination: PaginationConfig::default(),
            quarantine: QuarantinePolicy::default(),
            request_timeout: None,
            logging: LoggingConfig::default(),
        }
    }
}

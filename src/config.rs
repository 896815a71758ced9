//! Run configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! command-line flags. The result is validated once and handed to the
//! pipeline as an immutable [`Config`].
//!
//! # Example
//!
//! ```yaml
//! delay_seconds: 1.5
//! min_body_length: 300
//! output_path: data/voa.jsonl
//! sites:
//!   - site: voa
//!     index_url: https://burmese.voanews.com/z/4380
//!   - site: bbc
//!     sitemap_url: https://www.bbc.com/burmese/sitemap.xml
//!     selectors:
//!       body: "main div[dir='ltr'] p"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::cli::Cli;
use crate::models::SourceSite;
use crate::normalizer::{NormalizeSettings, default_boilerplate};
use crate::outputs::corpus::OutputFormat;
use crate::scrapers::{ExtractionRule, SelectorOverrides, bbc, voa};

/// Desktop browser user agent; some of the sites serve reduced pages to
/// unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Where one site's article URLs come from, and how its pages are read.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    pub site: SourceSite,
    /// Explicit article URLs; when present, discovery is skipped.
    #[serde(default)]
    pub seeds: Vec<String>,
    #[serde(default)]
    pub index_url: Option<String>,
    #[serde(default)]
    pub sitemap_url: Option<String>,
    #[serde(default)]
    pub selectors: SelectorOverrides,
}

impl SiteConfig {
    /// The site's listing page with built-in selectors.
    pub fn default_for(site: SourceSite) -> Self {
        let index_url = match site {
            SourceSite::Voa => voa::INDEX_URL,
            SourceSite::Bbc => bbc::INDEX_URL,
        };
        Self {
            site,
            seeds: Vec::new(),
            index_url: Some(index_url.to_string()),
            sitemap_url: None,
            selectors: SelectorOverrides::default(),
        }
    }

    pub fn rule(&self) -> ExtractionRule {
        ExtractionRule::for_site(self.site).with_overrides(&self.selectors)
    }

    fn has_source(&self) -> bool {
        !self.seeds.is_empty() || self.index_url.is_some() || self.sitemap_url.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Pause between consecutive requests.
    pub delay_seconds: f64,
    pub timeout_seconds: u64,
    pub min_body_length: usize,
    pub min_burmese_ratio: f64,
    pub burmese_only: bool,
    pub sentence_min_chars: usize,
    pub sentence_max_chars: usize,
    pub boilerplate: Vec<String>,
    pub user_agent: String,
    pub output_path: PathBuf,
    pub output_format: OutputFormat,
    /// Per-site cap on links taken from an index page or sitemap.
    pub max_articles: usize,
    pub sites: Vec<SiteConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let normalize = NormalizeSettings::default();
        Self {
            delay_seconds: 1.0,
            timeout_seconds: 10,
            min_body_length: normalize.min_body_length,
            min_burmese_ratio: normalize.min_burmese_ratio,
            burmese_only: normalize.burmese_only,
            sentence_min_chars: normalize.sentence_min_chars,
            sentence_max_chars: normalize.sentence_max_chars,
            boilerplate: default_boilerplate(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            output_path: PathBuf::from("data/burmese_corpus.jsonl"),
            output_format: OutputFormat::Jsonl,
            max_articles: 1000,
            sites: vec![
                SiteConfig::default_for(SourceSite::Voa),
                SiteConfig::default_for(SourceSite::Bbc),
            ],
        }
    }
}

impl Config {
    /// Defaults, overlaid with `path` when given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            None => Ok(Self::default()),
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                let config = Self::from_yaml(&text)?;
                info!(sites = config.sites.len(), "Loaded configuration file");
                Ok(config)
            }
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load, apply command-line overrides and validate.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = Self::load(cli.config.as_deref())?;
        config.apply_cli(cli)?;
        config.validate()?;
        debug!(?config, "Resolved configuration");
        Ok(config)
    }

    fn apply_cli(&mut self, cli: &Cli) -> Result<(), ConfigError> {
        if let Some(v) = cli.delay_seconds {
            self.delay_seconds = v;
        }
        if let Some(v) = cli.min_body_length {
            self.min_body_length = v;
        }
        if let Some(v) = &cli.user_agent {
            self.user_agent = v.clone();
        }
        if let Some(v) = &cli.output_path {
            self.output_path = v.clone();
        }
        if let Some(v) = cli.format {
            self.output_format = v;
        }
        if let Some(v) = cli.max_articles {
            self.max_articles = v;
        }

        let Some(site) = cli.site else {
            return Ok(());
        };
        self.sites.retain(|s| s.site == site);
        if self.sites.is_empty() {
            self.sites.push(SiteConfig::default_for(site));
        }

        let mut seeds = cli.urls.clone();
        if let Some(path) = &cli.seed_file {
            seeds.extend(read_seed_file(path)?);
        }
        if !seeds.is_empty() {
            for entry in &mut self.sites {
                entry.seeds = seeds.clone();
                entry.index_url = None;
                entry.sitemap_url = None;
            }
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.delay_seconds.is_finite() || self.delay_seconds < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "delay_seconds must be a non-negative number, got {}",
                self.delay_seconds
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid("timeout_seconds must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.min_burmese_ratio) {
            return Err(ConfigError::Invalid(format!(
                "min_burmese_ratio must be between 0 and 1, got {}",
                self.min_burmese_ratio
            )));
        }
        if self.sentence_min_chars > self.sentence_max_chars {
            return Err(ConfigError::Invalid(
                "sentence_min_chars is larger than sentence_max_chars".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent is empty".into()));
        }
        if self.sites.is_empty() {
            return Err(ConfigError::Invalid("no sites configured".into()));
        }
        for site in &self.sites {
            if !site.has_source() {
                return Err(ConfigError::Invalid(format!(
                    "site {} has no seeds, index_url or sitemap_url",
                    site.site
                )));
            }
            site.rule()
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("site {}: {e}", site.site)))?;
        }
        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn normalize_settings(&self) -> NormalizeSettings {
        NormalizeSettings {
            min_body_length: self.min_body_length,
            min_burmese_ratio: self.min_burmese_ratio,
            burmese_only: self.burmese_only,
            sentence_min_chars: self.sentence_min_chars,
            sentence_max_chars: self.sentence_max_chars,
            boilerplate: self.boilerplate.clone(),
        }
    }
}

/// One URL per line; blank lines and `#` comments are skipped.
fn read_seed_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("burmese_news_corpus").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.delay(), Duration::from_secs(1));
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.sites.len(), 2);
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let config = Config::from_yaml(
            r#"
delay_seconds: 2.5
min_body_length: 50
output_format: text
sites:
  - site: bbc
    sitemap_url: https://www.bbc.com/burmese/sitemap.xml
    selectors:
      body: "main div p"
"#,
        )
        .unwrap();

        assert_eq!(config.delay_seconds, 2.5);
        assert_eq!(config.min_body_length, 50);
        assert_eq!(config.output_format, OutputFormat::Text);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.sites[0].index_url, None);
        let rule = config.sites[0].rule();
        assert_eq!(rule.site(), SourceSite::Bbc);
        assert_eq!(rule.selectors().body, "main div p");
        assert_eq!(rule.selectors().title, bbc::selectors().title);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_yaml_key_is_rejected() {
        assert!(matches!(
            Config::from_yaml("delay_secs: 1"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_cli_seeds_replace_site_sources() {
        let mut config = Config::default();
        config
            .apply_cli(&cli(&["-s", "voa", "-u", "http://site/a", "-d", "0"]))
            .unwrap();
        config.validate().unwrap();

        assert_eq!(config.delay_seconds, 0.0);
        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.sites[0].site, SourceSite::Voa);
        assert_eq!(config.sites[0].seeds, vec!["http://site/a".to_string()]);
        assert_eq!(config.sites[0].index_url, None);
    }

    #[test]
    fn test_seed_file_skips_comments() {
        let tmp = tempfile::tempdir().unwrap();
        let seeds = tmp.path().join("seeds.txt");
        fs::write(&seeds, "# voa\nhttp://site/a\n\n  http://site/b  \n").unwrap();

        let mut config = Config::default();
        config
            .apply_cli(&cli(&["-s", "bbc", "--seed-file", seeds.to_str().unwrap()]))
            .unwrap();
        assert_eq!(
            config.sites[0].seeds,
            vec!["http://site/a".to_string(), "http://site/b".to_string()]
        );
    }

    #[test]
    fn test_missing_config_file_is_read_error() {
        let err = Config::load(Some(Path::new("/nonexistent/scraper.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let negative_delay = Config {
            delay_seconds: -1.0,
            ..Config::default()
        };
        assert!(negative_delay.validate().is_err());

        let nan_delay = Config {
            delay_seconds: f64::NAN,
            ..Config::default()
        };
        assert!(nan_delay.validate().is_err());

        let mut sourceless = Config::default();
        sourceless.sites[0].index_url = None;
        assert!(sourceless.validate().is_err());

        let mut bad_selector = Config::default();
        bad_selector.sites[0].selectors.title = Some("h1[[".to_string());
        assert!(matches!(bad_selector.validate(), Err(ConfigError::Invalid(_))));
    }
}

use anyhow::Context;
use fs_err::tokio as fs;
use serde::Deserialize;
use std::{collections::BTreeMap, path::Path, path::PathBuf};
use svg2png::{ConversionRequest, ConvertOptions, Limits};

use crate::glob::Glob;

pub static FILE_NAME: &str = "svg2png.toml";

/// Overrides `limits.max_pixels` when set.
pub static MAX_PIXELS_VAR: &str = "SVG2PNG_MAX_PIXELS";

fn default_supersample() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub limits: Limits,
    #[serde(default = "default_supersample")]
    pub supersample: u32,
    #[serde(default)]
    pub inputs: BTreeMap<String, Input>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            supersample: default_supersample(),
            inputs: BTreeMap::new(),
        }
    }
}

impl Config {
    pub async fn read(path: &Path) -> anyhow::Result<Config> {
        let config = fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&config)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Reads `path` if it exists, otherwise returns the defaults.
    pub async fn read_or_default(path: &Path) -> anyhow::Result<Config> {
        if path.exists() {
            Self::read(path).await
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    /// Conversion options with environment overrides applied.
    pub fn options(&self) -> anyhow::Result<ConvertOptions> {
        let mut limits = self.limits;
        if let Ok(value) = std::env::var(MAX_PIXELS_VAR) {
            limits.max_pixels = value
                .trim()
                .parse()
                .with_context(|| format!("{MAX_PIXELS_VAR} must be a positive integer"))?;
        }

        Ok(ConvertOptions {
            limits,
            supersample: self.supersample,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Input {
    pub path: Glob,
    pub output_path: PathBuf,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub dpi: Option<u32>,
}

impl Input {
    pub fn request(&self) -> ConversionRequest {
        let defaults = ConversionRequest::default();
        ConversionRequest {
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            dpi: self.dpi.unwrap_or(defaults.dpi),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inputs_and_limits() {
        let config: Config = toml::from_str(
            r#"
            supersample = 2

            [limits]
            max_width = 1024

            [inputs.icons]
            path = "assets/icons/**/*.svg"
            output_path = "out/icons"
            width = 64
            height = 64

            [inputs.logos]
            path = "assets/logo.svg"
            output_path = "out"
            dpi = 300
            "#,
        )
        .unwrap();

        assert_eq!(config.supersample, 2);
        assert_eq!(config.limits.max_width, 1024);
        assert_eq!(config.limits.max_height, Limits::default().max_height);

        let icons = &config.inputs["icons"];
        assert_eq!(icons.request(), ConversionRequest::new(64, 64, 72));
        assert_eq!(icons.path.get_prefix(), PathBuf::from("assets/icons"));

        let logos = &config.inputs["logos"];
        assert_eq!(logos.request(), ConversionRequest::new(512, 512, 300));
    }

    #[test]
    fn empty_config_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.inputs.is_empty());
        assert_eq!(config.supersample, 1);
        assert_eq!(config.limits, Limits::default());
    }

    #[test]
    fn input_requires_output_path() {
        let result = toml::from_str::<Config>(
            r#"
            [inputs.icons]
            path = "icons/*.svg"
            "#,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unreadable_config_names_the_file() {
        let err = Config::read(Path::new("missing/svg2png.toml"))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("missing/svg2png.toml"));
    }
}

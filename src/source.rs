use anyhow::bail;
use fs_err::tokio as fs;
use std::{
    convert::Infallible,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use svg2png::ConversionError;

/// Where SVG bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Url(String),
}

impl FromStr for Source {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("http://") || s.starts_with("https://") {
            Ok(Source::Url(s.to_string()))
        } else {
            Ok(Source::File(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(path) => write!(f, "{}", path.display()),
            Source::Url(url) => f.write_str(url),
        }
    }
}

impl Source {
    pub async fn fetch(&self, client: &reqwest::Client) -> Result<Vec<u8>, ConversionError> {
        self.fetch_inner(client)
            .await
            .map_err(|err| ConversionError::source_fetch(self.to_string(), err))
    }

    async fn fetch_inner(&self, client: &reqwest::Client) -> anyhow::Result<Vec<u8>> {
        match self {
            Source::File(path) => Ok(fs::read(path).await?),
            Source::Url(url) => {
                let response = client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    bail!("Server responded with {status}");
                }
                Ok(response.bytes().await?.to_vec())
            }
        }
    }

    /// `name.png` next to a file source, or in the working directory for URLs.
    pub fn default_output(&self) -> PathBuf {
        match self {
            Source::File(path) => path.with_extension("png"),
            Source::Url(url) => {
                let name = url
                    .split(['?', '#'])
                    .next()
                    .and_then(|u| u.rsplit('/').next())
                    .filter(|name| !name.is_empty())
                    .unwrap_or("output.svg");
                Path::new(name).with_extension("png")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_paths_and_urls() {
        assert_eq!(
            "icons/a.svg".parse::<Source>().unwrap(),
            Source::File(PathBuf::from("icons/a.svg"))
        );
        assert_eq!(
            "https://example.com/a.svg".parse::<Source>().unwrap(),
            Source::Url("https://example.com/a.svg".into())
        );
    }

    #[test]
    fn default_outputs() {
        let file: Source = "icons/a.svg".parse().unwrap();
        assert_eq!(file.default_output(), PathBuf::from("icons/a.png"));

        let url: Source = "https://example.com/x/logo.svg?v=2".parse().unwrap();
        assert_eq!(url.default_output(), PathBuf::from("logo.png"));

        let bare: Source = "https://example.com/".parse().unwrap();
        assert_eq!(bare.default_output(), PathBuf::from("output.png"));
    }

    #[tokio::test]
    async fn missing_file_is_a_fetch_failure() {
        let source: Source = "does/not/exist.svg".parse().unwrap();
        let err = source.fetch(&reqwest::Client::new()).await.unwrap_err();
        assert_eq!(err.stage(), svg2png::Stage::Fetch);
        assert!(err.to_string().contains("does/not/exist.svg"));

        let cause = std::error::Error::source(&err).map(|e| e.to_string());
        assert!(cause.is_some_and(|c| c.contains("does/not/exist.svg")));
    }
}

use crate::source::Source;
use log::error;
use svg2png::{ConversionError, ConversionRequest, Converter};

pub mod batch;
pub mod convert;

/// Fetches `source` and converts it off the async runtime.
pub async fn render_source(
    client: &reqwest::Client,
    converter: &Converter,
    source: &Source,
    request: ConversionRequest,
) -> anyhow::Result<Vec<u8>> {
    let data = source.fetch(client).await.map_err(describe)?;

    let converter = converter.clone();
    let png = tokio::task::spawn_blocking(move || converter.convert(&data, &request))
        .await?
        .map_err(describe)?;

    Ok(png)
}

/// Turns a conversion failure into a user-facing error. Internal failures
/// are logged in full and reported generically.
fn describe(err: ConversionError) -> anyhow::Error {
    if err.is_input_error() {
        anyhow::anyhow!("{} (status {}, {} stage)", err, err.status_code(), err.stage())
    } else if matches!(err, ConversionError::SourceFetchFailure { .. }) {
        anyhow::Error::new(err)
    } else {
        error!("{err:?}");
        anyhow::anyhow!("{} (status {})", err.public_message(), err.status_code())
    }
}

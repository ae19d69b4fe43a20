use crate::tile::TileIndex;

/// Reasons a single tile yields no features. None of them abort a run.
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("tile {tile} returned HTTP {status}")]
    Status { tile: TileIndex, status: u16 },

    #[error("tile {tile} could not be fetched: {message}")]
    Transport { tile: TileIndex, message: String },

    #[error("tile {tile} could not be decoded: {message}")]
    Decode { tile: TileIndex, message: String },
}

/// Anything that can hand out raw tile payloads.
pub trait TileSource {
    fn fetch(&self, tile: TileIndex) -> Result<Vec<u8>, TileError>;
}

/// Substitute `{z}`, `{x}` and `{y}` in a URL template.
pub fn render_tile_url(template: &str, tile: TileIndex) -> String {
    template
        .replace("{z}", &tile.zoom().to_string())
        .replace("{x}", &tile.x().to_string())
        .replace("{y}", &tile.y().to_string())
}

/// Error unless the template carries all three placeholders.
pub fn validate_url_template(template: &str) -> anyhow::Result<()> {
    for placeholder in ["{z}", "{x}", "{y}"] {
        anyhow::ensure!(
            template.contains(placeholder),
            "URL template is missing the {placeholder} placeholder: {template}"
        );
    }
    Ok(())
}

#[cfg(feature = "download")]
pub use http::HttpTileSource;

#[cfg(feature = "download")]
mod http {
    use std::time::Duration;

    use anyhow::{Context, Result};
    use tracing::debug;

    use super::{TileError, TileSource, render_tile_url, validate_url_template};
    use crate::tile::TileIndex;

    /// Fetches tiles from an XYZ tile server with one blocking GET per tile.
    #[derive(Debug, Clone)]
    pub struct HttpTileSource {
        client: reqwest::blocking::Client,
        url_template: String,
    }

    impl HttpTileSource {
        pub fn new(url_template: &str, timeout: Duration) -> Result<Self> {
            validate_url_template(url_template)?;
            anyhow::ensure!(!timeout.is_zero(), "timeout must be positive");
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("geoprep/", env!("CARGO_PKG_VERSION")))
                .build()
                .context("Failed to build HTTP client")?;
            Ok(Self { client, url_template: url_template.to_string() })
        }

        #[inline] pub fn url_template(&self) -> &str { &self.url_template }
    }

    impl TileSource for HttpTileSource {
        fn fetch(&self, tile: TileIndex) -> Result<Vec<u8>, TileError> {
            let url = render_tile_url(&self.url_template, tile);
            debug!("[fetch] {url}");

            let response = self.client.get(&url).send()
                .map_err(|e| TileError::Transport { tile, message: e.to_string() })?;

            let status = response.status();
            if !status.is_success() {
                return Err(TileError::Status { tile, status: status.as_u16() });
            }

            let bytes = response.bytes()
                .map_err(|e| TileError::Transport { tile, message: e.to_string() })?;
            Ok(bytes.to_vec())
        }
    }
}

//! Local naming and downloading of page images.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mdharvest_shared::{HarvestError, Result};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use url::Url;

/// Extensions kept as-is; anything else is saved as [`DEFAULT_EXTENSION`].
pub const ALLOWED_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp"];

/// Extension used for unknown or missing image extensions.
pub const DEFAULT_EXTENSION: &str = ".png";

/// User-Agent string for asset downloads.
const USER_AGENT: &str = concat!("mdharvest/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Local file extension for a remote image URL.
///
/// Takes the extension of the last path segment, ignoring query and
/// fragment, lowercased. Inline `data:` images use their media type. Always
/// returns a member of [`ALLOWED_EXTENSIONS`], and maps each member to itself.
pub fn extension_for(remote_url: &str) -> &'static str {
    if let Some(known) = ALLOWED_EXTENSIONS
        .iter()
        .copied()
        .find(|ext| remote_url.eq_ignore_ascii_case(ext))
    {
        return known;
    }
    if let Some(header) = data_uri(remote_url) {
        return extension_for_media_type(header);
    }

    let path = match Url::parse(remote_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => remote_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let filename = path.rsplit('/').next().unwrap_or_default();
    let ext = match filename.rfind('.') {
        Some(i) if i > 0 => filename[i..].to_ascii_lowercase(),
        _ => return DEFAULT_EXTENSION,
    };

    ALLOWED_EXTENSIONS
        .iter()
        .copied()
        .find(|allowed| *allowed == ext)
        .unwrap_or(DEFAULT_EXTENSION)
}

fn extension_for_media_type(header: &str) -> &'static str {
    let media_type = header
        .split([';', ','])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match media_type.as_str() {
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/gif" => ".gif",
        "image/svg+xml" => ".svg",
        "image/webp" => ".webp",
        _ => DEFAULT_EXTENSION,
    }
}

/// Everything after `data:` when `url` is a data URI.
fn data_uri(url: &str) -> Option<&str> {
    url.get(..5)
        .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
        .map(|_| &url[5..])
}

/// Payload bytes of a `data:` URI, base64 or percent-encoded.
fn decode_data_uri(rest: &str) -> Result<Vec<u8>> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| HarvestError::validation("malformed data URI: no ',' before payload"))?;

    if header.to_ascii_lowercase().ends_with(";base64") {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map_err(|e| HarvestError::validation(format!("invalid base64 in data URI: {e}")))
    } else {
        Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    }
}

/// `image_{page}_{index+1}{ext}`: unique per page, stable for a given DOM order.
pub fn local_filename_for(page_sequence_number: usize, image_index: usize, extension: &str) -> String {
    format!("image_{page_sequence_number}_{}{extension}", image_index + 1)
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// Streams remote images to disk, one request at a time.
///
/// There is no retry: a failed download is reported to the caller, which
/// leaves the image's remote reference in place.
pub struct AssetFetcher {
    client: Client,
}

impl AssetFetcher {
    /// Create a fetcher whose requests expire after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Download `remote_url` into `destination`, returning the byte count.
    /// A `data:` URI is decoded in place instead of requested.
    ///
    /// A partially written file is removed when the transfer fails.
    #[instrument(skip(self, remote_url, destination), fields(dest = %destination.display()))]
    pub async fn fetch(&self, remote_url: &str, destination: &Path) -> Result<u64> {
        if let Some(rest) = data_uri(remote_url) {
            let bytes = decode_data_uri(rest)?;
            tokio::fs::write(destination, &bytes)
                .await
                .map_err(|e| HarvestError::io(destination, e))?;
            debug!(bytes = bytes.len(), "inline image decoded");
            return Ok(bytes.len() as u64);
        }

        let mut response = self
            .client
            .get(remote_url)
            .send()
            .await
            .map_err(|e| HarvestError::Network(format!("{remote_url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Network(format!("{remote_url}: HTTP {status}")));
        }

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| HarvestError::io(destination, e))?;

        let mut written: u64 = 0;
        let outcome: Result<()> = async {
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| HarvestError::Network(format!("{remote_url}: body read failed: {e}")))?
            {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| HarvestError::io(destination, e))?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(|e| HarvestError::io(destination, e))
        }
        .await;

        if let Err(e) = outcome {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(destination).await {
                warn!(error = %rm, "could not remove partial download");
            }
            return Err(e);
        }

        debug!(bytes = written, "asset downloaded");
        Ok(written)
    }
}

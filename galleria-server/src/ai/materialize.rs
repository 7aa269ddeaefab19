//! Local copies of generated images.
//!
//! A remote result is downloaded (or decoded, for `data:` URLs), stored under
//! `<content>/ai/<uuid>.<ext>`, and shrunk into a JPEG derivative under
//! `<content>/ai/thumbs/<uuid>.jpg`. Callers receive public URL paths.

use std::path::{Path, PathBuf};

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use reqwest::Client;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ai::error::MaterializeError;

pub const MAX_DOWNLOAD_BYTES: usize = 32 * 1024 * 1024;
pub const THUMB_WIDTH: u32 = 400;
pub const THUMB_QUALITY: u8 = 80;

/// Public references to a materialized result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedAsset {
    pub asset_url: String,
    pub thumb_url: String,
}

impl MaterializedAsset {
    /// Both references point at the remote URL itself.
    pub fn passthrough(url: &str) -> Self {
        Self {
            asset_url: url.to_owned(),
            thumb_url: url.to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Materializer {
    http: Client,
    content_dir: PathBuf,
    public_prefix: String,
    max_bytes: usize,
}

impl Materializer {
    pub fn new(http: Client, content_dir: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            http,
            content_dir: content_dir.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_owned(),
            max_bytes: MAX_DOWNLOAD_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Download `url`, persist it, and write its thumbnail.
    pub async fn fetch(&self, url: &str) -> Result<MaterializedAsset, MaterializeError> {
        let bytes = match url.strip_prefix("data:") {
            Some(rest) => decode_data_url(rest)?,
            None => self.download(url).await?,
        };

        let ai_dir = self.content_dir.join("ai");
        let thumb_dir = ai_dir.join("thumbs");
        tokio::fs::create_dir_all(&thumb_dir).await?;

        let stem = Uuid::new_v4().to_string();
        let (ext, thumb) = tokio::task::spawn_blocking({
            let bytes = bytes.clone();
            move || render_thumbnail(&bytes)
        })
        .await??;

        let file_name = format!("{stem}.{ext}");
        let thumb_name = format!("{stem}.jpg");
        tokio::fs::write(ai_dir.join(&file_name), &bytes).await?;
        if let Err(e) = tokio::fs::write(thumb_dir.join(&thumb_name), &thumb).await {
            remove_quietly(&ai_dir.join(&file_name)).await;
            return Err(e.into());
        }

        info!(file = %file_name, bytes = bytes.len(), thumb_bytes = thumb.len(), "materialized generated image");
        Ok(MaterializedAsset {
            asset_url: format!("{}/ai/{file_name}", self.public_prefix),
            thumb_url: format!("{}/ai/thumbs/{thumb_name}", self.public_prefix),
        })
    }

    /// [`Self::fetch`], falling back to the remote URL on any failure.
    pub async fn materialize_or_passthrough(&self, url: &str) -> MaterializedAsset {
        match self.fetch(url).await {
            Ok(asset) => asset,
            Err(e) => {
                warn!(url = %truncate(url, 120), error = %e, "materialization failed; keeping remote URL");
                MaterializedAsset::passthrough(url)
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, MaterializeError> {
        let mut resp = self.http.get(url).send().await?.error_for_status()?;
        if resp
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(MaterializeError::TooLarge { limit: self.max_bytes });
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(MaterializeError::TooLarge { limit: self.max_bytes });
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

/// `rest` is everything after `data:`, e.g. `image/png;base64,iVBOR...`.
fn decode_data_url(rest: &str) -> Result<Vec<u8>, MaterializeError> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| MaterializeError::DataUrl("missing ',' separator".into()))?;
    if !meta.ends_with(";base64") {
        return Err(MaterializeError::DataUrl("only base64 payloads are supported".into()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| MaterializeError::DataUrl(e.to_string()))
}

/// Sniff the format and produce the JPEG derivative. CPU bound.
fn render_thumbnail(bytes: &[u8]) -> Result<(&'static str, Vec<u8>), MaterializeError> {
    let format = image::guess_format(bytes)?;
    let ext = format.extensions_str().first().copied().unwrap_or("png");
    let img = image::load_from_memory_with_format(bytes, format)?;

    let resized = if img.width() > THUMB_WIDTH {
        let height = ((u64::from(img.height()) * u64::from(THUMB_WIDTH)) / u64::from(img.width()))
            .max(1) as u32;
        img.resize_exact(THUMB_WIDTH, height, FilterType::Triangle)
    } else {
        img
    };

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, THUMB_QUALITY);
    encoder.encode_image(&DynamicImage::ImageRgb8(resized.to_rgb8()))?;
    Ok((ext, out))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "failed to remove partial asset");
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::Router;
    use axum::http::header;
    use axum::routing::get;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgb([200u8, 40, 90]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn thumbnail_is_scaled_to_fixed_width() {
        let (ext, thumb) = render_thumbnail(&png_bytes(800, 600)).unwrap();
        assert_eq!(ext, "png");
        let decoded = image::load_from_memory_with_format(&thumb, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (400, 300));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let (_, thumb) = render_thumbnail(&png_bytes(120, 80)).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 80));
    }

    #[tokio::test]
    async fn data_urls_are_written_locally() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = Materializer::new(Client::new(), dir.path(), "/uploads/");
        let b64 = base64::engine::general_purpose::STANDARD.encode(png_bytes(10, 10));

        let asset = materializer
            .fetch(&format!("data:image/png;base64,{b64}"))
            .await
            .unwrap();
        assert!(asset.asset_url.starts_with("/uploads/ai/"));
        assert!(asset.asset_url.ends_with(".png"));
        assert!(asset.thumb_url.starts_with("/uploads/ai/thumbs/"));

        let file = asset.asset_url.trim_start_matches("/uploads/");
        assert!(dir.path().join(file).exists());
    }

    #[tokio::test]
    async fn downloads_from_remote_host() {
        let png = png_bytes(640, 320);
        let router = Router::new().route(
            "/out.png",
            get(move || {
                let png = png.clone();
                async move { ([(header::CONTENT_TYPE, "image/png")], png) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let materializer = Materializer::new(Client::new(), dir.path(), "/uploads");
        let asset = materializer
            .fetch(&format!("http://{addr}/out.png"))
            .await
            .unwrap();
        let thumb = asset.thumb_url.trim_start_matches("/uploads/");
        let decoded = image::open(dir.path().join(thumb)).unwrap();
        assert_eq!(decoded.width(), 400);

        let capped = Materializer::new(Client::new(), dir.path(), "/uploads").with_max_bytes(16);
        let err = capped
            .fetch(&format!("http://{addr}/out.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, MaterializeError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn unreachable_url_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = Materializer::new(Client::new(), dir.path(), "/uploads");
        let url = "http://127.0.0.1:9/missing.png";
        let asset = materializer.materialize_or_passthrough(url).await;
        assert_eq!(asset, MaterializedAsset::passthrough(url));
    }
}

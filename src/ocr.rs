use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::OcrConfig;
use crate::utils::find_tesseract_executable;
use crate::{Result, ScoutError};

#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    /// Text recognized in an encoded (PNG/JPEG) image.
    async fn recognize(&self, image: &[u8]) -> Result<String>;
}

/// OCR through the `tesseract` command line tool, one child process per image tile.
pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
    tile_height: u32,
    timeout: Duration,
}

impl TesseractOcr {
    pub fn from_config(config: &OcrConfig) -> Self {
        let binary = config
            .tesseract_path
            .clone()
            .or_else(find_tesseract_executable)
            .unwrap_or_else(|| PathBuf::from("tesseract"));

        Self {
            binary,
            language: config.language.clone(),
            tile_height: config.tile_height,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    async fn recognize_tile(&self, png: Vec<u8>) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command
            .args(["stdin", "stdout", "-l", self.language.as_str(), "--psm", "6"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ScoutError::RecognitionFailed(format!(
                "tesseract not found at {}",
                self.binary.display()
            )),
            _ => ScoutError::RecognitionFailed(format!("failed to start tesseract: {}", e)),
        })?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&png).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let (fed, output) = tokio::time::timeout(self.timeout, async move {
            tokio::join!(feed, child.wait_with_output())
        })
        .await
        .map_err(|_| {
            ScoutError::RecognitionFailed(format!(
                "tesseract timed out after {}s",
                self.timeout.as_secs()
            ))
        })?;

        let output = output
            .map_err(|e| ScoutError::RecognitionFailed(format!("tesseract failed: {}", e)))?;
        if let Err(e) = fed {
            tracing::debug!(error = %e, "Writing image to tesseract failed");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScoutError::RecognitionFailed(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String> {
        let tiles = prepare_tiles(image, self.tile_height)?;
        tracing::debug!(tiles = tiles.len(), binary = %self.binary.display(), "Running OCR");

        let mut text = String::new();
        for tile in tiles {
            let recognized = self.recognize_tile(tile).await?;
            text.push_str(recognized.trim_end());
            text.push('\n');
        }
        Ok(text)
    }
}

/// Grayscale the image and cut it into PNG strips no taller than `tile_height`.
pub fn prepare_tiles(image: &[u8], tile_height: u32) -> Result<Vec<Vec<u8>>> {
    let decoded = image::load_from_memory(image)
        .map_err(|e| ScoutError::RecognitionFailed(format!("undecodable page image: {}", e)))?;
    let gray = DynamicImage::ImageLuma8(decoded.to_luma8());

    let (width, height) = (gray.width(), gray.height());
    let step = tile_height.max(1);
    let mut tiles = Vec::with_capacity(height.div_ceil(step) as usize);
    let mut top = 0;

    while top < height {
        let strip = step.min(height - top);
        let mut buffer = Cursor::new(Vec::new());
        gray.crop_imm(0, top, width, strip)
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| ScoutError::RecognitionFailed(format!("failed to encode tile: {}", e)))?;
        tiles.push(buffer.into_inner());
        top += strip;
    }

    Ok(tiles)
}

use crate::{Result, ScoutError};
use std::path::PathBuf;

pub fn find_chrome_executable() -> Result<PathBuf> {
    first_existing(chrome_locations())
        .or_else(|| find_in_path(&["google-chrome", "chromium", "chromium-browser", "chrome"]))
        .ok_or_else(|| {
            ScoutError::ContextAcquisition(
                "Could not find Chrome/Chromium executable. Please specify with --chrome-path"
                    .into(),
            )
        })
}

pub fn find_tesseract_executable() -> Option<PathBuf> {
    first_existing(tesseract_locations()).or_else(|| find_in_path(&["tesseract"]))
}

fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|p| p.exists())
}

fn find_in_path(binaries: &[&str]) -> Option<PathBuf> {
    binaries.iter().find_map(|binary| {
        let name = if cfg!(windows) {
            format!("{}.exe", binary)
        } else {
            binary.to_string()
        };
        which::which(name).ok()
    })
}

#[cfg(target_os = "macos")]
fn chrome_locations() -> Vec<PathBuf> {
    [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(target_os = "linux")]
fn chrome_locations() -> Vec<PathBuf> {
    [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/headless-shell/headless-shell",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(target_os = "windows")]
fn chrome_locations() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = [
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Ok(local_app_data) = std::env::var("LOCALAPPDATA") {
        paths.push(
            PathBuf::from(local_app_data)
                .join("Google")
                .join("Chrome")
                .join("Application")
                .join("chrome.exe"),
        );
    }
    paths
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn chrome_locations() -> Vec<PathBuf> {
    Vec::new()
}

fn tesseract_locations() -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe")]
    } else {
        [
            "/usr/bin/tesseract",
            "/usr/local/bin/tesseract",
            "/opt/homebrew/bin/tesseract",
        ]
        .iter()
        .map(PathBuf::from)
        .collect()
    }
}

/// Resolves when the process receives SIGINT/SIGTERM (Ctrl+C on Windows).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down..."),
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
                }
            }
            _ => {
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received Ctrl+C, shutting down...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_existing_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("chrome");
        std::fs::write(&present, b"").unwrap();

        let found = first_existing(vec![dir.path().join("missing"), present.clone()]);
        assert_eq!(found, Some(present));
    }

    #[test]
    fn test_first_existing_none() {
        assert!(first_existing(vec![PathBuf::from("/no/such/binary")]).is_none());
    }
}

use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tokio::{sync::Semaphore, time::timeout};
use tracing::{debug, info, warn};

use super::{is_url, TrackResolver};
use crate::{audio::track::Track, error::ResolutionError};

const AUDIO_FORMAT: &str = "bestaudio[abr<=320]/bestaudio[ext=webm]/bestaudio[ext=m4a]/bestaudio/best";
const UNKNOWN_TITLE: &str = "Unknown Title";

/// Sorts yt-dlp stderr into the resolution error taxonomy.
struct FailureClassifier {
    age: Regex,
    region: Regex,
    network: Regex,
}

impl FailureClassifier {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            age: Regex::new(r"(?i)sign in to confirm your age|age[- ]restricted|inappropriate for some users")?,
            region: Regex::new(r"(?i)available in your country|geo[- ]?restrict|blocked it in your country")?,
            network: Regex::new(
                r"(?i)unable to download|http error|timed out|connection (reset|refused)|name or service not known|network is unreachable",
            )?,
        })
    }

    fn classify(&self, stderr: &str) -> ResolutionError {
        if self.age.is_match(stderr) {
            return ResolutionError::Restricted("age".into());
        }
        if self.region.is_match(stderr) {
            return ResolutionError::Restricted("region".into());
        }

        let last_line = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("yt-dlp exited with an error")
            .trim()
            .to_string();

        if self.network.is_match(stderr) {
            ResolutionError::Network(last_line)
        } else {
            ResolutionError::Extractor(last_line)
        }
    }
}

/// Resolves queries through the `yt-dlp` executable.
pub struct YtDlpResolver {
    binary: String,
    timeout: Duration,
    // Limit concurrent extractor processes to avoid rate limiting
    rate_limiter: Semaphore,
    classifier: FailureClassifier,
}

/// The subset of `yt-dlp --dump-json` we read.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    url: Option<String>,
    title: Option<String>,
    webpage_url: Option<String>,
    entries: Option<Vec<YtDlpInfo>>,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Result<Self, regex::Error> {
        Ok(Self {
            binary: binary.into(),
            timeout,
            rate_limiter: Semaphore::new(3),
            classifier: FailureClassifier::new()?,
        })
    }

    fn target(query: &str) -> String {
        if is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{query}")
        }
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Track, ResolutionError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolutionError::EmptyQuery);
        }

        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolutionError::Extractor(e.to_string()))?;

        info!("🔍 Resolving: {}", query);
        let target = Self::target(query);

        let output = Command::new(&self.binary)
            .args([
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                "--default-search",
                "ytsearch",
                "--format",
                AUDIO_FORMAT,
                "--extractor-args",
                "youtube:skip=dash,hls",
                &target,
            ])
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, output)
            .await
            .map_err(|_| ResolutionError::Timeout)?
            .map_err(|e| ResolutionError::Extractor(format!("could not run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp failed for '{}': {}", query, stderr.trim());
            return Err(self.classifier.classify(&stderr));
        }

        let track = parse_track(&String::from_utf8_lossy(&output.stdout), query)?;
        debug!("✅ Resolved '{}' to {}", query, track.page_url());
        Ok(track)
    }
}

/// Builds a track from the first JSON document yt-dlp printed.
fn parse_track(stdout: &str, query: &str) -> Result<Track, ResolutionError> {
    let line = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| ResolutionError::NoResults(query.to_string()))?;

    let mut info: YtDlpInfo = serde_json::from_str(line)
        .map_err(|e| ResolutionError::Extractor(format!("unreadable yt-dlp output: {e}")))?;

    if let Some(entries) = info.entries.take() {
        info = entries
            .into_iter()
            .next()
            .ok_or_else(|| ResolutionError::NoResults(query.to_string()))?;
    }

    let title = info.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let stream_url = info
        .url
        .ok_or_else(|| ResolutionError::MissingStreamUrl(title.clone()))?;
    let page_url = info.webpage_url.unwrap_or_else(|| query.to_string());

    Ok(Track::new(stream_url, title, page_url))
}

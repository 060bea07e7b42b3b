pub mod youtube;

use async_trait::async_trait;

use crate::{audio::track::Track, error::ResolutionError};

pub use youtube::YtDlpResolver;

/// Turns a search query or media-page URL into a playable [`Track`].
///
/// Implementations only fetch metadata and a streamable URL, never the
/// payload, and do not retry: the user reissues `play` if they want another
/// attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Track, ResolutionError>;
}

/// Whether `query` should be handed to the extractor as-is rather than
/// searched for.
pub fn is_url(query: &str) -> bool {
    url::Url::parse(query)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_detection() {
        assert!(is_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_url("http://youtu.be/dQw4w9WgXcQ"));
        assert!(!is_url("never gonna give you up"));
        assert!(!is_url("ftp://files.example.com/song.mp3"));
        assert!(!is_url("youtube.com/watch?v=abc"));
    }
}

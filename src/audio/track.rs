/// A resolved, playable audio reference.
///
/// Produced once by a resolver and never mutated afterwards; whichever queue
/// slot holds it owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    stream_url: String,
    title: String,
    page_url: String,
}

impl Track {
    pub fn new(
        stream_url: impl Into<String>,
        title: impl Into<String>,
        page_url: impl Into<String>,
    ) -> Self {
        Self {
            stream_url: stream_url.into(),
            title: title.into(),
            page_url: page_url.into(),
        }
    }

    /// Direct media URL handed to the audio transport
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Canonical page the track was found on
    pub fn page_url(&self) -> &str {
        &self.page_url
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)
    }
}

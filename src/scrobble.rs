use crate::{Result, ScrobbleError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A single play of a track, ready to be submitted to Last.fm.
///
/// Artist and track names are validated when the scrobble is created, and the
/// value cannot be changed afterwards: optional metadata is attached with the
/// consuming `with_*` builders.
///
/// # Examples
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use lastfm_scrobble::Scrobble;
/// use std::time::Duration;
///
/// let played_at = Utc.with_ymd_and_hms(2024, 3, 1, 20, 15, 0).unwrap();
/// let scrobble = Scrobble::new("Radiohead", "Paranoid Android", played_at)?
///     .with_album("OK Computer")
///     .with_duration(Duration::from_secs(387));
///
/// assert_eq!(scrobble.artist(), "Radiohead");
/// assert_eq!(scrobble.album(), Some("OK Computer"));
/// assert!(Scrobble::new("", "Paranoid Android", played_at).is_err());
/// # Ok::<(), lastfm_scrobble::ScrobbleError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawScrobble")]
pub struct Scrobble {
    artist: String,
    track: String,
    album: Option<String>,
    album_artist: Option<String>,
    played_at: DateTime<Utc>,
    duration: Option<Duration>,
}

/// Unvalidated wire form, used so deserialization goes through [`Scrobble::new`].
#[derive(Deserialize)]
struct RawScrobble {
    artist: String,
    track: String,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    album_artist: Option<String>,
    played_at: DateTime<Utc>,
    #[serde(default)]
    duration: Option<Duration>,
}

impl TryFrom<RawScrobble> for Scrobble {
    type Error = ScrobbleError;

    fn try_from(raw: RawScrobble) -> Result<Self> {
        let mut scrobble = Scrobble::new(raw.artist, raw.track, raw.played_at)?;
        scrobble.album = non_empty(raw.album);
        scrobble.album_artist = non_empty(raw.album_artist);
        scrobble.duration = raw.duration;
        Ok(scrobble)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Scrobble {
    /// Create a scrobble, rejecting empty artist or track names.
    pub fn new(
        artist: impl Into<String>,
        track: impl Into<String>,
        played_at: DateTime<Utc>,
    ) -> Result<Self> {
        let artist = artist.into();
        let track = track.into();

        if artist.trim().is_empty() {
            return Err(ScrobbleError::Validation(
                "artist name must not be empty".to_string(),
            ));
        }
        if track.trim().is_empty() {
            return Err(ScrobbleError::Validation(
                "track name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            artist,
            track,
            album: None,
            album_artist: None,
            played_at,
            duration: None,
        })
    }

    /// Set the album. An empty name leaves the album unset.
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = non_empty(Some(album.into()));
        self
    }

    /// Set the album artist. An empty name leaves the album artist unset.
    pub fn with_album_artist(mut self, album_artist: impl Into<String>) -> Self {
        self.album_artist = non_empty(Some(album_artist.into()));
        self
    }

    /// Set how long the track played.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    pub fn album_artist(&self) -> Option<&str> {
        self.album_artist.as_deref()
    }

    pub fn played_at(&self) -> DateTime<Utc> {
        self.played_at
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

impl fmt::Display for Scrobble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.track)?;
        if let Some(album) = &self.album {
            write!(f, " [{album}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn played_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_rejects_empty_names() {
        assert!(matches!(
            Scrobble::new("", "Track", played_at()),
            Err(ScrobbleError::Validation(_))
        ));
        assert!(matches!(
            Scrobble::new("Artist", "   ", played_at()),
            Err(ScrobbleError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_optional_fields_are_unset() {
        let scrobble = Scrobble::new("Artist", "Track", played_at())
            .unwrap()
            .with_album("")
            .with_album_artist("  ");

        assert_eq!(scrobble.album(), None);
        assert_eq!(scrobble.album_artist(), None);
    }

    #[test]
    fn test_display() {
        let scrobble = Scrobble::new("The Beatles", "Come Together", played_at())
            .unwrap()
            .with_album("Abbey Road");
        assert_eq!(
            format!("{scrobble}"),
            "The Beatles - Come Together [Abbey Road]"
        );

        let single = Scrobble::new("The Beatles", "Yesterday", played_at()).unwrap();
        assert_eq!(format!("{single}"), "The Beatles - Yesterday");
    }

    #[test]
    fn test_deserialize_validates() {
        let valid = r#"{"artist":"Wilco","track":"Jesus, Etc.","album":"","played_at":"2024-01-01T12:00:00Z"}"#;
        let scrobble: Scrobble = serde_json::from_str(valid).unwrap();
        assert_eq!(scrobble.track(), "Jesus, Etc.");
        assert_eq!(scrobble.album(), None);

        let invalid = r#"{"artist":"","track":"Jesus, Etc.","played_at":"2024-01-01T12:00:00Z"}"#;
        assert!(serde_json::from_str::<Scrobble>(invalid).is_err());
    }
}

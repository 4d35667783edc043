//! Host capabilities the front ends depend on but do not implement
//!
//! Speech-to-text and map tiles are provided by the host environment. Each is
//! a trait with a stub implementation so front ends run headless.

use crate::domain::company::GeoPoint;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    #[error("Voice input is not supported on this host.")]
    Unsupported,
    #[error("Voice error: {0}")]
    Recognition(String),
}

/// Captures one utterance and returns its transcript
#[async_trait]
pub trait SpeechInput: Send + Sync {
    fn is_available(&self) -> bool;

    async fn listen_once(&self) -> Result<String, SpeechError>;
}

/// No speech support; users type the company name instead
pub struct NoSpeech;

#[async_trait]
impl SpeechInput for NoSpeech {
    fn is_available(&self) -> bool {
        false
    }

    async fn listen_once(&self) -> Result<String, SpeechError> {
        Err(SpeechError::Unsupported)
    }
}

/// Fixed transcript, for demos and tests
pub struct CannedSpeech(pub String);

#[async_trait]
impl SpeechInput for CannedSpeech {
    fn is_available(&self) -> bool {
        true
    }

    async fn listen_once(&self) -> Result<String, SpeechError> {
        Ok(self.0.clone())
    }
}

/// A map that can center on a point and show a single marker
pub trait MapWidget: Send {
    fn show_marker(&mut self, point: &GeoPoint, popup: &str);
    fn clear(&mut self);
}

/// Map that only remembers what it was asked to show
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingMap {
    pub marker: Option<(GeoPoint, String)>,
    pub redraws: usize,
}

#[cfg(test)]
impl MapWidget for RecordingMap {
    fn show_marker(&mut self, point: &GeoPoint, popup: &str) {
        // A new marker replaces the previous one
        self.marker = Some((point.clone(), popup.to_string()));
        self.redraws += 1;
    }

    fn clear(&mut self) {
        self.marker = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_speech_is_unsupported() {
        let speech = NoSpeech;
        assert!(!speech.is_available());
        assert_eq!(speech.listen_once().await, Err(SpeechError::Unsupported));
    }

    #[tokio::test]
    async fn test_canned_speech_returns_transcript() {
        let speech = CannedSpeech("Acme Pty Ltd".to_string());
        assert!(speech.is_available());
        assert_eq!(speech.listen_once().await.as_deref(), Ok("Acme Pty Ltd"));
    }

    #[test]
    fn test_recording_map_replaces_marker() {
        let mut map = RecordingMap::default();
        let a = GeoPoint { lat: 1.0, lon: 2.0, label: "a".to_string() };
        let b = GeoPoint { lat: 3.0, lon: 4.0, label: "b".to_string() };
        map.show_marker(&a, "A");
        map.show_marker(&b, "B");
        assert_eq!(map.marker, Some((b, "B".to_string())));
        assert_eq!(map.redraws, 2);
    }
}

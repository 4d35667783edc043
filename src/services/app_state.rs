//! Front-end state for one lookup session
//!
//! Owned by the UI loop. All mutation goes through methods so the status
//! line, busy flag, result panel and map marker cannot drift apart.

use crate::domain::company::CompanyRecord;
use crate::domain::inference::{safe_query, MAX_QUERY_CHARS};
use crate::io::capabilities::{MapWidget, SpeechError};
use crate::io::error::LookupError;
use crate::services::render::ResultView;

pub const SEARCHING: &str = "Searching for head office and contract details…";
pub const FOUND: &str = "Found details.";
pub const SPEECH_UNAVAILABLE: &str = "Voice-to-text unavailable; you can still type the company name.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub message: String,
    pub tone: Tone,
}

pub struct AppState<M: MapWidget> {
    input: String,
    status: StatusLine,
    busy: bool,
    listening: bool,
    speech_available: bool,
    result: Option<ResultView>,
    map: M,
}

impl<M: MapWidget> AppState<M> {
    pub fn new(map: M, speech_available: bool) -> Self {
        let mut state = Self {
            input: String::new(),
            status: StatusLine { message: String::new(), tone: Tone::Info },
            busy: false,
            listening: false,
            speech_available,
            result: None,
            map,
        };
        if !speech_available {
            state.set_status(SPEECH_UNAVAILABLE, Tone::Warn);
        }
        state
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn speech_available(&self) -> bool {
        self.speech_available
    }

    /// The result panel; `None` while hidden
    pub fn result(&self) -> Option<&ResultView> {
        self.result.as_ref()
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn set_status(&mut self, message: impl Into<String>, tone: Tone) {
        self.status = StatusLine { message: message.into(), tone };
    }

    /// Typing is ignored while a search is in flight
    pub fn push_char(&mut self, c: char) {
        if !self.busy && self.input.chars().count() < MAX_QUERY_CHARS {
            self.input.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        if !self.busy {
            self.input.pop();
        }
    }

    pub fn clear_input(&mut self) {
        if !self.busy {
            self.input.clear();
        }
    }

    /// Validate the input and enter the busy state. Returns the sanitized
    /// query to search for, or `None` when nothing should be sent.
    pub fn begin_search(&mut self) -> Option<String> {
        if self.busy {
            return None;
        }
        let query = safe_query(&self.input);
        if query.is_empty() {
            self.set_status(LookupError::EmptyQuery.to_string(), Tone::Warn);
            return None;
        }
        self.busy = true;
        self.result = None;
        self.set_status(SEARCHING, Tone::Info);
        Some(query)
    }

    /// Leave the busy state with the outcome of the search
    pub fn finish_search(&mut self, outcome: Result<CompanyRecord, LookupError>) {
        self.busy = false;
        match outcome {
            Ok(record) => {
                let view = ResultView::from_record(&record);
                view.apply_map(&mut self.map);
                self.result = Some(view);
                self.set_status(FOUND, Tone::Info);
            }
            Err(e) => {
                self.result = None;
                self.set_status(e.to_string(), Tone::Warn);
            }
        }
    }

    /// Start a voice capture. `false` when speech is unavailable or busy.
    pub fn begin_listening(&mut self) -> bool {
        if !self.speech_available {
            self.set_status(SpeechError::Unsupported.to_string(), Tone::Warn);
            return false;
        }
        if self.busy || self.listening {
            return false;
        }
        self.listening = true;
        self.set_status("Listening for company name…", Tone::Info);
        true
    }

    /// Apply a transcript. On success the transcript becomes the input and
    /// the search starts; the returned query is what to send.
    pub fn finish_listening(&mut self, outcome: Result<String, SpeechError>) -> Option<String> {
        self.listening = false;
        match outcome {
            Ok(transcript) if !transcript.trim().is_empty() => {
                self.input = safe_query(&transcript);
                let query = self.begin_search()?;
                self.set_status(format!("Captured: “{query}”. Searching…"), Tone::Info);
                Some(query)
            }
            Ok(_) => {
                self.set_status("Stopped listening.", Tone::Info);
                None
            }
            Err(e) => {
                self.set_status(e.to_string(), Tone::Warn);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::company::GeoPoint;
    use crate::io::capabilities::RecordingMap;
    use crate::io::registry::mock_entity;
    use crate::services::lookup::build_record;

    fn typed(text: &str) -> AppState<RecordingMap> {
        let mut state = AppState::new(RecordingMap::default(), true);
        text.chars().for_each(|c| state.push_char(c));
        state
    }

    #[test]
    fn test_no_speech_sets_warning() {
        let state = AppState::new(RecordingMap::default(), false);
        assert_eq!(state.status().message, SPEECH_UNAVAILABLE);
        assert_eq!(state.status().tone, Tone::Warn);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let mut state = typed("   ");
        assert_eq!(state.begin_search(), None);
        assert!(!state.is_busy());
        assert_eq!(state.status().message, "Please provide a company name.");
    }

    #[test]
    fn test_search_lifecycle() {
        let mut state = typed("  Acme  ");
        assert_eq!(state.begin_search().as_deref(), Some("Acme"));
        assert!(state.is_busy());
        assert_eq!(state.status().message, SEARCHING);

        // Busy: second submit and typing are ignored
        assert_eq!(state.begin_search(), None);
        state.push_char('x');
        assert_eq!(state.input(), "  Acme  ");

        let geo = GeoPoint { lat: -33.8, lon: 151.2, label: "Sydney".to_string() };
        state.finish_search(Ok(build_record(mock_entity("Acme"), "Australia", Some(geo))));
        assert!(!state.is_busy());
        assert_eq!(state.status().message, FOUND);
        assert_eq!(state.result().map(|r| r.name.as_str()), Some("Acme"));
        assert!(state.map().marker.is_some());
    }

    #[test]
    fn test_failed_search_hides_result() {
        let mut state = typed("Acme");
        state.begin_search();
        state.finish_search(Ok(build_record(mock_entity("Acme"), "", None)));

        state.begin_search();
        assert!(state.result().is_none());
        state.finish_search(Err(LookupError::NoMatch("No matching company found.".to_string())));
        assert!(state.result().is_none());
        assert_eq!(state.status().message, "No matching company found.");
        assert_eq!(state.status().tone, Tone::Warn);
    }

    #[test]
    fn test_transcript_starts_search() {
        let mut state = typed("");
        assert!(state.begin_listening());
        assert!(state.is_listening());

        let query = state.finish_listening(Ok("Acme Pty Ltd".to_string()));
        assert_eq!(query.as_deref(), Some("Acme Pty Ltd"));
        assert_eq!(state.input(), "Acme Pty Ltd");
        assert!(state.is_busy());
        assert!(state.status().message.starts_with("Captured:"));
    }

    #[test]
    fn test_listening_unavailable() {
        let mut state = AppState::new(RecordingMap::default(), false);
        assert!(!state.begin_listening());
        assert_eq!(state.status().message, "Voice input is not supported on this host.");
    }
}

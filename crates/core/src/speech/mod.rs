use crate::{Result, SessionToken};

/// Speech synthesis backend driven by the engine.
///
/// Implementations report progress back through
/// [`LipSyncEngine::handle`](crate::LipSyncEngine::handle), tagging every
/// callback with the token they were given so superseded sessions can be
/// told apart from the current one.
pub trait SpeechTransport {
    /// Starts speaking `text` on behalf of `token`.
    fn speak(&mut self, token: SessionToken, text: &str) -> Result<()>;

    /// Stops the utterance started for `token`. Called at most once per token.
    fn cancel(&mut self, token: SessionToken);
}

impl<T: SpeechTransport + ?Sized> SpeechTransport for Box<T> {
    fn speak(&mut self, token: SessionToken, text: &str) -> Result<()> {
        (**self).speak(token, text)
    }

    fn cancel(&mut self, token: SessionToken) {
        (**self).cancel(token)
    }
}

/// A request handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub token: SessionToken,
    pub text: String,
}

/// Transport that records requests instead of producing audio. The caller
/// plays the part of the synthesizer by feeding start/end events back into
/// the engine, which makes it useful for headless runs and tests.
#[derive(Debug, Default, Clone)]
pub struct LoopbackTransport {
    requests: Vec<SpeechRequest>,
    cancelled: Vec<SessionToken>,
    fail_next: Option<String>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next [`speak`](SpeechTransport::speak) call fail with `reason`.
    pub fn fail_next(&mut self, reason: impl Into<String>) {
        self.fail_next = Some(reason.into());
    }

    pub fn requests(&self) -> &[SpeechRequest] {
        &self.requests
    }

    pub fn last_request(&self) -> Option<&SpeechRequest> {
        self.requests.last()
    }

    pub fn cancelled(&self) -> &[SessionToken] {
        &self.cancelled
    }
}

impl SpeechTransport for LoopbackTransport {
    fn speak(&mut self, token: SessionToken, text: &str) -> Result<()> {
        if let Some(reason) = self.fail_next.take() {
            return Err(crate::LipSyncError::transport(reason));
        }
        self.requests.push(SpeechRequest {
            token,
            text: text.to_string(),
        });
        Ok(())
    }

    fn cancel(&mut self, token: SessionToken) {
        self.cancelled.push(token);
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    BlendShapeAnimator, EngineConfig, MorphTargetHost, PlaybackClock, SequenceGenerator,
    SpeechTransport, VisemeEvent, VisemeTimeline,
};

/// Identity of one speak request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(u64);

impl SessionToken {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No timeline; frames always resolve to silence.
    Idle,
    /// Timeline generated and clock armed, waiting for audio to start.
    Armed,
    /// Audio is playing and frames follow the timeline.
    Playing,
}

/// Inputs accepted by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Speak(String),
    PlaybackStarted(SessionToken),
    PlaybackEnded(SessionToken),
    PlaybackFailed { token: SessionToken, reason: String },
}

/// What a single event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A new session is armed; `preempted` names the session it replaced.
    Armed {
        token: SessionToken,
        preempted: Option<SessionToken>,
    },
    Playing(SessionToken),
    Ended(SessionToken),
    Errored(SessionToken),
    /// Blank text stopped the live session without starting a new one.
    Cancelled(SessionToken),
    /// Stale token, wrong state, or blank text with nothing to stop.
    Ignored,
}

/// How a session finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishOutcome {
    Ended,
    Errored(String),
}

/// Signals for the messaging or UI layer, drained with
/// [`LipSyncEngine::drain_notices`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionNotice {
    /// Speaking finished. Emitted exactly once per session that was not
    /// preempted.
    Finished {
        token: SessionToken,
        outcome: FinishOutcome,
    },
    /// The session was cancelled by a newer speak request.
    Cancelled { token: SessionToken },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Armed,
    Playing,
}

/// The single in-flight utterance.
#[derive(Debug, Clone)]
struct PlaybackSession {
    token: SessionToken,
    timeline: VisemeTimeline,
    clock: PlaybackClock,
    phase: Phase,
}

/// Lip-sync engine: owns the session, generator and animator, and talks to
/// one speech transport.
#[derive(Debug)]
pub struct LipSyncEngine<T> {
    generator: SequenceGenerator,
    animator: BlendShapeAnimator,
    transport: T,
    session: Option<PlaybackSession>,
    next_token: u64,
    notices: Vec<SessionNotice>,
}

impl<T: SpeechTransport> LipSyncEngine<T> {
    pub fn new(config: EngineConfig, transport: T) -> Self {
        let EngineConfig {
            generation,
            animator,
        } = config;
        Self::with_parts(
            SequenceGenerator::new(generation),
            BlendShapeAnimator::new(animator),
            transport,
        )
    }

    pub fn with_parts(
        generator: SequenceGenerator,
        animator: BlendShapeAnimator,
        transport: T,
    ) -> Self {
        Self {
            generator,
            animator,
            transport,
            session: None,
            next_token: 1,
            notices: Vec::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn state(&self) -> SessionState {
        match self.session.as_ref().map(|session| session.phase) {
            None => SessionState::Idle,
            Some(Phase::Armed) => SessionState::Armed,
            Some(Phase::Playing) => SessionState::Playing,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_token(&self) -> Option<SessionToken> {
        self.session.as_ref().map(|session| session.token)
    }

    /// Read-only view of the current timeline; empty when idle.
    pub fn timeline_snapshot(&self) -> VisemeTimeline {
        self.session
            .as_ref()
            .map(|session| session.timeline.clone())
            .unwrap_or_default()
    }

    pub fn drain_notices(&mut self) -> Vec<SessionNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn speak(&mut self, text: &str, now_ms: u64) -> Transition {
        self.handle(SessionEvent::Speak(text.to_string()), now_ms)
    }

    pub fn playback_started(&mut self, token: SessionToken, now_ms: u64) -> Transition {
        self.handle(SessionEvent::PlaybackStarted(token), now_ms)
    }

    pub fn playback_ended(&mut self, token: SessionToken, now_ms: u64) -> Transition {
        self.handle(SessionEvent::PlaybackEnded(token), now_ms)
    }

    pub fn playback_failed(
        &mut self,
        token: SessionToken,
        reason: impl Into<String>,
        now_ms: u64,
    ) -> Transition {
        self.handle(
            SessionEvent::PlaybackFailed {
                token,
                reason: reason.into(),
            },
            now_ms,
        )
    }

    /// Applies one event to the state machine.
    pub fn handle(&mut self, event: SessionEvent, now_ms: u64) -> Transition {
        match event {
            SessionEvent::Speak(text) => self.begin(&text, now_ms),
            SessionEvent::PlaybackStarted(token) => {
                let Some(session) = self.live_session_mut(token) else {
                    return ignored(token, "playback start");
                };
                session.clock.arm(now_ms);
                session.phase = Phase::Playing;
                tracing::debug!(%token, "speech playback started");
                Transition::Playing(token)
            }
            SessionEvent::PlaybackEnded(token) => {
                if self.live_session_mut(token).is_none() {
                    return ignored(token, "playback end");
                }
                self.finish(token, FinishOutcome::Ended);
                Transition::Ended(token)
            }
            SessionEvent::PlaybackFailed { token, reason } => {
                if self.live_session_mut(token).is_none() {
                    return ignored(token, "playback error");
                }
                tracing::warn!(%token, %reason, "speech playback failed");
                self.finish(token, FinishOutcome::Errored(reason));
                Transition::Errored(token)
            }
        }
    }

    /// Viseme the mouth should be showing at `now_ms`, without animating.
    pub fn active_viseme(&self, now_ms: u64) -> VisemeEvent {
        match &self.session {
            Some(session) if session.phase == Phase::Playing => {
                session.timeline.select(session.clock.elapsed(now_ms))
            }
            _ => VisemeEvent::silence(),
        }
    }

    /// Per-frame entry point: selects the active viseme and eases the host's
    /// weights toward it. Returns the event that was applied.
    pub fn on_frame<H>(&mut self, now_ms: u64, host: &mut H) -> VisemeEvent
    where
        H: MorphTargetHost + ?Sized,
    {
        let active = self.active_viseme(now_ms);
        self.animator
            .tick(&active, self.is_active(), now_ms, host);
        active
    }

    fn begin(&mut self, text: &str, now_ms: u64) -> Transition {
        if text.trim().is_empty() {
            return match self.cancel_live() {
                Some(token) => Transition::Cancelled(token),
                None => {
                    tracing::debug!("ignoring blank speak request");
                    Transition::Ignored
                }
            };
        }

        let preempted = self.cancel_live();

        let token = SessionToken::new(self.next_token);
        self.next_token += 1;

        let timeline = self.generator.generate(text);
        let mut clock = PlaybackClock::new();
        clock.arm(now_ms);
        self.session = Some(PlaybackSession {
            token,
            timeline,
            clock,
            phase: Phase::Armed,
        });

        if let Err(err) = self.transport.speak(token, text) {
            tracing::warn!(%token, error = %err, "speech transport rejected request");
            self.finish(token, FinishOutcome::Errored(err.to_string()));
            return Transition::Errored(token);
        }

        tracing::info!(%token, chars = text.len(), "speech session armed");
        Transition::Armed { token, preempted }
    }

    fn cancel_live(&mut self) -> Option<SessionToken> {
        let previous = self.session.take()?;
        tracing::info!(token = %previous.token, "cancelling in-flight speech");
        self.transport.cancel(previous.token);
        self.notices.push(SessionNotice::Cancelled {
            token: previous.token,
        });
        Some(previous.token)
    }

    fn finish(&mut self, token: SessionToken, outcome: FinishOutcome) {
        self.session = None;
        tracing::info!(%token, ?outcome, "speech session finished");
        self.notices.push(SessionNotice::Finished { token, outcome });
    }

    fn live_session_mut(&mut self, token: SessionToken) -> Option<&mut PlaybackSession> {
        self.session
            .as_mut()
            .filter(|session| session.token == token)
    }
}

fn ignored(token: SessionToken, what: &str) -> Transition {
    tracing::debug!(%token, what, "ignoring callback for stale session");
    Transition::Ignored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AvatarScene, GenerationConfig, LoopbackTransport, VisemeId};

    const HEAD: &str = "Wolf3D_Head";

    fn engine() -> LipSyncEngine<LoopbackTransport> {
        let config = EngineConfig {
            generation: GenerationConfig::deterministic(),
            ..EngineConfig::default()
        };
        LipSyncEngine::new(config, LoopbackTransport::new())
    }

    fn armed_token(transition: Transition) -> SessionToken {
        match transition {
            Transition::Armed { token, .. } => token,
            other => panic!("expected armed, got {other:?}"),
        }
    }

    #[test]
    fn idle_engine_yields_silence() {
        let mut engine = engine();
        let mut scene = AvatarScene::ready_player_me();

        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(engine.on_frame(0, &mut scene), VisemeEvent::silence());
        assert!(engine.timeline_snapshot().is_empty());
    }

    #[test]
    fn full_lifecycle_notifies_once() {
        let mut engine = engine();
        let token = armed_token(engine.speak("HI", 0));
        assert_eq!(engine.state(), SessionState::Armed);
        assert_eq!(engine.transport().last_request().unwrap().text, "HI");

        // nothing moves until audio starts
        assert!(engine.active_viseme(50).viseme.is_silence());

        assert_eq!(engine.playback_started(token, 1_000), Transition::Playing(token));
        assert_eq!(engine.state(), SessionState::Playing);
        assert_eq!(engine.active_viseme(1_000).viseme, VisemeId::I);
        assert_eq!(engine.active_viseme(1_150).viseme, VisemeId::I);
        assert!(engine.active_viseme(1_290).viseme.is_silence());
        assert!(engine.active_viseme(5_000).viseme.is_silence());

        assert_eq!(engine.playback_ended(token, 1_400), Transition::Ended(token));
        assert_eq!(engine.playback_ended(token, 1_410), Transition::Ignored);
        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(
            engine.drain_notices(),
            vec![SessionNotice::Finished {
                token,
                outcome: FinishOutcome::Ended
            }]
        );
        assert!(engine.drain_notices().is_empty());
    }

    #[test]
    fn preemption_cancels_previous_session_once() {
        let mut engine = engine();
        let mut scene = AvatarScene::ready_player_me();

        let first = armed_token(engine.speak("hello there", 0));
        engine.playback_started(first, 10);
        engine.on_frame(20, &mut scene);

        let second = match engine.speak("bye", 100) {
            Transition::Armed { token, preempted } => {
                assert_eq!(preempted, Some(first));
                token
            }
            other => panic!("expected armed, got {other:?}"),
        };
        assert_ne!(first, second);
        assert_eq!(engine.state(), SessionState::Armed);
        assert_eq!(engine.transport().cancelled(), &[first]);
        assert_eq!(
            engine.drain_notices(),
            vec![SessionNotice::Cancelled { token: first }]
        );

        // late callbacks for the first session are dropped
        assert_eq!(engine.playback_started(first, 120), Transition::Ignored);
        assert_eq!(engine.playback_ended(first, 130), Transition::Ignored);
        assert_eq!(engine.playback_failed(first, "late", 140), Transition::Ignored);
        assert_eq!(engine.current_token(), Some(second));
        assert_eq!(engine.state(), SessionState::Armed);
        assert!(engine.drain_notices().is_empty());
        assert_eq!(engine.transport().cancelled().len(), 1);
    }

    #[test]
    fn playback_error_returns_to_idle() {
        let mut engine = engine();
        let token = armed_token(engine.speak("oops", 0));
        engine.playback_started(token, 0);

        assert_eq!(
            engine.playback_failed(token, "audio device lost", 50),
            Transition::Errored(token)
        );
        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(
            engine.drain_notices(),
            vec![SessionNotice::Finished {
                token,
                outcome: FinishOutcome::Errored("audio device lost".to_string())
            }]
        );
    }

    #[test]
    fn transport_rejection_is_recovered_locally() {
        let mut engine = engine();
        engine.transport_mut().fail_next("no voices");

        let transition = engine.speak("hello", 0);
        assert!(matches!(transition, Transition::Errored(_)));
        assert_eq!(engine.state(), SessionState::Idle);

        let notices = engine.drain_notices();
        assert_eq!(notices.len(), 1);
        assert!(matches!(
            &notices[0],
            SessionNotice::Finished {
                outcome: FinishOutcome::Errored(reason),
                ..
            } if reason.contains("no voices")
        ));
    }

    #[test]
    fn blank_text_is_ignored() {
        let mut engine = engine();
        assert_eq!(engine.speak("   ", 0), Transition::Ignored);
        assert!(engine.transport().requests().is_empty());
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn blank_text_cancels_live_session() {
        let mut engine = engine();
        let token = armed_token(engine.speak("hello", 0));
        engine.playback_started(token, 10);

        assert_eq!(engine.speak(" \n\t", 50), Transition::Cancelled(token));
        assert_eq!(engine.state(), SessionState::Idle);
        assert_eq!(engine.transport().cancelled(), &[token]);
        assert_eq!(engine.transport().requests().len(), 1);
        assert!(engine.active_viseme(60).viseme.is_silence());
        assert!(engine.timeline_snapshot().is_empty());

        assert_eq!(engine.playback_ended(token, 900), Transition::Ignored);
        assert_eq!(engine.speak("", 950), Transition::Ignored);
        assert_eq!(engine.transport().cancelled(), &[token]);
        assert_eq!(
            engine.drain_notices(),
            vec![SessionNotice::Cancelled { token }]
        );
    }

    #[test]
    fn letterless_text_plays_silence_and_finishes_once() {
        let mut engine = engine();
        let mut scene = AvatarScene::ready_player_me();
        let token = armed_token(engine.speak("123 !", 0));
        assert!(engine.timeline_snapshot().is_empty());

        engine.playback_started(token, 0);
        assert_eq!(engine.state(), SessionState::Playing);
        for now in (0..200).step_by(16) {
            assert_eq!(engine.on_frame(now, &mut scene), VisemeEvent::silence());
        }

        assert_eq!(engine.playback_ended(token, 200), Transition::Ended(token));
        assert_eq!(engine.playback_ended(token, 210), Transition::Ignored);
        assert_eq!(
            engine.drain_notices(),
            vec![SessionNotice::Finished {
                token,
                outcome: FinishOutcome::Ended
            }]
        );
    }

    #[test]
    fn restart_signal_rearms_the_clock() {
        let mut engine = engine();
        let token = armed_token(engine.speak("go", 0));
        engine.playback_started(token, 500);

        // G holds for 120ms from the start signal, not from the speak call
        assert_eq!(engine.active_viseme(600).viseme, VisemeId::KK);
        assert_eq!(engine.active_viseme(620).viseme, VisemeId::O);
    }

    #[test]
    fn frames_drive_weights_and_release_after_end() {
        let mut engine = engine();
        let mut scene = AvatarScene::ready_player_me();
        let token = armed_token(engine.speak("ma", 0));
        engine.playback_started(token, 0);

        for now in (0..100).step_by(16) {
            let active = engine.on_frame(now, &mut scene);
            assert_eq!(active.viseme, VisemeId::PP);
        }
        let peak = scene.weight(HEAD, "viseme_PP").unwrap();
        assert!(peak > 0.5);

        engine.playback_ended(token, 100);
        let mut previous = peak;
        for now in (100..300).step_by(16) {
            engine.on_frame(now, &mut scene);
            let value = scene.weight(HEAD, "viseme_PP").unwrap();
            assert!(value < previous);
            previous = value;
        }
    }

    #[test]
    fn snapshot_survives_session_teardown() {
        let mut engine = engine();
        let token = armed_token(engine.speak("GO BIG", 0));
        let snapshot = engine.timeline_snapshot();
        engine.playback_ended(token, 10);

        assert_eq!(snapshot.len(), 7);
        assert!(engine.timeline_snapshot().is_empty());
    }
}

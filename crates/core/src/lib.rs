//! Core library for the avatar lip-sync engine.
//!
//! Text goes in through [`LipSyncEngine::speak`]; the [`SequenceGenerator`]
//! turns it into a [`VisemeTimeline`], the session's [`PlaybackClock`] tracks
//! how far audio has progressed, and every render frame
//! [`LipSyncEngine::on_frame`] selects the active viseme and lets the
//! [`BlendShapeAnimator`] ease the host's morph weights toward it.
//!
//! Rendering, audio synthesis and message delivery stay outside the crate,
//! behind the [`MorphTargetHost`] and [`SpeechTransport`] traits.

pub mod animator;
pub mod config;
pub mod error;
pub mod mapping;
pub mod phoneme;
pub mod scene;
pub mod sequence;
pub mod session;
pub mod speech;
pub mod timeline;

pub use animator::{BlendShapeAnimator, MorphTargetHost, MorphWeightMap};
pub use config::{AnimatorConfig, EngineConfig, GenerationConfig, IntensityPolicy, Segmentation};
pub use error::{LipSyncError, Result};
pub use mapping::{MeshBinding, MeshRole, WeightUpdate};
pub use phoneme::{PhonemeTable, VisemeId};
pub use scene::{AvatarScene, MorphMesh};
pub use sequence::SequenceGenerator;
pub use session::{
    FinishOutcome, LipSyncEngine, SessionEvent, SessionNotice, SessionState, SessionToken,
    Transition,
};
pub use speech::{LoopbackTransport, SpeechRequest, SpeechTransport};
pub use timeline::{select, PlaybackClock, VisemeEvent, VisemeTimeline};

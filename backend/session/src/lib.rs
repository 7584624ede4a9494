//! Real-time session orchestration.
//!
//! A session is admitted under the concurrency cap, gets a renderer built on
//! the blocking pool, negotiates its peer transport and receives commands
//! until a terminal connectivity change tears it down exactly once.

pub mod admission;
pub mod codec;
pub mod dispatcher;
pub mod factory;
pub mod lifecycle;
pub mod manager;
pub mod negotiator;
pub mod registry;
pub mod responder;

#[cfg(test)]
mod test_support;

pub use admission::{random_session_id, AdmissionController};
pub use codec::{apply_codec_preferences, order_codec_preferences, DEFAULT_VIDEO_CODEC_PRIORITY};
pub use dispatcher::{Command, CommandDispatcher, Dispatched};
pub use factory::{BuildRequest, RendererConstructor, RendererFactory, StandardConstructor};
pub use lifecycle::SessionLifecycle;
pub use manager::{OfferAnswer, SessionManager, SessionSettings};
pub use negotiator::{next_state, CleanupLatch, NegotiationEvent, NegotiationState, Negotiator, TransitionError};
pub use registry::{RegistryError, SessionRegistry, SessionSummary, Teardown};
pub use responder::{EchoResponder, OpenAiResponder};

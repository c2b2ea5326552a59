//! The transport-free SMTP protocol core: reply/command framing, the
//! envelope model, scene hosting, and the conversation engine that ties
//! them together.

pub mod command;
pub mod engine;
pub mod envelope;
pub mod reply;
pub mod scene;

pub use engine::{ConversationState, Engine, NoopSink, Sink, Validation};
pub use envelope::Envelope;
pub use reply::Reply;
pub use scene::{Scene, SceneHandle};

//! The scene hosting contract.
//!
//! A "scene" is a pluggable sub-dialog — authentication being the
//! motivating example — that temporarily takes over line handling from
//! the main command dispatcher. The engine owns the active scene while
//! it's running, but has no idea what it actually does.
//!
//! Scenes are only ever handed a narrow [`SceneHandle`] capability
//! rather than a full back-reference to the engine: the one thing a
//! scene is allowed to do to the engine is tell it the sub-dialog is
//! finished.

use crate::core::reply::Reply;

/// The one operation a [`Scene`] is allowed to perform on the engine
/// hosting it: signal that the scene is done and line handling should
/// return to normal command dispatch.
pub trait SceneHandle {
    /// Ends the active scene and returns the engine to
    /// `ConversationState::CommandsExchange`.
    fn set_commands_exchange(&mut self);
}

/// A pluggable sub-dialog hosted by the protocol engine.
///
/// Implementations are constructed by a host-supplied factory (keyed by
/// scene name, e.g. `AUTH_PLAIN`) and own line handling for as long as
/// the engine's state is `CustomScene`.
pub trait Scene {
    /// Called once, with the raw line that triggered the scene (e.g.
    /// the full `AUTH PLAIN ...` command line) and a handle back into
    /// the engine. May call `handle.set_commands_exchange()` if the
    /// mechanism completes in a single round trip.
    fn start(&mut self, initial_line: &str, handle: &mut dyn SceneHandle) -> Reply;

    /// Called for every subsequent line while this scene is active.
    fn read_and_write_reply(&mut self, line: &str, handle: &mut dyn SceneHandle) -> Reply;

    /// Called by the engine when the scene is being torn down, to let
    /// it release any resources it's holding. Has no bearing on engine
    /// state — that transition already happened via `SceneHandle`.
    fn finish(&mut self) {}
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// A scene double used by the engine's own tests to exercise the
    /// hosting contract without a real authentication mechanism.
    pub struct MockScene {
        pub rounds: u32,
        pub finish_after: u32,
    }

    impl Scene for MockScene {
        fn start(&mut self, _initial_line: &str, _handle: &mut dyn SceneHandle) -> Reply {
            crate::core::reply::auth_credentials("go ahead")
        }

        fn read_and_write_reply(&mut self, _line: &str, handle: &mut dyn SceneHandle) -> Reply {
            self.rounds += 1;
            if self.rounds >= self.finish_after {
                handle.set_commands_exchange();
                crate::core::reply::auth_ok()
            } else {
                crate::core::reply::auth_credentials("continue")
            }
        }
    }

    /// A scene double that completes in a single round trip, entirely
    /// inside `start()` — the case `spec.md`'s AUTH contract explicitly
    /// allows for mechanisms that need no further client input.
    pub struct OneShotScene {
        pub finished: std::rc::Rc<std::cell::Cell<bool>>,
    }

    impl Scene for OneShotScene {
        fn start(&mut self, _initial_line: &str, handle: &mut dyn SceneHandle) -> Reply {
            handle.set_commands_exchange();
            crate::core::reply::auth_ok()
        }

        fn read_and_write_reply(&mut self, _line: &str, _handle: &mut dyn SceneHandle) -> Reply {
            crate::core::reply::auth_ok()
        }

        fn finish(&mut self) {
            self.finished.set(true);
        }
    }
}

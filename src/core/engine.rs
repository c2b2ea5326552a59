//! The protocol engine: owns the conversation state, parses and
//! dispatches commands, drives the `DATA` accumulator, hosts scenes,
//! and enforces the validation limits configured for the session.
//!
//! This is deliberately transport-free — it consumes already-framed
//! lines (CRLF expected but not required to still be attached) and
//! produces [`Reply`] values. Writing those replies to a socket, timing
//! out idle connections, and upgrading to TLS are the host's job.

use crate::core::envelope::Envelope;
use crate::core::reply::{self, Reply};
use crate::core::scene::{Scene, SceneHandle};
use log::Level;

/// Which stage of the rfc5321 conversation the engine is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// Normal command/reply exchange (the default state).
    CommandsExchange,
    /// `HELO`/`EHLO` has been answered and auth mechanisms are
    /// configured; only `AUTH` is accepted until a scene completes.
    WaitingAuth,
    /// `DATA` has been acknowledged; lines are being accumulated into
    /// the envelope body until the `CRLF.CRLF` terminator is seen.
    Data,
    /// A hosted [`Scene`] owns line handling (e.g. an in-progress
    /// `AUTH` exchange).
    CustomScene,
}

/// Line-length and receiver-count limits enforced by the engine. `0`
/// disables the corresponding check.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validation {
    pub max_line_length: usize,
    pub max_receivers: usize,
}

/// A sink the engine reports diagnostic events to. Injected at
/// construction time instead of relying on a process-wide logger
/// singleton, so the engine stays usable (and testable) without any
/// logging backend configured.
pub trait Sink: Send {
    fn log(&self, level: Level, message: &str);
}

/// A [`Sink`] that discards everything. The engine's default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl Sink for NoopSink {
    fn log(&self, _level: Level, _message: &str) {}
}

type SceneFactory = dyn Fn(&str) -> Option<Box<dyn Scene>> + Send + Sync;
type MessageReceived = dyn FnMut(&Envelope) -> Result<String, String> + Send;

/// Owns one client conversation end to end. Single-threaded, strictly
/// synchronous: every call to [`Engine::handle_line`] returns
/// immediately with either a [`Reply`] or `None` (no reply yet, only
/// possible mid-`DATA`).
pub struct Engine {
    hostname: String,
    validation: Validation,
    supported_auth_mechanisms: Vec<String>,
    scene_factory: Option<Box<SceneFactory>>,
    message_received: Option<Box<MessageReceived>>,
    sink: Box<dyn Sink>,

    state: ConversationState,
    envelope: Envelope,
    data_buffer: String,
    current_scene: Option<Box<dyn Scene>>,
}

impl Engine {
    /// Creates a new engine for a single conversation, in
    /// `CommandsExchange` state with a fresh envelope.
    pub fn new(hostname: impl Into<String>, validation: Validation) -> Self {
        Engine {
            hostname: hostname.into(),
            validation,
            supported_auth_mechanisms: Vec::new(),
            scene_factory: None,
            message_received: None,
            sink: Box::new(NoopSink),
            state: ConversationState::CommandsExchange,
            envelope: Envelope::new(),
            data_buffer: String::new(),
            current_scene: None,
        }
    }

    /// Configures the ordered list of auth mechanisms this engine
    /// requires after `HELO`/`EHLO`. An empty list (the default)
    /// disables the auth requirement entirely.
    pub fn with_auth_mechanisms(mut self, mechanisms: Vec<String>) -> Self {
        self.supported_auth_mechanisms = mechanisms;
        self
    }

    /// Registers the factory the engine uses to instantiate scenes by
    /// name (`AUTH_<MECH>`). A factory returning `None` for a given
    /// name causes `AUTH` to reply `502`.
    pub fn with_scene_factory(
        mut self,
        factory: impl Fn(&str) -> Option<Box<dyn Scene>> + Send + Sync + 'static,
    ) -> Self {
        self.scene_factory = Some(Box::new(factory));
        self
    }

    /// Registers the callback invoked synchronously once a `DATA`
    /// phase completes. Returns the id under which the message was
    /// stored, or an error message on failure.
    pub fn with_message_received(
        mut self,
        callback: impl FnMut(&Envelope) -> Result<String, String> + Send + 'static,
    ) -> Self {
        self.message_received = Some(Box::new(callback));
        self
    }

    /// Replaces the diagnostic sink. Defaults to [`NoopSink`].
    pub fn with_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// The engine's current conversation state.
    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// The envelope being assembled for the current transaction.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Produces the initial `220` welcome banner. `identification` is
    /// an optional secondary descriptor concatenated after the
    /// hostname (empty segments are omitted, never leaving stray
    /// whitespace).
    pub fn welcome(&mut self, identification: &str) -> Reply {
        self.state = ConversationState::CommandsExchange;

        let hostname = self.hostname.trim();
        let identification = identification.trim();

        let mut banner = String::new();
        if !hostname.is_empty() {
            banner.push_str(hostname);
            banner.push(' ');
        }
        if !identification.is_empty() {
            banner.push_str(identification);
            banner.push(' ');
        }
        banner.push_str("Service ready");

        reply::service_ready(banner)
    }

    /// Feeds one client-supplied line (CRLF already stripped by the
    /// caller is fine; trailing CRLF is also tolerated) into the
    /// engine. Returns `None` only while still accumulating `DATA`
    /// content — every other path returns a `Reply` to send back.
    pub fn handle_line(&mut self, line: &str) -> Option<Reply> {
        if self.validation.max_line_length > 0 && line.len() > self.validation.max_line_length {
            return Some(reply::line_too_long());
        }

        match self.state {
            ConversationState::CustomScene => Some(self.dispatch_scene_line(line)),
            ConversationState::Data => self.accumulate_data(line),
            ConversationState::CommandsExchange | ConversationState::WaitingAuth => {
                Some(self.dispatch_command(line))
            }
        }
    }

    fn dispatch_scene_line(&mut self, line: &str) -> Reply {
        let mut scene = match self.current_scene.take() {
            Some(scene) => scene,
            None => return reply::command_not_implemented(),
        };

        let reply = scene.read_and_write_reply(line, self);

        if self.state == ConversationState::CustomScene {
            self.current_scene = Some(scene);
        } else {
            scene.finish();
        }

        reply
    }

    fn accumulate_data(&mut self, line: &str) -> Option<Reply> {
        self.data_buffer.push_str(line);
        self.data_buffer.push_str("\r\n");

        if !self.data_buffer.ends_with("\r\n.\r\n") {
            return None;
        }

        self.data_buffer = self.data_buffer.replace("\r\n..", "\r\n.");
        let body = self
            .data_buffer
            .strip_suffix("\r\n.\r\n")
            .unwrap_or(&self.data_buffer)
            .to_string();

        self.state = ConversationState::CommandsExchange;
        self.sink.log(Level::Debug, "end of DATA, storing message");

        let reply = match &mut self.message_received {
            None => {
                self.sink.log(Level::Error, "no message-received callback configured");
                reply::exceeded_storage("No storage backend")
            }
            Some(callback) => match self.envelope.set_origin(body) {
                Err(e) => {
                    self.sink.log(Level::Error, &format!("error storing message origin: {e}"));
                    reply::exceeded_storage("Unable to store message")
                }
                Ok(()) => match callback(&self.envelope) {
                    Ok(stored_id) => reply::ok(vec![format!("Ok: queued as {stored_id}")]),
                    Err(e) => {
                        self.sink.log(Level::Error, &format!("error storing message: {e}"));
                        reply::exceeded_storage("Unable to store message")
                    }
                },
            },
        };

        self.reset();
        Some(reply)
    }

    fn dispatch_command(&mut self, line: &str) -> Reply {
        let line = line.trim_end_matches(['\r', '\n']);
        let command = crate::core::command::Command::parse(line);

        self.sink.log(
            Level::Debug,
            &format!("handling command verb={:?} args={:?}", command.verb, command.args),
        );

        if self.state == ConversationState::WaitingAuth && command.verb != "AUTH" {
            return reply::auth_failed("");
        }

        match command.verb.as_str() {
            "HELO" => self.cmd_helo(&command.args),
            "EHLO" => self.cmd_ehlo(&command.args),
            "AUTH" => self.cmd_auth(&command.args, line),
            "MAIL" => self.cmd_mail(&command.args),
            "RCPT" => self.cmd_rcpt(&command.args),
            "DATA" => {
                self.state = ConversationState::Data;
                reply::mail_data()
            }
            "RSET" => {
                self.reset();
                reply::ok(vec![String::new()])
            }
            "QUIT" => reply::bye(),
            _ => reply::unrecognised_command(),
        }
    }

    fn cmd_helo(&mut self, args: &str) -> Reply {
        self.envelope.helo = args.to_string();
        self.state = if self.supported_auth_mechanisms.is_empty() {
            ConversationState::CommandsExchange
        } else {
            ConversationState::WaitingAuth
        };
        reply::ok(vec![format!("Hello {args}")])
    }

    fn cmd_ehlo(&mut self, args: &str) -> Reply {
        self.envelope.helo = args.to_string();
        let mut lines = vec![format!("Hello {args}"), "PIPELINING".to_string()];

        if self.supported_auth_mechanisms.is_empty() {
            self.state = ConversationState::CommandsExchange;
        } else {
            self.state = ConversationState::WaitingAuth;
            lines.push(format!("AUTH {}", self.supported_auth_mechanisms.join(" ")));
        }

        reply::ok(lines)
    }

    fn cmd_auth(&mut self, args: &str, raw_line: &str) -> Reply {
        let mechanism = args.split(' ').next().unwrap_or("").to_string();

        if mechanism.is_empty() || !self.supported_auth_mechanisms.contains(&mechanism) {
            return reply::command_not_implemented();
        }

        let factory = match &self.scene_factory {
            Some(factory) => factory,
            None => return reply::command_not_implemented(),
        };

        let scene_name = format!("AUTH_{mechanism}");
        let mut scene = match factory(&scene_name) {
            Some(scene) => scene,
            None => return reply::command_not_implemented(),
        };

        self.state = ConversationState::CustomScene;
        let reply = scene.start(raw_line, self);

        if self.state == ConversationState::CustomScene {
            self.current_scene = Some(scene);
        } else {
            scene.finish();
        }

        reply
    }

    fn cmd_mail(&mut self, args: &str) -> Reply {
        match extract_path(args, "From") {
            None => reply::mailbox_unavailable("Invalid syntax in MAIL command"),
            Some(path) => match crate::message::parse_mailbox(&path) {
                Err(e) => reply::mailbox_unavailable(e.to_string()),
                Ok(address) => {
                    self.envelope.from = Some(address.clone());
                    reply::ok(vec![format!("Sender {address} ok")])
                }
            },
        }
    }

    fn cmd_rcpt(&mut self, args: &str) -> Reply {
        if self.validation.max_receivers > 0 && self.envelope.to.len() >= self.validation.max_receivers
        {
            return reply::exceeded_storage("Maximum receivers extended");
        }

        match extract_path(args, "To") {
            // Preserved verbatim: the upstream protocol's RCPT syntax
            // error also names "MAIL" in its reply text.
            None => reply::mailbox_unavailable("Invalid syntax in MAIL command"),
            Some(path) => match crate::message::parse_mailbox(&path) {
                Err(e) => reply::mailbox_unavailable(e.to_string()),
                Ok(address) => {
                    self.envelope.to.push(address.clone());
                    reply::ok(vec![format!("Receiver {address} ok")])
                }
            },
        }
    }

    fn reset(&mut self) {
        self.envelope = Envelope::new();
        self.data_buffer.clear();
        self.state = ConversationState::CommandsExchange;
    }
}

impl SceneHandle for Engine {
    fn set_commands_exchange(&mut self) {
        self.state = ConversationState::CommandsExchange;
    }
}

/// Finds a case-insensitive `keyword:` marker anywhere in `args` and
/// returns the non-empty, whitespace-trimmed text following it, e.g.
/// `extract_path(" FROM:<a@b>", "From") == Some("<a@b>")`.
fn extract_path(args: &str, keyword: &str) -> Option<String> {
    let lower = args.to_ascii_lowercase();
    let needle = format!("{}:", keyword.to_ascii_lowercase());
    let pos = lower.find(&needle)?;
    let rest = args[pos + needle.len()..].trim_start();
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

#[path = "tests/engine_tests.rs"]
#[cfg(test)]
mod tests;

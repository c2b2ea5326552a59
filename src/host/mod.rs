//! Binds the transport-free protocol engine to real TCP sockets.
//!
//! Keeps the socket code entirely separate from protocol logic: every
//! byte the client sends is framed into a line here and handed to
//! `core::engine::Engine::handle_line`, which is the only thing that
//! decides what happens next.

use crate::config::Config;
use crate::core::engine::{Engine, Validation};
use crate::core::scene::Scene;
use crate::webhook::WebhookClient;
use anyhow::Result;
use log::{error, info, trace};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

type SceneFactory = dyn Fn(&str) -> Option<Box<dyn Scene>> + Send + Sync;

/// The SMTP server instance: owns the listening socket configuration
/// and the shared collaborators every connection's engine is wired to.
pub struct Server {
    config: Config,
    webhook_client: Arc<WebhookClient>,
    scene_factory: Option<Arc<SceneFactory>>,
}

impl Server {
    /// Creates a new `Server`, wiring its engines' message-received
    /// callback to `webhook_client`. No auth scenes are attached by
    /// default — use [`Server::with_scene_factory`] to add one.
    pub fn new(config: Config, webhook_client: Arc<WebhookClient>) -> Self {
        Server {
            config,
            webhook_client,
            scene_factory: None,
        }
    }

    /// Attaches the factory used to instantiate scenes (e.g. for `AUTH`)
    /// for every connection's engine.
    pub fn with_scene_factory(
        mut self,
        factory: impl Fn(&str) -> Option<Box<dyn Scene>> + Send + Sync + 'static,
    ) -> Self {
        self.scene_factory = Some(Arc::new(factory));
        self
    }

    /// Runs the main SMTP server loop.
    ///
    /// Binds to the configured SMTP address and port, then enters an infinite loop
    /// accepting incoming TCP connections. Each connection is handled in a separate
    /// Tokio task.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the server fails to bind to the specified address and port.
    /// Errors during connection acceptance or handling are logged but do not terminate
    /// the server loop.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.smtp_bind_address, self.config.smtp_port);
        let listener = TcpListener::bind(&addr).await?;

        info!("SMTP server listening on {}", addr);

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    info!("New connection from: {}", peer_addr);

                    let hostname = self.config.hostname.clone();
                    let validation = Validation {
                        max_line_length: self.config.max_line_length,
                        max_receivers: self.config.max_receivers,
                    };
                    let auth_mechanisms = self.config.supported_auth_mechanisms.clone();
                    let webhook_client = Arc::clone(&self.webhook_client);
                    let scene_factory = self.scene_factory.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(
                            stream,
                            hostname,
                            validation,
                            auth_mechanisms,
                            webhook_client,
                            scene_factory,
                        )
                        .await
                        {
                            error!("Error handling SMTP connection from {}: {:#?}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {:?}", e);
                }
            }
        }
    }
}

/// Handles a single SMTP client connection end to end: constructs one
/// engine for the connection's lifetime, sends the welcome banner, then
/// loops reading CRLF-framed lines and feeding them to the engine,
/// writing back whatever `Reply` it produces.
async fn handle_connection(
    stream: TcpStream,
    hostname: String,
    validation: Validation,
    auth_mechanisms: Vec<String>,
    webhook_client: Arc<WebhookClient>,
    scene_factory: Option<Arc<SceneFactory>>,
) -> Result<()> {
    let mut engine = Engine::new(hostname, validation)
        .with_auth_mechanisms(auth_mechanisms)
        .with_message_received(move |envelope| {
            let webhook_client = Arc::clone(&webhook_client);
            let envelope = envelope.clone();
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current()
                    .block_on(async move { webhook_client.forward(&envelope).await })
            })
            .map_err(|e| e.to_string())
        });

    if let Some(factory) = scene_factory {
        engine = engine.with_scene_factory(move |name| factory(name));
    }

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let greeting = engine.welcome("");
    write_reply(&mut writer, &greeting).await?;

    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            info!("Connection closed by client (EOF).");
            break;
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        trace!("Received line (len {}): {:?}", trimmed.len(), trimmed);

        if let Some(reply) = engine.handle_line(trimmed) {
            let is_bye = reply.code() == 221;
            write_reply(&mut writer, &reply).await?;
            if is_bye {
                break;
            }
        }
    }

    info!("Closing connection.");
    Ok(())
}

async fn write_reply(
    writer: &mut (impl AsyncWriteExt + Unpin),
    reply: &crate::core::reply::Reply,
) -> Result<()> {
    for line in reply.format() {
        writer.write_all(line.as_bytes()).await?;
    }
    writer.flush().await?;
    Ok(())
}

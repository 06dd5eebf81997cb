use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use filekeep_core::{Notification, NotificationKind, NotificationSink, WatchTarget};
use filekeep_extract::ContentExtractor;
use filekeep_llm::HttpClassifier;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::config::AgentConfig;
use crate::error::{AgentError, WatchError};
use crate::pipeline::IntakePipeline;
use crate::token::AgentToken;
use crate::upload::HttpUploader;
use crate::watcher::WatcherManager;

type TargetsReply = oneshot::Sender<Result<Vec<WatchTarget>, WatchError>>;

enum WatchCommand {
    Add(PathBuf, TargetsReply),
    Remove(PathBuf, TargetsReply),
    Shutdown,
}

/// Handle for changing the watch set of a running agent.
///
/// Commands are queued until monitoring has started.
#[derive(Debug, Clone)]
pub struct WatchControl {
    commands: mpsc::UnboundedSender<WatchCommand>,
}

impl WatchControl {
    /// Start watching `directory` too. Returns the new target set.
    pub async fn add(&self, directory: impl Into<PathBuf>) -> Result<Vec<WatchTarget>, AgentError> {
        self.request(|reply| WatchCommand::Add(directory.into(), reply))
            .await
    }

    /// Stop watching `directory`. Pending analyses for files no remaining
    /// target covers are dropped.
    pub async fn remove(
        &self,
        directory: impl Into<PathBuf>,
    ) -> Result<Vec<WatchTarget>, AgentError> {
        self.request(|reply| WatchCommand::Remove(directory.into(), reply))
            .await
    }

    /// Stop monitoring, as on ctrl-c.
    pub fn shutdown(&self) {
        let _ = self.commands.send(WatchCommand::Shutdown);
    }

    async fn request(
        &self,
        command: impl FnOnce(TargetsReply) -> WatchCommand,
    ) -> Result<Vec<WatchTarget>, AgentError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| AgentError::Stopped)?;
        Ok(response.await.map_err(|_| AgentError::Stopped)??)
    }
}

impl std::fmt::Debug for WatchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add(path, _) => f.debug_tuple("Add").field(path).finish(),
            Self::Remove(path, _) => f.debug_tuple("Remove").field(path).finish(),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Wires configuration, token, watcher and pipeline together and runs until
/// interrupted.
pub struct AgentRuntime {
    config: AgentConfig,
    sink: Arc<dyn NotificationSink>,
    control: WatchControl,
    commands: mpsc::UnboundedReceiver<WatchCommand>,
}

impl AgentRuntime {
    pub fn new(config: AgentConfig, sink: Arc<dyn NotificationSink>) -> Self {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        Self {
            config,
            sink,
            control: WatchControl {
                commands: commands_tx,
            },
            commands,
        }
    }

    /// A handle for changing the watch set while [`AgentRuntime::run`] is
    /// running.
    pub fn control(&self) -> WatchControl {
        self.control.clone()
    }

    /// Load the agent token, polling the token file until one appears.
    /// Monitoring does not start without it.
    pub async fn wait_for_token(&self) -> Result<AgentToken, AgentError> {
        let path = &self.config.agent.token_path;
        let poll = Duration::from_secs(self.config.agent.token_poll_seconds.max(1));
        let mut requested = false;
        loop {
            if let Some(token) = AgentToken::load(path).await? {
                return Ok(token);
            }
            if !requested {
                self.sink.notify(Notification::error(
                    NotificationKind::Status,
                    format!(
                        "Agent token not found. Run `filekeep-agent set-token <TOKEN>` or write it to {}.",
                        path.display()
                    ),
                ));
                requested = true;
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub async fn run(mut self) -> Result<(), AgentError> {
        let classifier_config = match self.config.classifier.to_classifier_config() {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "cannot start monitoring");
                self.sink.notify(Notification::error(
                    NotificationKind::Status,
                    format!("Error: {e}"),
                ));
                return Err(e.into());
            }
        };

        let token = self.wait_for_token().await?;
        self.sink.notify(Notification::info(
            NotificationKind::Status,
            "Agent token found, monitoring starting...",
        ));

        let extractor = ContentExtractor::new().with_char_limit(self.config.pipeline.text_char_limit);
        let classifier = Arc::new(HttpClassifier::new(classifier_config)?);
        let uploader = Arc::new(HttpUploader::new(
            &self.config.upload.endpoint,
            token,
            Duration::from_secs(self.config.upload.timeout_seconds),
        )?);
        let pipeline = Arc::new(
            IntakePipeline::new(extractor, classifier, uploader, Arc::clone(&self.sink))
                .with_threshold(self.config.pipeline.upload_threshold)
                .with_debounce(self.config.watch.debounce()),
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut watcher = WatcherManager::new(events_tx, Arc::clone(&self.sink))
            .with_poll_interval(self.config.watch.poll_interval())
            .with_hidden_files(self.config.watch.include_hidden)
            .with_pipeline(Arc::clone(&pipeline));
        let targets = watcher.start(self.config.watch.directories.iter().cloned())?;
        for target in &targets {
            info!(path = %target.path.display(), active = target.active, "watch target");
        }
        self.sink.notify(Notification::info(
            NotificationKind::Status,
            "Monitoring started...",
        ));

        let task = tokio::spawn(Arc::clone(&pipeline).run(events_rx));

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                res = &mut ctrl_c => {
                    if let Err(e) = res {
                        error!(error = %e, "failed to listen for shutdown signal");
                    }
                    break;
                }
                Some(command) = self.commands.recv() => match command {
                    WatchCommand::Add(dir, reply) => {
                        info!(path = %dir.display(), "adding watch directory");
                        let _ = reply.send(watcher.add(dir));
                    }
                    WatchCommand::Remove(dir, reply) => {
                        info!(path = %dir.display(), "removing watch directory");
                        let _ = reply.send(watcher.remove(&dir));
                    }
                    WatchCommand::Shutdown => break,
                },
            }
        }
        info!("shutting down");
        watcher.stop();
        drop(watcher);
        task.abort();
        Ok(())
    }
}

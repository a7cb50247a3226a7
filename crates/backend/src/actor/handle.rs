//! Handle for talking to the PCH manager actor.
//!
//! Cheap to clone. Also serves as the [`PathWatcherNotifier`] so watcher
//! callbacks land in the actor's mailbox.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::message::{PchManagerMessage, PchManagerStatus};
use crate::{
  capability::PathWatcherNotifier,
  domain::{
    dependency::ProjectChunkId,
    project_part::{ProjectPartContainer, ProjectPartIds},
  },
  store::GeneratedFile,
};

#[derive(Clone, Debug)]
pub struct PchManagerHandle {
  pub tx: mpsc::Sender<PchManagerMessage>,
}

impl PchManagerHandle {
  pub fn new(tx: mpsc::Sender<PchManagerMessage>) -> Self {
    Self { tx }
  }

  pub async fn send(&self, message: PchManagerMessage) -> Result<(), SendError> {
    self.tx.send(message).await.map_err(|_| SendError::ActorGone)
  }

  pub async fn update_project_parts(
    &self,
    project_parts: Vec<ProjectPartContainer>,
    tool_chain_arguments: Vec<String>,
  ) -> Result<(), SendError> {
    self
      .send(PchManagerMessage::UpdateProjectParts {
        project_parts,
        tool_chain_arguments,
      })
      .await
  }

  pub async fn remove_project_parts(&self, project_part_ids: ProjectPartIds) -> Result<(), SendError> {
    self.send(PchManagerMessage::RemoveProjectParts { project_part_ids }).await
  }

  pub async fn update_generated_files(&self, files: Vec<GeneratedFile>) -> Result<(), SendError> {
    self.send(PchManagerMessage::UpdateGeneratedFiles { files }).await
  }

  pub async fn remove_generated_files(&self, paths: Vec<PathBuf>) -> Result<(), SendError> {
    self.send(PchManagerMessage::RemoveGeneratedFiles { paths }).await
  }

  pub async fn notify_changed_paths(&self, ids: Vec<ProjectChunkId>) -> Result<(), SendError> {
    self.send(PchManagerMessage::PathsWithIdsChanged { ids }).await
  }

  /// Ask for a status snapshot. Messages sent earlier are handled first.
  pub async fn status(&self) -> Result<PchManagerStatus, SendError> {
    let (reply, rx) = oneshot::channel();
    self.send(PchManagerMessage::Status { reply }).await?;
    rx.await.map_err(|_| SendError::ActorGone)
  }

  pub async fn shutdown(&self) -> Result<(), SendError> {
    self.send(PchManagerMessage::Shutdown).await
  }
}

impl PathWatcherNotifier for PchManagerHandle {
  fn paths_with_ids_changed(&self, ids: Vec<ProjectChunkId>) {
    // Called from the watcher's thread, never block it
    if let Err(e) = self.tx.try_send(PchManagerMessage::PathsWithIdsChanged { ids }) {
      warn!(error = %e, "Dropping path change notification");
    }
  }
}

// ============================================================================
// Errors
// ============================================================================

/// Error when sending to an actor
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
  #[error("Actor has shut down")]
  ActorGone,
}

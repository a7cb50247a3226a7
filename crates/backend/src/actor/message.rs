//! Message types for the PCH manager actor.
//!
//! Inbound [`PchManagerMessage`]s are the four notification kinds the manager
//! reacts to plus control messages. Outbound [`PchManagerEvent`]s go to the
//! embedding client.

use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::{
  domain::{
    dependency::ProjectChunkId,
    project_part::{ProjectPartContainer, ProjectPartIds},
  },
  store::GeneratedFile,
};

// ============================================================================
// Inbound
// ============================================================================

#[derive(Debug)]
pub enum PchManagerMessage {
  /// New or changed project parts, all built with `tool_chain_arguments`
  UpdateProjectParts {
    project_parts: Vec<ProjectPartContainer>,
    tool_chain_arguments: Vec<String>,
  },
  RemoveProjectParts { project_part_ids: ProjectPartIds },
  UpdateGeneratedFiles { files: Vec<GeneratedFile> },
  RemoveGeneratedFiles { paths: Vec<PathBuf> },
  /// Dependency files of these chunks changed on disk
  PathsWithIdsChanged { ids: Vec<ProjectChunkId> },
  /// Snapshot of the manager's state
  Status { reply: oneshot::Sender<PchManagerStatus> },
  Shutdown,
}

// ============================================================================
// Outbound
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PchManagerEvent {
  /// Stored PCH records for these parts are current: already up to date, just
  /// built, or removed after a failed build
  PrecompiledHeadersUpdated { project_part_ids: ProjectPartIds },
  Progress { completed: usize, total: usize },
}

/// Reply to [`PchManagerMessage::Status`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PchManagerStatus {
  pub project_parts: usize,
  pub pending_system_tasks: usize,
  pub pending_project_tasks: usize,
  pub deferred: bool,
  pub generated_files_valid: bool,
  /// No pending and no running tasks
  pub idle: bool,
}

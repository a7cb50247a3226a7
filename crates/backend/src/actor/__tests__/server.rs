//! End-to-end tests of the dispatch actor over in-memory collaborators.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;

use super::helpers::{ManagerTestContext, ids, part};
use crate::{
  actor::PchManagerEvent,
  capability::{FilePathCache, PrecompiledHeaderStorage},
  dependency::{ProjectChunkId, SourceType},
  project_part::ProjectPartId,
  store::GeneratedFile,
  testing::{FakePchCreator, Gate},
};

#[tokio::test]
async fn test_new_part_builds_system_then_project_pch() {
  let mut ctx = ManagerTestContext::new();
  let (system_header, project_header) = ctx.with_headers("app");

  ctx.update(vec![part("app")]).await;

  assert_eq!(ctx.next_updated().await, ids(&["app"]));
  ctx.wait_idle().await;

  let tasks = ctx.factory.tasks();
  assert_eq!(tasks.len(), 2);
  assert_eq!(tasks[0].includes, vec![system_header]);
  assert_eq!(tasks[0].system_pch_path, None);
  assert_eq!(tasks[1].includes, vec![project_header]);
  assert_eq!(tasks[1].system_pch_path, Some(PathBuf::from("/pchs/app.pch")));
  assert_eq!(tasks[1].tool_chain_arguments, vec!["-m64".to_string()]);

  assert_eq!(
    ctx.storage.fetch_system_precompiled_header_path(&ProjectPartId::new("app")).unwrap(),
    Some(PathBuf::from("/pchs/app.pch"))
  );
}

#[tokio::test]
async fn test_identical_resubmission_only_reports_up_to_date() {
  let mut ctx = ManagerTestContext::new();
  ctx.update(vec![part("app")]).await;
  ctx.next_updated().await;
  ctx.wait_idle().await;

  ctx.update(vec![part("app")]).await;

  assert_eq!(ctx.next_updated().await, ids(&["app"]));
  let status = ctx.wait_idle().await;
  assert_eq!(status.project_parts, 1);
  assert_eq!(ctx.factory.tasks().len(), 1);
}

#[tokio::test]
async fn test_failed_build_leaves_no_record() {
  let mut ctx = ManagerTestContext::with_creator(FakePchCreator::failing());

  ctx.update(vec![part("app")]).await;

  // The client still hears about the part so it drops the old PCH
  assert_eq!(ctx.next_updated().await, ids(&["app"]));
  ctx.wait_idle().await;

  assert!(ctx.storage.fetch_all_pch_paths().unwrap().is_empty());
}

#[tokio::test]
async fn test_progress_events_cover_all_tasks() {
  let mut ctx = ManagerTestContext::new();
  ctx.with_headers("app");

  ctx.update(vec![part("app")]).await;
  ctx.wait_tasks(2).await;
  ctx.wait_idle().await;

  let progress: Vec<(usize, usize)> = ctx
    .drain_events()
    .into_iter()
    .filter_map(|event| match event {
      PchManagerEvent::Progress { completed, total } => Some((completed, total)),
      _ => None,
    })
    .collect();
  assert_eq!(progress.last(), Some(&(2, 2)));
}

#[tokio::test]
async fn test_remove_stops_watching() {
  let mut ctx = ManagerTestContext::new();
  ctx.update(vec![part("a"), part("b")]).await;
  ctx.next_updated().await;
  ctx.wait_idle().await;

  ctx
    .manager
    .handle
    .remove_project_parts(ids(&["a"]))
    .await
    .unwrap();

  let status = ctx.wait_status(|status| status.project_parts == 1).await;
  assert!(status.idle);
  assert_eq!(ctx.watcher.removed_ids(), ids(&["a"]));
}

#[tokio::test]
async fn test_generated_files_gate_defers_updates() {
  let ctx = ManagerTestContext::new();
  let pending = GeneratedFile::new("/build/ui_main.h", None);
  ctx
    .manager
    .handle
    .update_generated_files(vec![pending])
    .await
    .unwrap();

  ctx.update(vec![part("app")]).await;

  let status = ctx.wait_status(|status| status.deferred).await;
  assert!(!status.generated_files_valid);
  assert!(ctx.factory.tasks().is_empty());

  ctx
    .manager
    .handle
    .update_generated_files(vec![GeneratedFile::new("/build/ui_main.h", Some("// ui".into()))])
    .await
    .unwrap();

  ctx.wait_tasks(1).await;
  let status = ctx.wait_idle().await;
  assert!(!status.deferred);
  assert!(status.generated_files_valid);
}

#[tokio::test]
async fn test_removing_incomplete_generated_file_releases_deferred() {
  let ctx = ManagerTestContext::new();
  ctx
    .manager
    .handle
    .update_generated_files(vec![GeneratedFile::new("/build/moc_a.cpp", None)])
    .await
    .unwrap();
  ctx.update(vec![part("app")]).await;
  ctx.wait_status(|status| status.deferred).await;

  ctx
    .manager
    .handle
    .remove_generated_files(vec![PathBuf::from("/build/moc_a.cpp")])
    .await
    .unwrap();

  ctx.wait_tasks(1).await;
  ctx.wait_idle().await;
}

#[tokio::test]
async fn test_project_header_change_rebuilds_project_pch_only() {
  let mut ctx = ManagerTestContext::new();
  ctx.with_headers("app");
  ctx.update(vec![part("app")]).await;
  ctx.next_updated().await;
  ctx.wait_idle().await;

  ctx
    .watcher
    .notify(vec![ProjectChunkId::new("app".into(), SourceType::ProjectInclude)]);

  let tasks = ctx.wait_tasks(3).await;
  ctx.wait_idle().await;
  assert_eq!(ctx.factory.tasks().len(), 3);
  assert_eq!(tasks[2].system_pch_path, Some(PathBuf::from("/pchs/app.pch")));
}

#[tokio::test]
async fn test_system_header_change_rebuilds_both() {
  let mut ctx = ManagerTestContext::new();
  ctx.with_headers("app");
  ctx.update(vec![part("app")]).await;
  ctx.next_updated().await;
  ctx.wait_idle().await;

  ctx.watcher.notify(vec![
    ProjectChunkId::new("app".into(), SourceType::SystemInclude),
    ProjectChunkId::new("app".into(), SourceType::Source),
  ]);

  ctx.wait_tasks(4).await;
  ctx.wait_idle().await;
  assert_eq!(ctx.factory.tasks().len(), 4);
}

#[tokio::test]
async fn test_change_for_unknown_part_is_ignored() {
  let ctx = ManagerTestContext::new();

  ctx
    .watcher
    .notify(vec![ProjectChunkId::new("ghost".into(), SourceType::Source)]);

  let status = ctx.wait_idle().await;
  assert_eq!(status.project_parts, 0);
  assert!(ctx.factory.tasks().is_empty());
}

#[tokio::test]
async fn test_change_during_build_is_deferred() {
  let gate = Gate::default();
  let mut ctx = ManagerTestContext::with_creator(FakePchCreator::building("/pchs").gated(gate.clone()));
  ctx.update(vec![part("app")]).await;
  ctx.wait_tasks(1).await;

  ctx
    .watcher
    .notify(vec![ProjectChunkId::new("app".into(), SourceType::Source)]);

  let status = ctx.wait_status(|status| status.deferred).await;
  assert_eq!(status.pending_project_tasks, 0);

  gate.open();

  assert_eq!(ctx.next_updated().await, ids(&["app"]));
  ctx.wait_tasks(2).await;
  let status = ctx.wait_idle().await;
  assert!(!status.deferred);
  assert_eq!(ctx.factory.tasks().len(), 2);
}

#[tokio::test]
async fn test_idle_manager_removes_unreferenced_pchs() {
  let mut ctx = ManagerTestContext::new();
  ctx.update(vec![part("app")]).await;
  ctx.next_updated().await;
  ctx.wait_idle().await;

  let kept = ctx.file_path_cache.file_path_id(Path::new("/pchs/app.pch"));
  let stale = ctx.file_path_cache.file_path_id(Path::new("/pchs/removed.pch"));
  ctx.file_system.set_entries(Path::new("/pchs"), vec![kept, stale]);

  // Any message runs another, idle, processing cycle
  ctx.wait_status(|_| true).await;
  ctx.wait_status(|_| true).await;

  assert_eq!(ctx.file_system.removed(), vec![stale]);
}

#[tokio::test]
async fn test_shutdown_stops_actor() {
  let ctx = ManagerTestContext::new();

  ctx.manager.handle.shutdown().await.unwrap();

  let handle = ctx.manager.handle.clone();
  tokio::time::timeout(std::time::Duration::from_secs(5), ctx.manager.join())
    .await
    .expect("actor did not stop");
  assert!(handle.status().await.is_err());
}

mod common;

use anyhow::Result;
use common::{write_local, MemoryTransport, Node};
use ftpsync::error::ErrorClass;
use ftpsync::gateway::MAX_REMOVE_PASSES;
use ftpsync::logger::NoopLogger;
use ftpsync::progress::SyncProgress;
use ftpsync::sync::RunPhase;
use ftpsync::{Credentials, SyncConfig, SyncError, SyncReport, SyncWarning};
use std::path::Path;

const T0: i64 = 1_700_000_000;

fn config(src: &Path) -> SyncConfig {
    SyncConfig::new("ftp.test", src, "/www")
}

fn creds() -> Credentials {
    Credentials {
        username: "deploy".into(),
        password: "secret".into(),
    }
}

fn sync(cfg: &SyncConfig, remote: &mut MemoryTransport) -> SyncReport {
    ftpsync::run(cfg, &creds(), remote, &NoopLogger, &SyncProgress::hidden())
}

#[test]
fn uploads_new_tree_into_empty_remote() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    write_local(local.path(), "sub/b.txt", 7, T0);
    let mut remote = MemoryTransport::new();

    let report = sync(&config(local.path()), &mut remote);

    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.phase, RunPhase::Done);
    assert!(report.disconnected);
    assert_eq!(report.counters.checked, 2);
    assert_eq!(report.counters.uploaded, 2);
    assert_eq!(report.counters.deleted, 0);
    assert_eq!(
        remote.nodes.get("/www/a.txt"),
        Some(&Node::File {
            size: 5,
            modified: Some(common::at(T0))
        })
    );
    assert!(remote.exists("/www/sub/b.txt"));
    assert_eq!(remote.ops_starting("MKD"), vec!["MKD /www", "MKD /www/sub"]);
    assert_eq!(remote.ops.first().map(String::as_str), Some("CONNECT ftp.test:21"));
    assert_eq!(remote.ops.last().map(String::as_str), Some("QUIT"));
    Ok(())
}

#[test]
fn unchanged_file_is_skipped() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    let mut remote = MemoryTransport::new().with_file("/www/a.txt", 5, T0 - 3600);

    let report = sync(&config(local.path()), &mut remote);

    assert!(report.is_success());
    assert_eq!(report.counters.checked, 1);
    assert_eq!(report.counters.uploaded, 0);
    assert!(remote.ops_starting("STOR").is_empty());
    Ok(())
}

#[test]
fn size_change_or_newer_remote_is_uploaded() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "resized.txt", 5, T0);
    write_local(local.path(), "newer.txt", 5, T0);
    let mut remote = MemoryTransport::new()
        .with_file("/www/resized.txt", 6, T0 - 3600)
        .with_file("/www/newer.txt", 5, T0 + 1);

    let report = sync(&config(local.path()), &mut remote);

    assert_eq!(report.counters.checked, 2);
    assert_eq!(report.counters.uploaded, 2);
    Ok(())
}

#[test]
fn second_run_sends_nothing() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    write_local(local.path(), "sub/b.txt", 7, T0);
    let mut remote = MemoryTransport::new();
    let cfg = config(local.path());

    assert_eq!(sync(&cfg, &mut remote).counters.uploaded, 2);
    let snapshot = remote.nodes.clone();
    let again = sync(&cfg, &mut remote);

    assert!(again.is_success());
    assert_eq!(again.counters.checked, 2);
    assert_eq!(again.counters.uploaded, 0);
    assert_eq!(remote.nodes, snapshot);
    Ok(())
}

#[test]
fn force_upload_ignores_remote_state() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    let mut remote = MemoryTransport::new().with_file("/www/a.txt", 5, T0 - 3600);
    let mut cfg = config(local.path());
    cfg.force_upload = true;

    let report = sync(&cfg, &mut remote);

    assert_eq!(report.counters.uploaded, 1);
    assert_eq!(remote.ops_starting("STOR"), vec!["STOR /www/a.txt"]);
    Ok(())
}

#[test]
fn time_adjustment_shifts_remote_times_by_minutes() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    // Server clock runs two minutes fast.
    let remote_at = T0 + 120;

    let mut cfg = config(local.path());
    cfg.time_adjust_minutes = -2;
    let mut remote = MemoryTransport::new().with_file("/www/a.txt", 5, remote_at);
    assert_eq!(sync(&cfg, &mut remote).counters.uploaded, 0);

    cfg.time_adjust_minutes = -1;
    let mut remote = MemoryTransport::new().with_file("/www/a.txt", 5, remote_at);
    assert_eq!(sync(&cfg, &mut remote).counters.uploaded, 1);
    Ok(())
}

#[test]
fn mirror_deletes_orphan_file() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    let mut remote = MemoryTransport::new()
        .with_file("/www/a.txt", 5, T0)
        .with_file("/www/old.txt", 3, T0);
    let mut cfg = config(local.path());
    cfg.mirror = true;

    let report = sync(&cfg, &mut remote);

    assert!(report.is_success());
    assert_eq!(report.counters.deleted, 1);
    assert!(!remote.exists("/www/old.txt"));
    assert!(remote.exists("/www/a.txt"));
    assert_eq!(remote.ops_starting("DELE"), vec!["DELE /www/old.txt"]);
    Ok(())
}

#[test]
fn orphans_survive_without_mirror() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    let mut remote = MemoryTransport::new()
        .with_file("/www/old.txt", 3, T0)
        .with_file("/www/stale/x", 1, T0);

    let report = sync(&config(local.path()), &mut remote);

    assert_eq!(report.counters.deleted, 0);
    assert!(remote.exists("/www/old.txt"));
    assert!(remote.exists("/www/stale/x"));
    Ok(())
}

#[test]
fn mirror_removes_stale_directory_tree() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    let mut remote = MemoryTransport::new()
        .with_file("/www/stale/one.txt", 1, T0)
        .with_file("/www/stale/two.txt", 2, T0);
    let mut cfg = config(local.path());
    cfg.mirror = true;

    let report = sync(&cfg, &mut remote);

    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.counters.deleted, 3);
    assert!(!remote.exists("/www/stale"));
    assert!(remote.descendants("/www/stale").is_empty());

    let removal: Vec<String> = remote
        .ops
        .iter()
        .filter(|op| op.starts_with("DELE") || op.starts_with("RMD"))
        .cloned()
        .collect();
    assert_eq!(
        removal,
        vec![
            "DELE /www/stale/one.txt",
            "DELE /www/stale/two.txt",
            "RMD /www/stale"
        ]
    );
    Ok(())
}

#[test]
fn nested_stale_tree_is_removed_bottom_up() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "keep.txt", 1, T0);
    let mut remote = MemoryTransport::new()
        .with_file("/www/old/a/b/c/deep.txt", 1, T0)
        .with_file("/www/old/a/side.txt", 1, T0)
        .with_dir("/www/old/empty");
    let mut cfg = config(local.path());
    cfg.mirror = true;

    let report = sync(&cfg, &mut remote);

    assert!(report.is_success(), "{:?}", report.error);
    // two files plus old, a, b, c and empty
    assert_eq!(report.counters.deleted, 7);
    assert!(remote.descendants("/www").iter().all(|p| p == "/www/keep.txt"));
    assert_eq!(remote.ops_starting("RMD").last().map(String::as_str), Some("RMD /www/old"));
    Ok(())
}

#[test]
fn keep_patterns_protect_remote_entries() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "index.html", 5, T0);
    let mut remote = MemoryTransport::new()
        .with_file("/www/uploads/photo.jpg", 10, T0)
        .with_file("/www/debug.log", 10, T0)
        .with_file("/www/old.txt", 3, T0);
    let mut cfg = config(local.path());
    cfg.mirror = true;
    cfg.keep = vec!["/www/uploads".into(), "*.log".into()];

    let report = sync(&cfg, &mut remote);

    assert!(report.is_success());
    assert_eq!(report.counters.deleted, 1);
    assert!(remote.exists("/www/uploads/photo.jpg"));
    assert!(remote.exists("/www/debug.log"));
    assert!(!remote.exists("/www/old.txt"));
    Ok(())
}

#[test]
fn keep_patterns_hold_inside_stale_directories() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    let mut remote = MemoryTransport::new()
        .with_file("/www/stale/debug.log", 4, T0)
        .with_file("/www/stale/x.txt", 1, T0);
    let mut cfg = config(local.path());
    cfg.mirror = true;
    cfg.keep = vec!["*.log".into()];

    let report = sync(&cfg, &mut remote);

    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.counters.deleted, 1);
    assert!(remote.exists("/www/stale/debug.log"));
    assert!(!remote.exists("/www/stale/x.txt"));
    assert!(remote.is_dir("/www/stale"));
    assert!(remote.ops_starting("RMD").is_empty());
    Ok(())
}

#[test]
fn kept_descendants_leave_their_ancestors_in_place() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    let mut remote = MemoryTransport::new()
        .with_file("/www/old/a/notes.log", 1, T0)
        .with_file("/www/old/b/z.txt", 1, T0)
        .with_file("/www/old/cache/blob.bin", 1, T0)
        .with_file("/www/old/top.txt", 1, T0);
    let mut cfg = config(local.path());
    cfg.mirror = true;
    cfg.keep = vec!["*.log".into(), "/www/old/cache".into()];

    let report = sync(&cfg, &mut remote);

    assert!(report.is_success(), "{:?}", report.error);
    // z.txt, b and top.txt
    assert_eq!(report.counters.deleted, 3);
    assert!(remote.exists("/www/old/a/notes.log"));
    assert!(remote.exists("/www/old/cache/blob.bin"));
    assert!(!remote.exists("/www/old/b"));
    assert!(!remote.exists("/www/old/top.txt"));
    assert_eq!(remote.ops_starting("RMD"), vec!["RMD /www/old/b"]);
    assert!(remote.ops_starting("CWD /www/old/cache").is_empty());
    Ok(())
}

#[test]
fn excluded_local_entries_are_neither_sent_nor_deleted() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    write_local(local.path(), "secret.env", 5, T0);
    write_local(local.path(), "node_modules/pkg/index.js", 5, T0);
    let mut remote = MemoryTransport::new().with_file("/www/secret.env", 1, T0);
    let mut cfg = config(local.path());
    cfg.mirror = true;
    cfg.exclusions = vec!["*.env".into(), "node_modules".into()];

    let report = sync(&cfg, &mut remote);

    assert!(report.is_success());
    assert_eq!(report.counters.checked, 1);
    assert_eq!(report.counters.uploaded, 1);
    assert_eq!(report.counters.deleted, 0);
    assert!(!remote.exists("/www/node_modules"));
    assert_eq!(
        remote.nodes.get("/www/secret.env"),
        Some(&Node::File {
            size: 1,
            modified: Some(common::at(T0))
        })
    );
    Ok(())
}

#[test]
fn failed_upload_is_a_warning() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    write_local(local.path(), "b.txt", 5, T0);
    let mut remote = MemoryTransport::new();
    remote.fail_put.insert("/www/a.txt".into());

    let report = sync(&config(local.path()), &mut remote);

    assert!(report.is_success());
    assert_eq!(report.counters.checked, 2);
    assert_eq!(report.counters.uploaded, 1);
    assert!(remote.exists("/www/b.txt"));
    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(&report.warnings[0], SyncWarning::Transfer { file, .. } if file.ends_with("a.txt")));
    assert!(report.warnings[0].to_string().starts_with("Cannot upload file:"));
    Ok(())
}

#[test]
fn failed_listing_is_treated_as_empty() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    let mut remote = MemoryTransport::new()
        .with_file("/www/a.txt", 5, T0)
        .with_file("/www/old.txt", 1, T0);
    remote.fail_list.insert("/www".into());
    let mut cfg = config(local.path());
    cfg.mirror = true;

    let report = sync(&cfg, &mut remote);

    assert!(report.is_success());
    // nothing known remotely: re-upload, delete nothing
    assert_eq!(report.counters.uploaded, 1);
    assert_eq!(report.counters.deleted, 0);
    assert!(remote.exists("/www/old.txt"));
    assert!(matches!(&report.warnings[..], [SyncWarning::Listing { path, .. }] if path == "/www"));
    Ok(())
}

#[test]
fn mkdir_failure_aborts_and_still_quits() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    write_local(local.path(), "sub/b.txt", 5, T0);
    write_local(local.path(), "zz/c.txt", 5, T0);
    let mut remote = MemoryTransport::new();
    remote.fail_mkdir.insert("/www/sub".into());

    let report = sync(&config(local.path()), &mut remote);

    assert!(matches!(report.error, Some(SyncError::CreateDir { ref path, .. }) if path == "/www/sub"));
    assert_eq!(report.error.as_ref().map(SyncError::class), Some(ErrorClass::RemoteStructural));
    assert_eq!(report.phase, RunPhase::ProcessingDirectories);
    assert!(report.disconnected);
    assert_eq!(report.counters.uploaded, 1);
    assert!(!remote.exists("/www/zz"));
    assert_eq!(remote.ops.last().map(String::as_str), Some("QUIT"));
    Ok(())
}

#[test]
fn delete_failure_is_fatal() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    let mut remote = MemoryTransport::new()
        .with_file("/www/locked.txt", 1, T0)
        .with_file("/www/other.txt", 1, T0);
    remote.fail_delete.insert("/www/locked.txt".into());
    let mut cfg = config(local.path());
    cfg.mirror = true;

    let report = sync(&cfg, &mut remote);

    assert!(matches!(report.error, Some(SyncError::DeleteFile { .. })));
    assert_eq!(report.counters.deleted, 0);
    assert!(remote.exists("/www/other.txt"));
    assert!(report.disconnected);
    Ok(())
}

#[test]
fn rejected_login_stops_before_any_directory_work() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    let mut remote = MemoryTransport::new();
    remote.reject_auth = true;

    let report = sync(&config(local.path()), &mut remote);

    assert!(matches!(report.error, Some(SyncError::Auth(_))));
    assert_eq!(report.error.as_ref().map(SyncError::class), Some(ErrorClass::Auth));
    assert_eq!(report.phase, RunPhase::Authenticating);
    assert_eq!(remote.ops, vec!["CONNECT ftp.test:21", "USER deploy", "QUIT"]);
    Ok(())
}

#[test]
fn refused_connection_is_reported() -> Result<()> {
    let local = tempfile::tempdir()?;
    let mut remote = MemoryTransport::new();
    remote.refuse_connect = true;

    let report = sync(&config(local.path()), &mut remote);

    assert!(matches!(report.error, Some(SyncError::Connect { port: 21, .. })));
    assert!(!report.disconnected);
    assert_eq!(remote.ops, vec!["CONNECT ftp.test:21"]);
    Ok(())
}

#[test]
fn missing_local_root_never_connects() -> Result<()> {
    let local = tempfile::tempdir()?;
    let mut remote = MemoryTransport::new();

    let report = sync(&config(&local.path().join("absent")), &mut remote);

    assert!(matches!(report.error, Some(SyncError::InvalidRoot(_))));
    assert_eq!(report.error.as_ref().map(SyncError::class), Some(ErrorClass::Config));
    assert_eq!(report.phase, RunPhase::Init);
    assert!(remote.ops.is_empty());
    Ok(())
}

#[test]
fn bad_pattern_is_a_config_error() -> Result<()> {
    let local = tempfile::tempdir()?;
    let mut remote = MemoryTransport::new();
    let mut cfg = config(local.path());
    cfg.keep = vec!["[unclosed".into()];

    let report = sync(&cfg, &mut remote);

    assert!(matches!(report.error, Some(SyncError::Config(_))));
    assert!(remote.ops.is_empty());
    Ok(())
}

#[test]
fn directory_that_never_empties_is_abandoned() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    let mut remote = MemoryTransport::new().with_file("/www/stale/zombie", 1, T0);
    remote.sticky.insert("/www/stale/zombie".into());
    let mut cfg = config(local.path());
    cfg.mirror = true;

    let report = sync(&cfg, &mut remote);

    match report.error {
        Some(SyncError::RemoveDirRunaway { ref path, passes }) => {
            assert_eq!(path, "/www/stale");
            assert_eq!(passes, MAX_REMOVE_PASSES);
        }
        ref other => panic!("expected runaway guard, got {:?}", other),
    }
    assert_eq!(remote.ops_starting("DELE").len(), MAX_REMOVE_PASSES);
    assert!(report.disconnected);
    Ok(())
}

#[test]
fn lost_connection_is_not_a_warning() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    write_local(local.path(), "b.txt", 5, T0);
    let mut remote = MemoryTransport::new();
    remote.drop_on_put = true;

    let report = sync(&config(local.path()), &mut remote);

    assert!(matches!(report.error, Some(SyncError::ConnectionLost(_))));
    assert!(report.warnings.is_empty());
    assert!(!report.disconnected);
    assert_eq!(remote.ops_starting("STOR").len(), 1);
    Ok(())
}

#[test]
fn relative_root_is_anchored_at_login_directory() -> Result<()> {
    let local = tempfile::tempdir()?;
    write_local(local.path(), "a.txt", 5, T0);
    let mut remote = MemoryTransport::new().with_dir("/home/deploy");
    remote.home = Some("/home/deploy".into());
    let mut cfg = config(local.path());
    cfg.dest = "site".into();

    let report = sync(&cfg, &mut remote);

    assert!(report.is_success(), "{:?}", report.error);
    assert!(remote.exists("/home/deploy/site/a.txt"));
    Ok(())
}

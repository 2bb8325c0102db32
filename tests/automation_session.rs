//! Automation session lifecycle: cleanup guarantees, retry policy,
//! session recreation

mod helpers;

use helpers::*;
use live2dgen::automation::{drive_with_recovery, AutomationSession, StepAction};
use live2dgen::core::config::AutomationConfig;
use live2dgen::core::error::AutomationError;
use live2dgen::core::layer::LayerSet;
use std::path::Path;
use std::time::Duration;

fn fast_cfg() -> AutomationConfig {
    AutomationConfig {
        launch_timeout_secs: 1,
        action_timeout_secs: 1,
        import_wait_secs: 0,
        import_retries: 2,
        close_grace_secs: 1,
    }
}

fn layer_set(dir: &Path, names: &[&str]) -> LayerSet {
    seed_layer_dir(dir, names);
    LayerSet::resolve(dir).unwrap()
}

fn assert_clean(factory: &FakeCubismFactory) {
    let state = factory.state();
    assert_eq!(
        state.open_handles, 0,
        "a process handle was left open after the session ended"
    );
    assert_eq!(
        state.closed, state.sessions,
        "every created session must be closed"
    );
}

// --- Cleanup on injected failure at every state ----------------------------

#[tokio::test]
async fn cleanup_after_launch_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let set = layer_set(tmp.path(), &["body"]);
    let factory = FakeCubismFactory::new(FakeBehavior {
        fail_launch: true,
        ..FakeBehavior::default()
    });

    let session = AutomationSession::new(factory.build(), fast_cfg());
    let (result, log) = session.drive(&set, &tmp.path().join("model.moc3")).await;

    assert!(result.is_err());
    assert!(log.iter().any(|s| s.action == StepAction::Close));
    assert_clean(&factory);
}

#[tokio::test]
async fn cleanup_after_launch_timeout() {
    let tmp = tempfile::tempdir().unwrap();
    let set = layer_set(tmp.path(), &["body"]);
    let factory = FakeCubismFactory::new(FakeBehavior {
        launch_delay: Some(Duration::from_secs(10)),
        ..FakeBehavior::default()
    });

    let session = AutomationSession::new(factory.build(), fast_cfg());
    let (result, _log) = session.drive(&set, &tmp.path().join("model.moc3")).await;

    assert!(matches!(result, Err(AutomationError::LaunchTimeout(1))));
    assert_clean(&factory);
}

#[tokio::test]
async fn cleanup_after_import_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let set = layer_set(tmp.path(), &["body", "face"]);
    let factory = FakeCubismFactory::new(FakeBehavior::default().fail_import_always("face"));

    let session = AutomationSession::new(factory.build(), fast_cfg());
    let (result, _log) = session.drive(&set, &tmp.path().join("model.moc3")).await;

    assert!(matches!(
        result,
        Err(AutomationError::ImportFailure { .. })
    ));
    assert_clean(&factory);
}

#[tokio::test]
async fn cleanup_after_rig_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let set = layer_set(tmp.path(), &["body"]);
    let factory = FakeCubismFactory::new(FakeBehavior {
        fail_rig: true,
        ..FakeBehavior::default()
    });

    let session = AutomationSession::new(factory.build(), fast_cfg());
    let (result, log) = session.drive(&set, &tmp.path().join("model.moc3")).await;

    assert!(matches!(result, Err(AutomationError::RigFailure(_))));
    // Completed imports stay in the log; nothing is rolled back
    assert!(log
        .iter()
        .any(|s| s.action == StepAction::ImportLayer("body".to_string()) && s.ok));
    assert_clean(&factory);
}

#[tokio::test]
async fn cleanup_after_export_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let set = layer_set(tmp.path(), &["body"]);
    let factory = FakeCubismFactory::new(FakeBehavior {
        export_mode: ExportMode::Fail,
        ..FakeBehavior::default()
    });

    let session = AutomationSession::new(factory.build(), fast_cfg());
    let (result, _log) = session.drive(&set, &tmp.path().join("model.moc3")).await;

    assert!(result.is_err());
    assert_clean(&factory);
}

// --- Export verification ---------------------------------------------------

#[tokio::test]
async fn export_verification_rejects_empty_file() {
    let tmp = tempfile::tempdir().unwrap();
    let set = layer_set(tmp.path(), &["body"]);
    let factory = FakeCubismFactory::new(FakeBehavior {
        export_mode: ExportMode::WriteEmpty,
        ..FakeBehavior::default()
    });

    let session = AutomationSession::new(factory.build(), fast_cfg());
    let (result, _log) = session.drive(&set, &tmp.path().join("model.moc3")).await;

    assert!(matches!(
        result,
        Err(AutomationError::ExportVerificationFailed { .. })
    ));
    assert_clean(&factory);
}

#[tokio::test]
async fn export_verification_rejects_missing_file() {
    let tmp = tempfile::tempdir().unwrap();
    let set = layer_set(tmp.path(), &["body"]);
    let factory = FakeCubismFactory::new(FakeBehavior {
        export_mode: ExportMode::Skip,
        ..FakeBehavior::default()
    });

    let session = AutomationSession::new(factory.build(), fast_cfg());
    let (result, _log) = session.drive(&set, &tmp.path().join("model.moc3")).await;

    match result {
        Err(AutomationError::ExportVerificationFailed { path }) => {
            assert_eq!(path, tmp.path().join("model.moc3"));
        }
        other => panic!("expected export verification failure, got {other:?}"),
    }
    assert_clean(&factory);
}

// --- Retry policy ----------------------------------------------------------

#[tokio::test]
async fn import_recovers_within_retry_budget() {
    let tmp = tempfile::tempdir().unwrap();
    let set = layer_set(tmp.path(), &["body", "face"]);
    // Two failing attempts, third succeeds; budget is 1 + 2 retries
    let factory = FakeCubismFactory::new(FakeBehavior::default().fail_import_times("face", 2));

    let target = tmp.path().join("model.moc3");
    let session = AutomationSession::new(factory.build(), fast_cfg());
    let (result, _log) = session.drive(&set, &target).await;

    assert!(result.is_ok());
    let state = factory.state();
    let face_attempts = state.import_attempts.iter().filter(|l| *l == "face").count();
    assert_eq!(face_attempts, 3);
    drop(state);
    assert_clean(&factory);
}

#[tokio::test]
async fn import_fails_after_exhausting_retries() {
    let tmp = tempfile::tempdir().unwrap();
    let set = layer_set(tmp.path(), &["body", "face"]);
    let factory = FakeCubismFactory::new(FakeBehavior::default().fail_import_times("face", 3));

    let session = AutomationSession::new(factory.build(), fast_cfg());
    let (result, _log) = session.drive(&set, &tmp.path().join("model.moc3")).await;

    match result {
        Err(AutomationError::ImportFailure {
            layer, attempts, ..
        }) => {
            assert_eq!(layer, "face");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected import failure, got {other:?}"),
    }
    assert_clean(&factory);
}

// --- Session recreation ----------------------------------------------------

#[tokio::test]
async fn unresponsive_session_recreated_once_and_recovers() {
    let tmp = tempfile::tempdir().unwrap();
    let set = layer_set(tmp.path(), &["body", "face"]);
    let factory = FakeCubismFactory::new(FakeBehavior {
        unresponsive_on: Some("face".to_string()),
        unresponsive_once: true,
        ..FakeBehavior::default()
    });

    let target = tmp.path().join("model.moc3");
    let report = drive_with_recovery(factory.as_fn(), &fast_cfg(), &set, &target).await;

    assert_eq!(report.result.unwrap(), target);

    let state = factory.state();
    assert_eq!(state.sessions, 2, "exactly one recreation");
    // The fresh editor instance replays imports from the top
    assert_eq!(
        state.imports_completed,
        vec!["body".to_string(), "body".to_string(), "face".to_string()]
    );
    drop(state);
    assert_clean(&factory);
}

#[tokio::test]
async fn second_unresponsive_session_declares_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let set = layer_set(tmp.path(), &["body", "face"]);
    let factory = FakeCubismFactory::new(FakeBehavior {
        unresponsive_on: Some("face".to_string()),
        unresponsive_once: false,
        ..FakeBehavior::default()
    });

    let report = drive_with_recovery(
        factory.as_fn(),
        &fast_cfg(),
        &set,
        &tmp.path().join("model.moc3"),
    )
    .await;

    match report.result {
        Err(AutomationError::ImportFailure { layer, message, .. }) => {
            assert_eq!(layer, "face");
            assert!(message.contains("recreation"));
        }
        other => panic!("expected import failure after recreation, got {other:?}"),
    }

    let state = factory.state();
    assert_eq!(state.sessions, 2, "no more than one recreation");
    drop(state);
    assert_clean(&factory);
}

// --- Log contents ----------------------------------------------------------

#[tokio::test]
async fn log_records_full_happy_path() {
    let tmp = tempfile::tempdir().unwrap();
    let set = layer_set(tmp.path(), &["hair_back", "body", "hair_front"]);
    let factory = FakeCubismFactory::healthy();

    let target = tmp.path().join("model.moc3");
    let session = AutomationSession::new(factory.build(), fast_cfg());
    let (result, log) = session.drive(&set, &target).await;
    assert!(result.is_ok());

    let actions: Vec<&StepAction> = log.iter().map(|s| &s.action).collect();
    assert_eq!(
        actions,
        vec![
            &StepAction::Launch,
            &StepAction::ImportLayer("hair_back".to_string()),
            &StepAction::ImportLayer("body".to_string()),
            &StepAction::ImportLayer("hair_front".to_string()),
            &StepAction::Rig,
            &StepAction::Export,
            &StepAction::Close,
        ]
    );
    assert!(log.iter().all(|s| s.ok));
}

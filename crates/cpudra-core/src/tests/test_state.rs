use std::sync::Arc;

use crate::Error;
use crate::checkpoint::CheckpointError;
use crate::claim::ClaimUid;
use crate::config::{ConfigError, TimeSliceInterval};
use crate::tests::utils::{
    TestEnv, claim, claim_config, class_config, cpu_config_params,
};

#[test]
fn test_prepare_without_configs() {
    let env = TestEnv::new();
    let x = claim("x").result("main", "cpu-0").finish();

    let devices = env.state.prepare(&x).unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_name, "cpu-0");
    assert_eq!(devices[0].request_names, vec!["main"]);
    assert_eq!(devices[0].pool_name, "node-1");
    assert_eq!(devices[0].cdi_device_ids, vec!["test/cpu=x-cpu-0"]);

    let claims = env.state.prepared_claims().unwrap();
    let prepared = &claims[&ClaimUid::new("x")];
    let edits = &prepared.iter().next().unwrap().container_edits;
    assert_eq!(edits.env, vec!["CPU_DEVICE_0=cpu-0"]);
    assert!(!edits.env.iter().any(|e| e.contains("SHARING")));
    assert_eq!(env.edit_log().written, vec![ClaimUid::new("x")]);

    env.state.unprepare(&x.uid).unwrap();
    assert!(env.state.prepared_claims().unwrap().is_empty());
    assert_eq!(env.edit_log().deleted, vec![ClaimUid::new("x")]);
}

#[test]
fn test_prepare_is_idempotent() {
    let env = TestEnv::new();
    let x = claim("x")
        .result("main", "cpu-0")
        .result("aux", "cpu-2")
        .config(claim_config(
            &["aux"],
            cpu_config_params(Some(TimeSliceInterval::Long)),
        ))
        .finish();

    let first = env.state.prepare(&x).unwrap();
    assert_eq!(env.decoder.calls(), 1);

    let second = env.state.prepare(&x).unwrap();
    assert_eq!(first, second);
    assert_eq!(env.decoder.calls(), 1);
    assert_eq!(env.edit_log().written.len(), 1);
}

#[test]
fn test_prepare_survives_restart() {
    let mut env = TestEnv::new();
    let x = claim("x")
        .result("main", "cpu-0")
        .config(class_config(
            &[],
            cpu_config_params(Some(TimeSliceInterval::Short)),
        ))
        .finish();
    let first = env.state.prepare(&x).unwrap();

    env.restart();
    let second = env.state.prepare(&x).unwrap();
    assert_eq!(first, second);
    assert_eq!(env.decoder.calls(), 1);
    assert_eq!(env.edit_log().written.len(), 1);
}

#[test]
fn test_unprepare_absent_claim() {
    let env = TestEnv::new();
    env.state.unprepare(&ClaimUid::new("missing")).unwrap();
    assert!(env.edit_log().deleted.is_empty());
    assert!(env.state.prepared_claims().unwrap().is_empty());
}

#[test]
fn test_unprepare_twice() {
    let env = TestEnv::new();
    let x = claim("x").result("main", "cpu-0").finish();
    env.state.prepare(&x).unwrap();
    env.state.unprepare(&x.uid).unwrap();
    env.state.unprepare(&x.uid).unwrap();
    assert_eq!(env.edit_log().deleted.len(), 1);
}

#[test]
fn test_claim_config_selected_over_class_config() {
    let env = TestEnv::new();
    let x = claim("x")
        .result("r", "cpu-0")
        .config(claim_config(
            &["r"],
            cpu_config_params(Some(TimeSliceInterval::Short)),
        ))
        .config(class_config(
            &["r"],
            cpu_config_params(Some(TimeSliceInterval::Long)),
        ))
        .finish();
    env.state.prepare(&x).unwrap();

    let claims = env.state.prepared_claims().unwrap();
    let edits = &claims[&x.uid].iter().next().unwrap().container_edits;
    assert!(
        edits
            .env
            .contains(&"CPU_DEVICE_0_TIMESLICE_INTERVAL=Short".to_string())
    );
}

#[test]
fn test_results_are_grouped_by_config() {
    let env = TestEnv::new();
    let x = claim("x")
        .result("main", "cpu-0")
        .result("shared", "cpu-2")
        .result("shared", "cpu-3")
        .config(claim_config(
            &["shared"],
            cpu_config_params(Some(TimeSliceInterval::Medium)),
        ))
        .finish();
    let devices = env.state.prepare(&x).unwrap();
    let names: Vec<_> = devices.iter().map(|d| d.device_name.as_str()).collect();
    assert_eq!(names, vec!["cpu-0", "cpu-2", "cpu-3"]);

    let claims = env.state.prepared_claims().unwrap();
    let envs: Vec<_> = claims[&x.uid]
        .iter()
        .map(|pd| pd.container_edits.env.len())
        .collect();
    assert_eq!(envs, vec![1, 3, 3]);
}

#[test]
fn test_device_backing_two_requests_is_rejected() {
    let env = TestEnv::new();
    let x = claim("x")
        .result("a", "cpu-0")
        .result("b", "cpu-0")
        .finish();
    assert!(matches!(
        env.state.prepare(&x),
        Err(Error::ConflictingDeviceEdits(device)) if device == "cpu-0"
    ));
    assert!(env.state.prepared_claims().unwrap().is_empty());
    assert!(env.edit_log().written.is_empty());
}

#[test]
fn test_device_with_two_configs_is_rejected() {
    let env = TestEnv::new();
    let x = claim("x")
        .result("a", "cpu-0")
        .result("b", "cpu-0")
        .config(claim_config(&["b"], cpu_config_params(None)))
        .finish();
    assert!(matches!(
        env.state.prepare(&x),
        Err(Error::ConflictingDeviceEdits(device)) if device == "cpu-0"
    ));
}

#[test]
fn test_unallocated_claim() {
    let env = TestEnv::new();
    let x = claim("x").allocated(false).finish();
    assert!(matches!(
        env.state.prepare(&x),
        Err(Error::ClaimNotAllocated(uid)) if uid == ClaimUid::new("x")
    ));
}

#[test]
fn test_unknown_device_leaves_checkpoint_unchanged() {
    let env = TestEnv::new();
    let ok = claim("ok").result("main", "cpu-0").finish();
    env.state.prepare(&ok).unwrap();
    let before = env.state.prepared_claims().unwrap();

    let x = claim("x")
        .result("main", "cpu-2")
        .result("main", "cpu-99")
        .finish();
    assert!(matches!(
        env.state.prepare(&x),
        Err(Error::DeviceNotAllocatable(device)) if device == "cpu-99"
    ));
    assert_eq!(env.state.prepared_claims().unwrap(), before);
    assert_eq!(env.edit_log().written.len(), 1);
}

#[test]
fn test_invalid_config() {
    let env = TestEnv::new();
    let x = claim("x")
        .result("main", "cpu-0")
        .config(class_config(
            &[],
            serde_json::json!({
                "apiVersion": "manager.cpu.com/v1alpha1",
                "kind": "CpuConfig",
                "sharing": {
                    "strategy": "SpacePartitioning",
                    "spacePartitioningConfig": {"partitionCount": 0}
                }
            }),
        ))
        .finish();
    assert!(matches!(
        env.state.prepare(&x),
        Err(Error::InvalidConfig(ConfigError::ZeroPartitionCount))
    ));
    assert!(env.state.prepared_claims().unwrap().is_empty());
}

#[test]
fn test_foreign_driver_config_is_ignored() {
    let env = TestEnv::new();
    let mut foreign = claim_config(&[], serde_json::json!({"kind": "GpuConfig"}));
    foreign.opaque.as_mut().unwrap().driver = "gpu.example.com".to_string();
    let x = claim("x").result("main", "cpu-0").config(foreign).finish();
    env.state.prepare(&x).unwrap();
    assert_eq!(env.decoder.calls(), 0);
}

#[test]
fn test_edit_persist_failure_keeps_checkpoint() {
    let env = TestEnv::new();
    env.edit_log().fail_write = true;
    let x = claim("x").result("main", "cpu-0").finish();
    assert!(matches!(
        env.state.prepare(&x),
        Err(Error::EditPersist { .. })
    ));
    assert!(env.state.prepared_claims().unwrap().is_empty());

    env.edit_log().fail_write = false;
    env.state.prepare(&x).unwrap();
    assert_eq!(env.state.prepared_claims().unwrap().len(), 1);
}

#[test]
fn test_checkpoint_write_failure() {
    let env = TestEnv::new();
    env.storage.fail_writes(true);
    let x = claim("x").result("main", "cpu-0").finish();
    assert!(matches!(
        env.state.prepare(&x),
        Err(Error::CheckpointWrite(CheckpointError::StorageUnavailable(_)))
    ));
    env.storage.fail_writes(false);
    assert!(env.state.prepared_claims().unwrap().is_empty());

    // A retry writes the edits again and commits the claim.
    env.state.prepare(&x).unwrap();
    assert_eq!(env.edit_log().written.len(), 2);
    assert_eq!(env.state.prepared_claims().unwrap().len(), 1);
}

#[test]
fn test_edit_delete_failure_keeps_claim() {
    let env = TestEnv::new();
    let x = claim("x").result("main", "cpu-0").finish();
    env.state.prepare(&x).unwrap();

    env.edit_log().fail_delete = true;
    assert!(matches!(
        env.state.unprepare(&x.uid),
        Err(Error::EditDelete { .. })
    ));
    assert_eq!(env.state.prepared_claims().unwrap().len(), 1);

    env.edit_log().fail_delete = false;
    env.state.unprepare(&x.uid).unwrap();
    assert!(env.state.prepared_claims().unwrap().is_empty());
}

#[test]
fn test_unprepare_checkpoint_write_failure() {
    let env = TestEnv::new();
    let x = claim("x").result("main", "cpu-0").finish();
    env.state.prepare(&x).unwrap();

    env.storage.fail_writes(true);
    assert!(matches!(
        env.state.unprepare(&x.uid),
        Err(Error::CheckpointWrite(CheckpointError::StorageUnavailable(_)))
    ));
    env.storage.fail_writes(false);
    assert!(env.state.prepared_claims().unwrap().contains_key(&x.uid));

    // The edits are already gone, deleting them again has to succeed.
    env.state.unprepare(&x.uid).unwrap();
    assert!(env.state.prepared_claims().unwrap().is_empty());
    assert_eq!(env.edit_log().deleted, vec![x.uid.clone(), x.uid.clone()]);
}

#[test]
fn test_corrupted_checkpoint_aborts_transaction() {
    use crate::checkpoint::{CHECKPOINT_KEY, CheckpointStorage};

    let env = TestEnv::new();
    env.storage.write(CHECKPOINT_KEY, b"not json").unwrap();
    let x = claim("x").result("main", "cpu-0").finish();
    assert!(matches!(
        env.state.prepare(&x),
        Err(Error::Checkpoint(CheckpointError::StorageCorrupt(_)))
    ));
    assert!(matches!(
        env.state.unprepare(&x.uid),
        Err(Error::Checkpoint(CheckpointError::StorageCorrupt(_)))
    ));
    assert!(env.edit_log().written.is_empty());
}

#[test]
fn test_concurrent_prepare() {
    let env = Arc::new(TestEnv::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let env = env.clone();
            std::thread::spawn(move || {
                let device = if i % 2 == 0 { "cpu-0" } else { "cpu-2" };
                let x = claim(&format!("claim-{i}")).result("main", device).finish();
                env.state.prepare(&x).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(env.state.prepared_claims().unwrap().len(), 8);
    assert_eq!(env.edit_log().written.len(), 8);
}

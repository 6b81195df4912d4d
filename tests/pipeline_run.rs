use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;

use serde_json::{json, Value};
use tempfile::TempDir;

use sfdx_ci::config::LoadOptions;
use sfdx_ci::engine::{Engine, PipelineEvent, RecordingListener, RunState};
use sfdx_ci::error::PlatformErrorDetails;
use sfdx_ci::git::VersionControl;
use sfdx_ci::sfdx::{ApexTestLevel, DeployRequest, Platform, ScratchOrgRequest};
use sfdx_ci::variables::InputData;
use sfdx_ci::{Error, ErrorCode, Result};

const PIPELINE: &str = r#"
version: "1.0.0"
inputs:
  - id: orgAlias
    default: ci-scratch
  - id: duration
    default: 1
vars:
  - id: devHub
    value: hub@example.com
steps:
  - id: scratch
    type: sfdx.force.org.create.scratch
    alias: $input.orgAlias
    definitionFile: config/project-scratch-def.json
    devHubUserName: $var.devHub
    duration: $input.duration
  - id: deploy
    type: sfdx.force.mdApi.deploy
    targetUserName: ${{step.scratch.outputs.username}}
    testLevel: RunLocalTests
    deployDir: changeSet
  - id: cleanup
    type: sfdx.force.org.delete
    continueOnError: true
    targetUserName: $step.scratch.outputs.username
    devHubUserName: $var.devHub
"#;

/// Records every call; deploy reports are served from a queue.
#[derive(Default)]
struct ScriptedOrg {
    scratch_requests: RefCell<Vec<ScratchOrgRequest>>,
    deploy_requests: RefCell<Vec<DeployRequest>>,
    reports: RefCell<VecDeque<Result<Value>>>,
}

fn unscripted() -> Result<Value> {
    Err(Error::internal_unexpected("not scripted"))
}

impl Platform for ScriptedOrg {
    fn org_create_scratch(&self, request: &ScratchOrgRequest) -> Result<Value> {
        self.scratch_requests.borrow_mut().push(request.clone());
        Ok(json!({ "orgId": "00D000000000001", "username": format!("{}@ci.example.com", request.alias) }))
    }

    fn mdapi_deploy(&self, request: &DeployRequest) -> Result<Value> {
        self.deploy_requests.borrow_mut().push(request.clone());
        Ok(json!({ "id": "0Af000000000001", "state": "Queued" }))
    }

    fn mdapi_deploy_report(&self, _: &str, _: &str, _: u32) -> Result<Value> {
        self.reports
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "done": false })))
    }

    fn org_delete(&self, _: &str, _: &str) -> Result<Value> {
        Err(Error::platform_command_failed(
            "The scratch org is already deleted",
            PlatformErrorDetails {
                name: "ScratchOrgNotFound".to_string(),
                ..Default::default()
            },
        ))
    }

    fn auth_access_token_store(&self, _: &str, _: &str, _: &str) -> Result<Value> {
        unscripted()
    }
    fn auth_sfdx_url_store(&self, _: &str, _: &str) -> Result<Value> {
        unscripted()
    }
    fn auth_list(&self) -> Result<Value> {
        unscripted()
    }
    fn auth_logout(&self, _: &str) -> Result<Value> {
        unscripted()
    }
    fn apex_execute(&self, _: &str, _: &str) -> Result<Value> {
        unscripted()
    }
    fn apex_test_run(&self, _: &str, _: &str, _: ApexTestLevel) -> Result<Value> {
        unscripted()
    }
    fn data_bulk_delete(&self, _: &str, _: &str, _: &str) -> Result<Value> {
        unscripted()
    }
    fn data_bulk_upsert(&self, _: &str, _: &str, _: &str, _: &str) -> Result<Value> {
        unscripted()
    }
    fn data_tree_import(&self, _: &str, _: &str) -> Result<Value> {
        unscripted()
    }
    fn data_soql_query_csv(&self, _: &str, _: &Path, _: &str, _: Option<&str>) -> Result<Value> {
        unscripted()
    }
    fn mdapi_retrieve(&self, _: &str, _: &str, _: Option<&str>, _: Option<&[String]>) -> Result<Value> {
        unscripted()
    }
    fn org_display(&self, _: &str) -> Result<Value> {
        unscripted()
    }
    fn package_install(&self, _: &str, _: &str) -> Result<Value> {
        unscripted()
    }
    fn source_push(&self, _: &str, _: bool) -> Result<Value> {
        unscripted()
    }
    fn source_convert(&self, _: &Path, _: &[String]) -> Result<Value> {
        unscripted()
    }
}

struct NoGit;

impl VersionControl for NoGit {
    fn checkout(&self, _: &str) -> Result<()> {
        Ok(())
    }
    fn merge(&self, _: &str, _: &str) -> Result<()> {
        Ok(())
    }
}

fn timed_out() -> Result<Value> {
    Err(Error::platform_command_failed(
        "The client has timed out.",
        PlatformErrorDetails {
            name: "GenericTimeoutError".to_string(),
            ..Default::default()
        },
    ))
}

fn load(dir: &TempDir) -> Engine {
    let path = dir.path().join("pipeline.yml");
    std::fs::write(&path, PIPELINE).unwrap();
    let mut engine = Engine::new(dir.path());
    engine.load(&path, LoadOptions::default()).unwrap();
    engine
}

#[test]
fn runs_scratch_deploy_and_tolerated_cleanup() {
    let dir = TempDir::new().unwrap();
    let mut engine = load(&dir);

    let mut inputs = InputData::new();
    inputs.insert("orgAlias".to_string(), json!("feature-42"));
    inputs.insert("duration".to_string(), json!(7));
    engine.set_global_inputs(inputs).unwrap();

    let org = ScriptedOrg::default();
    org.reports.borrow_mut().extend([
        timed_out(),
        Ok(json!({
            "id": "0Af000000000001",
            "done": true,
            "success": true,
            "status": "Succeeded",
            "numberComponentsDeployed": 12,
            "numberComponentsTotal": "12"
        })),
    ]);

    let mut listener = RecordingListener::default();
    let report = engine.run(&org, &NoGit, &mut listener).unwrap();

    assert_eq!(report.status, RunState::Completed);
    assert_eq!(report.summary.total_steps, 3);
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.failed_steps, vec!["cleanup".to_string()]);

    let scratch = &org.scratch_requests.borrow()[0];
    assert_eq!(scratch.alias, "feature-42");
    assert_eq!(scratch.dev_hub_user_name, "hub@example.com");
    assert_eq!(scratch.duration_days, 7.0);

    let deploy = &org.deploy_requests.borrow()[0];
    assert_eq!(deploy.target_user_name, "feature-42@ci.example.com");
    assert_eq!(deploy.deploy_dir.as_deref(), Some("changeSet"));
    assert!(!deploy.check_only);

    let outputs = engine.outputs_value();
    assert_eq!(outputs["deploy"]["success"], true);
    assert_eq!(outputs["deploy"]["outputs"]["status"], "Succeeded");
    assert_eq!(outputs["deploy"]["outputs"]["numberComponentsTotal"], 12);
    assert_eq!(outputs["cleanup"]["success"], false);
    assert_eq!(outputs["cleanup"]["error"]["name"], "ScratchOrgNotFound");

    let starts = listener
        .events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::StepStart { .. }))
        .count();
    assert_eq!(starts, 3);
    assert!(!listener
        .events
        .iter()
        .any(|e| matches!(e, PipelineEvent::StepError { .. })));
}

#[test]
fn failed_deploy_aborts_before_cleanup() {
    let dir = TempDir::new().unwrap();
    let mut engine = load(&dir);

    let org = ScriptedOrg::default();
    org.reports.borrow_mut().push_back(Ok(json!({
        "id": "0Af000000000001",
        "done": true,
        "success": false,
        "status": "Failed",
        "numberComponentErrors": 1,
        "details": {
            "componentFailures": [{ "fullName": "Account.Rating__c", "problem": "Invalid picklist" }]
        }
    })));

    let mut listener = RecordingListener::default();
    let err = engine.run(&org, &NoGit, &mut listener).unwrap_err();

    assert_eq!(err.code, ErrorCode::PlatformDeployFailed);
    assert_eq!(err.message, "Deployment error");
    assert_eq!(engine.state(), RunState::Failed);

    let outputs = engine.outputs_value();
    assert_eq!(outputs["scratch"]["outputs"]["username"], "ci-scratch@ci.example.com");
    assert_eq!(outputs["deploy"]["success"], false);
    assert!(outputs.get("cleanup").is_none());

    assert!(matches!(
        listener.events.last(),
        Some(PipelineEvent::StepError { message }) if message == "Deployment error"
    ));
}

#[test]
fn unloaded_engine_rejects_inputs_and_runs() {
    let dir = TempDir::new().unwrap();
    let mut engine = Engine::new(dir.path());

    let err = engine.set_global_inputs(InputData::new()).unwrap_err();
    assert_eq!(err.code, ErrorCode::EngineNotLoaded);

    let org = ScriptedOrg::default();
    let err = engine
        .run(&org, &NoGit, &mut RecordingListener::default())
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::EngineNotLoaded);
}

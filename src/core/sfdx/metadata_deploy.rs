use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{DeployRequest, Platform};
use crate::error::{Error, Result};

/// How many times the deploy report is requested before giving up.
pub const REPORT_ATTEMPTS: usize = 3;
const REPORT_WAIT_MINUTES: u32 = 30;
const CLIENT_TIMEOUT: &str = "The client has timed out";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploySummary {
    pub id: Option<String>,
    pub status: Option<String>,
    pub number_component_errors: Option<u64>,
    pub number_components_deployed: Option<u64>,
    pub number_components_total: Option<u64>,
    pub number_test_errors: Option<u64>,
    pub number_tests_completed: Option<u64>,
    pub number_tests_total: Option<u64>,
}

impl DeploySummary {
    fn from_report(report: &Value) -> Self {
        Self {
            id: report.get("id").and_then(Value::as_str).map(str::to_string),
            status: report.get("status").and_then(Value::as_str).map(str::to_string),
            number_component_errors: count(report, "numberComponentErrors"),
            number_components_deployed: count(report, "numberComponentsDeployed"),
            number_components_total: count(report, "numberComponentsTotal"),
            number_test_errors: count(report, "numberTestErrors"),
            number_tests_completed: count(report, "numberTestsCompleted"),
            number_tests_total: count(report, "numberTestsTotal"),
        }
    }
}

/// Queue a metadata deploy and wait for its report.
///
/// Report requests that fail with a client timeout are retried; any other
/// report error propagates. A finished, unsuccessful deploy fails with the
/// summary plus component, coverage and test failures.
pub fn deploy_metadata(platform: &dyn Platform, request: &DeployRequest) -> Result<Value> {
    let queued = platform.mdapi_deploy(request)?;
    let job_id = match queued.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(Error::platform_deploy_failed("Queueing deployment error", Some(queued))),
    };

    crate::log_status!("deploy", "Deployment {} queued", job_id);

    for attempt in 1..=REPORT_ATTEMPTS {
        let report = match platform.mdapi_deploy_report(&request.target_user_name, &job_id, REPORT_WAIT_MINUTES) {
            Ok(report) => report,
            Err(err) if err.message.contains(CLIENT_TIMEOUT) => {
                crate::log_status!(
                    "deploy",
                    "Report for {} timed out (attempt {}/{})",
                    job_id,
                    attempt,
                    REPORT_ATTEMPTS
                );
                continue;
            }
            Err(err) => return Err(err),
        };

        if report.get("done").and_then(Value::as_bool) != Some(true) {
            continue;
        }

        let summary = DeploySummary::from_report(&report);
        if report.get("success").and_then(Value::as_bool) == Some(true) {
            return serde_json::to_value(summary)
                .map_err(|e| Error::internal_json(e.to_string(), Some("deploy summary".to_string())));
        }

        let mut failure = serde_json::to_value(summary)
            .map_err(|e| Error::internal_json(e.to_string(), Some("deploy summary".to_string())))?;
        if let Value::Object(map) = &mut failure {
            let details = report.get("details");
            let run_test_result = details.and_then(|d| d.get("runTestResult"));
            map.insert(
                "details".to_string(),
                json!({
                    "componentFailures": details.and_then(|d| d.get("componentFailures")).cloned(),
                    "codeCoverageWarnings": run_test_result.and_then(|r| r.get("codeCoverageWarnings")).cloned(),
                    "testFailures": run_test_result.and_then(|r| r.get("failures")).cloned(),
                }),
            );
        }
        return Err(Error::platform_deploy_failed("Deployment error", Some(failure)));
    }

    Err(Error::platform_deploy_failed(
        format!(
            "{} attempts to get deployment report was accidentally failed.",
            REPORT_ATTEMPTS
        ),
        Some(Value::Object(serde_json::Map::new())),
    ))
}

fn count(report: &Value, key: &str) -> Option<u64> {
    match report.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, PlatformErrorDetails};
    use crate::sfdx::{ApexTestLevel, DeployTestLevel, ScratchOrgRequest};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::Path;

    struct ScriptedDeploy {
        queued: Value,
        reports: RefCell<VecDeque<Result<Value>>>,
        report_calls: RefCell<usize>,
    }

    impl ScriptedDeploy {
        fn new(queued: Value, reports: Vec<Result<Value>>) -> Self {
            Self {
                queued,
                reports: RefCell::new(reports.into()),
                report_calls: RefCell::new(0),
            }
        }
    }

    fn unused() -> Result<Value> {
        Err(Error::internal_unexpected("not scripted"))
    }

    impl Platform for ScriptedDeploy {
        fn auth_access_token_store(&self, _: &str, _: &str, _: &str) -> Result<Value> {
            unused()
        }
        fn auth_sfdx_url_store(&self, _: &str, _: &str) -> Result<Value> {
            unused()
        }
        fn auth_list(&self) -> Result<Value> {
            unused()
        }
        fn auth_logout(&self, _: &str) -> Result<Value> {
            unused()
        }
        fn apex_execute(&self, _: &str, _: &str) -> Result<Value> {
            unused()
        }
        fn apex_test_run(&self, _: &str, _: &str, _: ApexTestLevel) -> Result<Value> {
            unused()
        }
        fn data_bulk_delete(&self, _: &str, _: &str, _: &str) -> Result<Value> {
            unused()
        }
        fn data_bulk_upsert(&self, _: &str, _: &str, _: &str, _: &str) -> Result<Value> {
            unused()
        }
        fn data_tree_import(&self, _: &str, _: &str) -> Result<Value> {
            unused()
        }
        fn data_soql_query_csv(&self, _: &str, _: &Path, _: &str, _: Option<&str>) -> Result<Value> {
            unused()
        }
        fn mdapi_deploy(&self, _: &DeployRequest) -> Result<Value> {
            Ok(self.queued.clone())
        }
        fn mdapi_deploy_report(&self, _: &str, job_id: &str, wait: u32) -> Result<Value> {
            assert_eq!(job_id, "0Af1");
            assert_eq!(wait, 30);
            *self.report_calls.borrow_mut() += 1;
            self.reports.borrow_mut().pop_front().unwrap_or_else(unused)
        }
        fn mdapi_retrieve(&self, _: &str, _: &str, _: Option<&str>, _: Option<&[String]>) -> Result<Value> {
            unused()
        }
        fn org_create_scratch(&self, _: &ScratchOrgRequest) -> Result<Value> {
            unused()
        }
        fn org_delete(&self, _: &str, _: &str) -> Result<Value> {
            unused()
        }
        fn org_display(&self, _: &str) -> Result<Value> {
            unused()
        }
        fn package_install(&self, _: &str, _: &str) -> Result<Value> {
            unused()
        }
        fn source_push(&self, _: &str, _: bool) -> Result<Value> {
            unused()
        }
        fn source_convert(&self, _: &Path, _: &[String]) -> Result<Value> {
            unused()
        }
    }

    fn request() -> DeployRequest {
        DeployRequest {
            target_user_name: "ci".to_string(),
            test_level: DeployTestLevel::RunLocalTests,
            check_only: true,
            deploy_dir: Some("out".to_string()),
            deploy_zip: None,
        }
    }

    fn timeout() -> Result<Value> {
        Err(Error::platform_command_failed(
            "Polling: The client has timed out.",
            PlatformErrorDetails {
                name: "GenericTimeoutError".to_string(),
                ..Default::default()
            },
        ))
    }

    fn finished(success: bool) -> Value {
        json!({
            "id": "0Af1",
            "status": if success { "Succeeded" } else { "Failed" },
            "done": true,
            "success": success,
            "numberComponentErrors": if success { 0 } else { 1 },
            "numberComponentsDeployed": 12,
            "numberComponentsTotal": 13,
            "numberTestErrors": 0,
            "numberTestsCompleted": 4,
            "numberTestsTotal": 4,
            "details": {
                "componentFailures": [{ "fullName": "Account.Broken__c" }],
                "runTestResult": { "codeCoverageWarnings": [], "failures": [] }
            }
        })
    }

    #[test]
    fn successful_deploy_returns_summary_only() {
        let platform = ScriptedDeploy::new(json!({ "id": "0Af1" }), vec![Ok(finished(true))]);
        let summary = deploy_metadata(&platform, &request()).unwrap();
        assert_eq!(summary["status"], "Succeeded");
        assert_eq!(summary["numberComponentsDeployed"], 12);
        assert!(summary.get("details").is_none());
        assert!(summary.get("done").is_none());
    }

    #[test]
    fn missing_job_id_is_a_queueing_error() {
        let platform = ScriptedDeploy::new(json!({ "status": "Queued" }), vec![]);
        let err = deploy_metadata(&platform, &request()).unwrap_err();
        assert_eq!(err.code, ErrorCode::PlatformDeployFailed);
        assert_eq!(err.message, "Queueing deployment error");
        assert_eq!(err.platform_details().unwrap().summary.unwrap()["status"], "Queued");
        assert_eq!(*platform.report_calls.borrow(), 0);
    }

    #[test]
    fn timeouts_are_retried() {
        let platform = ScriptedDeploy::new(json!({ "id": "0Af1" }), vec![timeout(), timeout(), Ok(finished(true))]);
        assert!(deploy_metadata(&platform, &request()).is_ok());
        assert_eq!(*platform.report_calls.borrow(), 3);
    }

    #[test]
    fn gives_up_after_three_attempts() {
        let platform = ScriptedDeploy::new(
            json!({ "id": "0Af1" }),
            vec![timeout(), Ok(json!({ "done": false })), timeout(), Ok(finished(true))],
        );
        let err = deploy_metadata(&platform, &request()).unwrap_err();
        assert_eq!(err.message, "3 attempts to get deployment report was accidentally failed.");
        assert_eq!(*platform.report_calls.borrow(), REPORT_ATTEMPTS);
    }

    #[test]
    fn other_report_errors_propagate() {
        let platform = ScriptedDeploy::new(
            json!({ "id": "0Af1" }),
            vec![Err(Error::platform_command_failed(
                "INVALID_SESSION_ID",
                PlatformErrorDetails {
                    name: "sf:INVALID_SESSION_ID".to_string(),
                    ..Default::default()
                },
            ))],
        );
        let err = deploy_metadata(&platform, &request()).unwrap_err();
        assert_eq!(err.code, ErrorCode::PlatformCommandFailed);
        assert_eq!(*platform.report_calls.borrow(), 1);
    }

    #[test]
    fn failed_deploy_carries_failure_details() {
        let platform = ScriptedDeploy::new(json!({ "id": "0Af1" }), vec![Ok(finished(false))]);
        let err = deploy_metadata(&platform, &request()).unwrap_err();
        assert_eq!(err.message, "Deployment error");
        let summary = err.platform_details().unwrap().summary.unwrap();
        assert_eq!(summary["numberComponentErrors"], 1);
        assert_eq!(summary["details"]["componentFailures"][0]["fullName"], "Account.Broken__c");
        assert_eq!(summary["details"]["testFailures"], json!([]));
    }
}

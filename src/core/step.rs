//! Typed pipeline steps.
//!
//! A step in a pipeline file is a mapping with `id`, `type`, optional
//! `continueOnError` and the parameters of its kind. The kind set is closed;
//! `StepKind::parse` returns `None` for a type it does not know.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::change_set::DestructiveChangeSetMode;
use crate::data_transfer::SObjectItem;
use crate::sfdx::{ApexTestLevel, DeployTestLevel};
use crate::variables::ParamValue;

#[derive(Debug, Clone)]
pub struct Step {
    pub id: String,
    pub continue_on_error: bool,
    pub kind: StepKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub continue_on_error: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unsupported: bool,
}

impl Step {
    pub fn summary(&self) -> StepSummary {
        StepSummary {
            id: self.id.clone(),
            step_type: self.kind.type_name().to_string(),
            continue_on_error: self.continue_on_error,
            unsupported: matches!(self.kind, StepKind::Unsupported(_)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StepKind {
    ChangeSetCreate(ChangeSetCreateParams),
    DataTransfer(DataTransferParams),
    AuthAccessToken(AuthAccessTokenParams),
    AuthList,
    AuthLogout(TargetOrgParams),
    AuthSfdxUrl(AuthSfdxUrlParams),
    ApexExecute(ApexExecuteParams),
    ApexTestRun(ApexTestRunParams),
    DataBulkDelete(BulkDeleteParams),
    DataBulkUpsert(BulkUpsertParams),
    DataTreeImport(TreeImportParams),
    DataSoqlQueryCsv(SoqlQueryCsvParams),
    MdApiDeploy(MdApiDeployParams),
    MdApiRetrieve(MdApiRetrieveParams),
    OrgCreateScratch(OrgCreateScratchParams),
    OrgDelete(OrgDeleteParams),
    OrgDisplay(TargetOrgParams),
    PackageInstall(PackageInstallParams),
    SourcePush(SourcePushParams),
    /// A type with no handler, kept only when the loader allows unknown types.
    Unsupported(String),
}

pub const STEP_TYPES: &[&str] = &[
    "ci.changeSet.create",
    "ci.data.transfer",
    "sfdx.auth.accessToken",
    "sfdx.auth.list",
    "sfdx.auth.logout",
    "sfdx.auth.sfdxUrl",
    "sfdx.force.apex.execute",
    "sfdx.force.apex.test.run",
    "sfdx.force.data.bulk.delete",
    "sfdx.force.data.bulk.upsert",
    "sfdx.force.data.tree.import",
    "sfdx.force.data.soql.query.csv",
    "sfdx.force.mdApi.deploy",
    "sfdx.force.mdApi.retrieve",
    "sfdx.force.org.create.scratch",
    "sfdx.force.org.delete",
    "sfdx.force.org.display",
    "sfdx.force.package.install",
    "sfdx.force.source.push",
];

impl StepKind {
    pub fn type_name(&self) -> &str {
        match self {
            StepKind::ChangeSetCreate(_) => "ci.changeSet.create",
            StepKind::DataTransfer(_) => "ci.data.transfer",
            StepKind::AuthAccessToken(_) => "sfdx.auth.accessToken",
            StepKind::AuthList => "sfdx.auth.list",
            StepKind::AuthLogout(_) => "sfdx.auth.logout",
            StepKind::AuthSfdxUrl(_) => "sfdx.auth.sfdxUrl",
            StepKind::ApexExecute(_) => "sfdx.force.apex.execute",
            StepKind::ApexTestRun(_) => "sfdx.force.apex.test.run",
            StepKind::DataBulkDelete(_) => "sfdx.force.data.bulk.delete",
            StepKind::DataBulkUpsert(_) => "sfdx.force.data.bulk.upsert",
            StepKind::DataTreeImport(_) => "sfdx.force.data.tree.import",
            StepKind::DataSoqlQueryCsv(_) => "sfdx.force.data.soql.query.csv",
            StepKind::MdApiDeploy(_) => "sfdx.force.mdApi.deploy",
            StepKind::MdApiRetrieve(_) => "sfdx.force.mdApi.retrieve",
            StepKind::OrgCreateScratch(_) => "sfdx.force.org.create.scratch",
            StepKind::OrgDelete(_) => "sfdx.force.org.delete",
            StepKind::OrgDisplay(_) => "sfdx.force.org.display",
            StepKind::PackageInstall(_) => "sfdx.force.package.install",
            StepKind::SourcePush(_) => "sfdx.force.source.push",
            StepKind::Unsupported(step_type) => step_type,
        }
    }

    /// Build a kind from its type tag and remaining step fields.
    ///
    /// `Ok(None)` means the type is unknown; `Err` carries a schema problem.
    pub fn parse(step_type: &str, params: Map<String, Value>) -> Result<Option<Self>, String> {
        let kind = match step_type {
            "ci.changeSet.create" => StepKind::ChangeSetCreate(from_params(params)?),
            "ci.data.transfer" => StepKind::DataTransfer(from_params(params)?),
            "sfdx.auth.accessToken" => StepKind::AuthAccessToken(from_params(params)?),
            "sfdx.auth.list" => {
                if let Some(key) = params.keys().next() {
                    return Err(format!("unknown field `{}`, expected no parameters", key));
                }
                StepKind::AuthList
            }
            "sfdx.auth.logout" => StepKind::AuthLogout(from_params(params)?),
            "sfdx.auth.sfdxUrl" => StepKind::AuthSfdxUrl(from_params(params)?),
            "sfdx.force.apex.execute" => StepKind::ApexExecute(from_params(params)?),
            "sfdx.force.apex.test.run" => StepKind::ApexTestRun(from_params(params)?),
            "sfdx.force.data.bulk.delete" => StepKind::DataBulkDelete(from_params(params)?),
            "sfdx.force.data.bulk.upsert" => StepKind::DataBulkUpsert(from_params(params)?),
            "sfdx.force.data.tree.import" => StepKind::DataTreeImport(from_params(params)?),
            "sfdx.force.data.soql.query.csv" => StepKind::DataSoqlQueryCsv(from_params(params)?),
            "sfdx.force.mdApi.deploy" => StepKind::MdApiDeploy(from_params(params)?),
            "sfdx.force.mdApi.retrieve" => StepKind::MdApiRetrieve(from_params(params)?),
            "sfdx.force.org.create.scratch" => StepKind::OrgCreateScratch(from_params(params)?),
            "sfdx.force.org.delete" => StepKind::OrgDelete(from_params(params)?),
            "sfdx.force.org.display" => StepKind::OrgDisplay(from_params(params)?),
            "sfdx.force.package.install" => StepKind::PackageInstall(from_params(params)?),
            "sfdx.force.source.push" => StepKind::SourcePush(from_params(params)?),
            _ => return Ok(None),
        };
        Ok(Some(kind))
    }
}

fn from_params<T: DeserializeOwned>(params: Map<String, Value>) -> Result<T, String> {
    serde_json::from_value(Value::Object(params)).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangeSetCreateParams {
    pub head_sha: String,
    pub base_sha: String,
    #[serde(default)]
    pub destructive_change_set_mode: DestructiveChangeSetMode,
    pub change_set_dir: String,
    pub create_revert_change_set: Option<ParamValue>,
    #[serde(default)]
    pub revert_destructive_change_set_mode: DestructiveChangeSetMode,
    pub revert_change_set_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DataTransferParams {
    pub source_org_alias: String,
    pub target_org_alias: String,
    pub s_object_type: SObjectItem,
    pub s_object_fields: Vec<SObjectItem>,
    pub query_filter: Option<String>,
    pub external_id: String,
    pub allow_no_more_failed_batches: Option<ParamValue>,
    pub allow_no_more_failed_records: Option<ParamValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthAccessTokenParams {
    pub alias: String,
    pub instance_url: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthSfdxUrlParams {
    pub alias: String,
    pub sfdx_url_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetOrgParams {
    pub target_user_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApexExecuteParams {
    pub target_user_name: String,
    pub apex_code_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApexTestRunParams {
    pub target_user_name: String,
    pub output_dir: String,
    pub test_level: ApexTestLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkDeleteParams {
    pub target_user_name: String,
    pub csv_file: String,
    pub s_object_type: String,
    pub allow_no_more_failed_batches: Option<ParamValue>,
    pub allow_no_more_failed_records: Option<ParamValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkUpsertParams {
    pub target_user_name: String,
    pub csv_file: String,
    pub external_id: String,
    pub s_object_type: String,
    pub allow_no_more_failed_batches: Option<ParamValue>,
    pub allow_no_more_failed_records: Option<ParamValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TreeImportParams {
    pub target_user_name: String,
    pub plan_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SoqlQueryCsvParams {
    pub target_user_name: String,
    pub csv_file: String,
    pub s_object_type: String,
    pub s_object_fields: Vec<String>,
    pub query_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MdApiDeployParams {
    pub target_user_name: String,
    pub test_level: DeployTestLevel,
    pub check_only: Option<ParamValue>,
    pub deploy_dir: Option<String>,
    pub deploy_zip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MdApiRetrieveParams {
    pub target_user_name: String,
    pub retrieve_target_dir: String,
    pub manifest_file: Option<String>,
    pub package_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OverrideDefinition {
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrgCreateScratchParams {
    pub alias: String,
    pub no_ancestors: Option<ParamValue>,
    pub definition_file: String,
    pub dev_hub_user_name: String,
    pub duration: Option<ParamValue>,
    pub override_definition: Option<OverrideDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrgDeleteParams {
    pub target_user_name: String,
    pub dev_hub_user_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PackageInstallParams {
    pub target_user_name: String,
    pub package_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SourcePushParams {
    pub target_user_name: String,
    pub force_overwrite: Option<ParamValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn every_listed_type_has_a_kind() {
        for step_type in STEP_TYPES {
            // Schema errors are fine here; only unknown types return Ok(None).
            let parsed = StepKind::parse(step_type, Map::new());
            assert!(!matches!(parsed, Ok(None)), "{} not dispatched", step_type);
        }
    }

    #[test]
    fn parses_camel_case_parameters() {
        let kind = StepKind::parse(
            "sfdx.force.data.bulk.upsert",
            params(json!({
                "targetUserName": "$var.alias",
                "csvFile": "data/accounts.csv",
                "externalId": "External_Id__c",
                "sObjectType": "Account",
                "allowNoMoreFailedRecords": 5
            })),
        )
        .unwrap()
        .unwrap();

        match kind {
            StepKind::DataBulkUpsert(p) => {
                assert_eq!(p.target_user_name, "$var.alias");
                assert_eq!(p.s_object_type, "Account");
                assert_eq!(p.allow_no_more_failed_records, Some(ParamValue::Number(5.0)));
                assert!(p.allow_no_more_failed_batches.is_none());
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn change_set_modes_default_to_post() {
        let kind = StepKind::parse(
            "ci.changeSet.create",
            params(json!({ "headSha": "HEAD", "baseSha": "main", "changeSetDir": "out" })),
        )
        .unwrap()
        .unwrap();

        match kind {
            StepKind::ChangeSetCreate(p) => {
                assert_eq!(p.destructive_change_set_mode, DestructiveChangeSetMode::Post);
                assert_eq!(p.revert_destructive_change_set_mode, DestructiveChangeSetMode::Post);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn unknown_fields_are_schema_errors() {
        let err = StepKind::parse(
            "sfdx.force.org.display",
            params(json!({ "targetUserName": "ci", "targetOrg": "ci" })),
        )
        .unwrap_err();
        assert!(err.contains("targetOrg"));

        let err = StepKind::parse("sfdx.auth.list", params(json!({ "all": true }))).unwrap_err();
        assert!(err.contains("all"));
    }

    #[test]
    fn unknown_types_are_not_errors_here() {
        assert!(matches!(StepKind::parse("sfdx.force.source.pull", Map::new()), Ok(None)));
    }

    #[test]
    fn unsupported_kind_keeps_its_type_name() {
        let step = Step {
            id: "legacy".to_string(),
            continue_on_error: false,
            kind: StepKind::Unsupported("sfdx.force.source.pull".to_string()),
        };
        let summary = step.summary();
        assert_eq!(summary.step_type, "sfdx.force.source.pull");
        assert!(summary.unsupported);
    }
}

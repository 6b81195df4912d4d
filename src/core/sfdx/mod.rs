//! Salesforce platform actions.
//!
//! `Platform` is the seam between the pipeline and the `sfdx` tool. Every
//! action takes already-resolved primitive parameters and returns the
//! command's JSON result, or an error carrying the tool's own error name.

mod bulk;
mod cli;
mod metadata_deploy;
mod soql;

pub use bulk::check_bulk_result;
pub use cli::SfdxCli;
pub use metadata_deploy::{deploy_metadata, DeploySummary, REPORT_ATTEMPTS};
pub use soql::build_query;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApexTestLevel {
    RunLocalTests,
    RunAllTestsInOrg,
    RunSpecifiedTests,
}

impl ApexTestLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApexTestLevel::RunLocalTests => "RunLocalTests",
            ApexTestLevel::RunAllTestsInOrg => "RunAllTestsInOrg",
            ApexTestLevel::RunSpecifiedTests => "RunSpecifiedTests",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployTestLevel {
    NoTestRun,
    RunSpecifiedTests,
    RunLocalTests,
    RunAllTestsInOrg,
}

impl DeployTestLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployTestLevel::NoTestRun => "NoTestRun",
            DeployTestLevel::RunSpecifiedTests => "RunSpecifiedTests",
            DeployTestLevel::RunLocalTests => "RunLocalTests",
            DeployTestLevel::RunAllTestsInOrg => "RunAllTestsInOrg",
        }
    }
}

/// Failure allowances for bulk API jobs. `None` leaves that count unchecked.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BulkAllowance {
    pub failed_batches: Option<f64>,
    pub failed_records: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScratchOrgRequest {
    pub alias: String,
    pub no_ancestors: bool,
    pub definition_file: String,
    pub dev_hub_user_name: String,
    pub duration_days: f64,
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeployRequest {
    pub target_user_name: String,
    pub test_level: DeployTestLevel,
    pub check_only: bool,
    pub deploy_dir: Option<String>,
    pub deploy_zip: Option<String>,
}

pub trait Platform {
    fn auth_access_token_store(&self, alias: &str, instance_url: &str, access_token: &str) -> Result<Value>;
    fn auth_sfdx_url_store(&self, alias: &str, sfdx_url_file: &str) -> Result<Value>;
    fn auth_list(&self) -> Result<Value>;
    fn auth_logout(&self, target_user_name: &str) -> Result<Value>;

    fn apex_execute(&self, target_user_name: &str, apex_code_file: &str) -> Result<Value>;
    fn apex_test_run(&self, target_user_name: &str, output_dir: &str, test_level: ApexTestLevel) -> Result<Value>;

    fn data_bulk_delete(&self, target_user_name: &str, csv_file: &str, s_object_type: &str) -> Result<Value>;
    fn data_bulk_upsert(
        &self,
        target_user_name: &str,
        csv_file: &str,
        external_id: &str,
        s_object_type: &str,
    ) -> Result<Value>;
    fn data_tree_import(&self, target_user_name: &str, plan_file: &str) -> Result<Value>;

    /// Run a SOQL query and write the rows as CSV. `replace_header` swaps the
    /// first line of the file for the given header.
    fn data_soql_query_csv(
        &self,
        target_user_name: &str,
        csv_file: &Path,
        query: &str,
        replace_header: Option<&str>,
    ) -> Result<Value>;

    /// Queue a metadata deploy. The result carries the async job `id`.
    fn mdapi_deploy(&self, request: &DeployRequest) -> Result<Value>;
    fn mdapi_deploy_report(&self, target_user_name: &str, job_id: &str, wait_minutes: u32) -> Result<Value>;
    fn mdapi_retrieve(
        &self,
        target_user_name: &str,
        retrieve_target_dir: &str,
        manifest_file: Option<&str>,
        package_names: Option<&[String]>,
    ) -> Result<Value>;

    fn org_create_scratch(&self, request: &ScratchOrgRequest) -> Result<Value>;
    fn org_delete(&self, target_user_name: &str, dev_hub_user_name: &str) -> Result<Value>;
    fn org_display(&self, target_user_name: &str) -> Result<Value>;

    fn package_install(&self, target_user_name: &str, package_id: &str) -> Result<Value>;

    fn source_push(&self, target_user_name: &str, force_overwrite: bool) -> Result<Value>;
    /// Convert source-format package directories into metadata API format.
    fn source_convert(&self, output_dir: &Path, source_paths: &[String]) -> Result<Value>;
}

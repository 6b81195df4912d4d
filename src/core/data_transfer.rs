//! Copy records of one object between two orgs.
//!
//! Rows are queried from the source org into a temporary CSV whose header is
//! rewritten to the target field names, then bulk upserted into the target
//! org. The temporary file never outlives the transfer.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::sfdx::{build_query, check_bulk_result, BulkAllowance, Platform};
use crate::utils::io;

/// An object or field name, optionally different on each side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SObjectItem {
    Same(String),
    Mapped { source: String, target: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl SObjectItem {
    pub fn name(&self, side: Side) -> &str {
        match (self, side) {
            (SObjectItem::Same(name), _) => name,
            (SObjectItem::Mapped { source, .. }, Side::Source) => source,
            (SObjectItem::Mapped { target, .. }, Side::Target) => target,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub source_org_alias: String,
    pub target_org_alias: String,
    pub s_object_type: SObjectItem,
    pub s_object_fields: Vec<SObjectItem>,
    pub query_filter: String,
    pub external_id: String,
    pub allowance: BulkAllowance,
}

pub fn field_names(fields: &[SObjectItem], side: Side) -> Vec<String> {
    fields.iter().map(|f| f.name(side).to_string()).collect()
}

/// Run a transfer, returning the bulk upsert result.
pub fn transfer(platform: &dyn Platform, working_dir: &Path, request: &TransferRequest) -> Result<Value> {
    let temp_file = temp_csv_path(working_dir);
    let result = run_transfer(platform, &temp_file, request);
    io::remove_file_if_exists(&temp_file, "remove transfer data file")?;
    result
}

fn temp_csv_path(working_dir: &Path) -> PathBuf {
    working_dir.join(format!("tmp_data_{}.csv", uuid::Uuid::new_v4().simple()))
}

fn run_transfer(platform: &dyn Platform, temp_file: &Path, request: &TransferRequest) -> Result<Value> {
    let source_type = request.s_object_type.name(Side::Source);
    let target_type = request.s_object_type.name(Side::Target);
    let query = build_query(
        source_type,
        &field_names(&request.s_object_fields, Side::Source),
        &request.query_filter,
    );
    let target_header = field_names(&request.s_object_fields, Side::Target).join(",");

    crate::log_status!(
        "transfer",
        "{} ({}) -> {} ({})",
        source_type,
        request.source_org_alias,
        target_type,
        request.target_org_alias
    );

    platform.data_soql_query_csv(&request.source_org_alias, temp_file, &query, Some(&target_header))?;

    let csv_file = temp_file.to_string_lossy();
    let result = platform.data_bulk_upsert(&request.target_org_alias, &csv_file, &request.external_id, target_type)?;
    check_bulk_result("upsert", &result, request.allowance)?;
    Ok(result)
}

//! Parameter binding and invocation for each step kind.

use std::path::Path;

use serde_json::Value;

use crate::change_set::{create_change_set, ChangeSetRequest};
use crate::data_transfer::{transfer, SObjectItem, TransferRequest};
use crate::error::{Error, Result};
use crate::git::VersionControl;
use crate::sfdx::{
    build_query, check_bulk_result, deploy_metadata, BulkAllowance, DeployRequest, Platform, ScratchOrgRequest,
};
use crate::step::StepKind;
use crate::variables::{ParamValue, VariableStore};

const DEFAULT_SCRATCH_DURATION_DAYS: f64 = 1.0;

/// Collaborators a step may call.
pub struct StepContext<'a> {
    pub platform: &'a dyn Platform,
    pub vcs: &'a dyn VersionControl,
    pub working_dir: &'a Path,
}

/// Resolve a step's parameters through `store` and run it.
///
/// `Ok(None)` means the step succeeded without a payload.
pub fn execute(kind: &StepKind, store: &mut VariableStore, ctx: &StepContext<'_>) -> Result<Option<Value>> {
    let payload = match kind {
        StepKind::ChangeSetCreate(p) => {
            let request = ChangeSetRequest {
                head_sha: store.string_value(&p.head_sha),
                base_sha: store.string_value(&p.base_sha),
                mode: p.destructive_change_set_mode,
                change_set_dir: store.string_value(&p.change_set_dir),
                create_revert: flag(store, p.create_revert_change_set.as_ref()),
                revert_mode: p.revert_destructive_change_set_mode,
                revert_change_set_dir: optional(store, p.revert_change_set_dir.as_deref()),
            };
            let changes = create_change_set(ctx.platform, ctx.vcs, ctx.working_dir, &request)?;
            serde_json::to_value(changes)
                .map_err(|e| Error::internal_json(e.to_string(), Some("change set".to_string())))?
        }
        StepKind::DataTransfer(p) => {
            let request = TransferRequest {
                source_org_alias: store.string_value(&p.source_org_alias),
                target_org_alias: store.string_value(&p.target_org_alias),
                s_object_type: item(store, &p.s_object_type),
                s_object_fields: p.s_object_fields.iter().map(|f| item(store, f)).collect(),
                query_filter: optional(store, p.query_filter.as_deref()).unwrap_or_default(),
                external_id: store.string_value(&p.external_id),
                allowance: allowance(
                    store,
                    p.allow_no_more_failed_batches.as_ref(),
                    p.allow_no_more_failed_records.as_ref(),
                ),
            };
            transfer(ctx.platform, ctx.working_dir, &request)?
        }
        StepKind::AuthAccessToken(p) => {
            let alias = store.string_value(&p.alias);
            let instance_url = store.string_value(&p.instance_url);
            let access_token = store.string_value(&p.access_token);
            ctx.platform.auth_access_token_store(&alias, &instance_url, &access_token)?
        }
        StepKind::AuthList => ctx.platform.auth_list()?,
        StepKind::AuthLogout(p) => {
            let user = store.string_value(&p.target_user_name);
            ctx.platform.auth_logout(&user)?
        }
        StepKind::AuthSfdxUrl(p) => {
            let alias = store.string_value(&p.alias);
            let file = store.string_value(&p.sfdx_url_file);
            ctx.platform.auth_sfdx_url_store(&alias, &file)?
        }
        StepKind::ApexExecute(p) => {
            let user = store.string_value(&p.target_user_name);
            let file = store.string_value(&p.apex_code_file);
            ctx.platform.apex_execute(&user, &file)?
        }
        StepKind::ApexTestRun(p) => {
            let user = store.string_value(&p.target_user_name);
            let output_dir = store.string_value(&p.output_dir);
            ctx.platform.apex_test_run(&user, &output_dir, p.test_level)?
        }
        StepKind::DataBulkDelete(p) => {
            let user = store.string_value(&p.target_user_name);
            let csv_file = store.string_value(&p.csv_file);
            let s_object = store.string_value(&p.s_object_type);
            let allowance = allowance(
                store,
                p.allow_no_more_failed_batches.as_ref(),
                p.allow_no_more_failed_records.as_ref(),
            );
            let result = ctx.platform.data_bulk_delete(&user, &csv_file, &s_object)?;
            check_bulk_result("delete", &result, allowance)?;
            result
        }
        StepKind::DataBulkUpsert(p) => {
            let user = store.string_value(&p.target_user_name);
            let csv_file = store.string_value(&p.csv_file);
            let external_id = store.string_value(&p.external_id);
            let s_object = store.string_value(&p.s_object_type);
            let allowance = allowance(
                store,
                p.allow_no_more_failed_batches.as_ref(),
                p.allow_no_more_failed_records.as_ref(),
            );
            let result = ctx.platform.data_bulk_upsert(&user, &csv_file, &external_id, &s_object)?;
            check_bulk_result("upsert", &result, allowance)?;
            result
        }
        StepKind::DataTreeImport(p) => {
            let user = store.string_value(&p.target_user_name);
            let plan = store.string_value(&p.plan_file);
            ctx.platform.data_tree_import(&user, &plan)?
        }
        StepKind::DataSoqlQueryCsv(p) => {
            let user = store.string_value(&p.target_user_name);
            let csv_file = store.string_value(&p.csv_file);
            let s_object = store.string_value(&p.s_object_type);
            let fields: Vec<String> = p.s_object_fields.iter().map(|f| store.string_value(f)).collect();
            let filter = optional(store, p.query_filter.as_deref()).unwrap_or_default();
            let query = build_query(&s_object, &fields, &filter);
            ctx.platform
                .data_soql_query_csv(&user, Path::new(&csv_file), &query, None)?;
            return Ok(None);
        }
        StepKind::MdApiDeploy(p) => {
            let request = DeployRequest {
                target_user_name: store.string_value(&p.target_user_name),
                test_level: p.test_level,
                check_only: flag(store, p.check_only.as_ref()),
                deploy_dir: optional(store, p.deploy_dir.as_deref()),
                deploy_zip: optional(store, p.deploy_zip.as_deref()),
            };
            deploy_metadata(ctx.platform, &request)?
        }
        StepKind::MdApiRetrieve(p) => {
            let user = store.string_value(&p.target_user_name);
            let target_dir = store.string_value(&p.retrieve_target_dir);
            let manifest = optional(store, p.manifest_file.as_deref());
            let package_names: Option<Vec<String>> = p
                .package_names
                .as_ref()
                .map(|names| names.iter().map(|n| store.string_value(n)).collect());
            ctx.platform
                .mdapi_retrieve(&user, &target_dir, manifest.as_deref(), package_names.as_deref())?
        }
        StepKind::OrgCreateScratch(p) => {
            let request = ScratchOrgRequest {
                alias: store.string_value(&p.alias),
                no_ancestors: flag(store, p.no_ancestors.as_ref()),
                definition_file: store.string_value(&p.definition_file),
                dev_hub_user_name: store.string_value(&p.dev_hub_user_name),
                duration_days: store
                    .optional_number(p.duration.as_ref())
                    .unwrap_or(DEFAULT_SCRATCH_DURATION_DAYS),
                admin_email: p
                    .override_definition
                    .as_ref()
                    .and_then(|d| d.admin_email.as_deref())
                    .and_then(|email| optional(store, Some(email))),
            };
            ctx.platform.org_create_scratch(&request)?
        }
        StepKind::OrgDelete(p) => {
            let user = store.string_value(&p.target_user_name);
            let dev_hub = store.string_value(&p.dev_hub_user_name);
            ctx.platform.org_delete(&user, &dev_hub)?
        }
        StepKind::OrgDisplay(p) => {
            let user = store.string_value(&p.target_user_name);
            ctx.platform.org_display(&user)?
        }
        StepKind::PackageInstall(p) => {
            let user = store.string_value(&p.target_user_name);
            let package_id = store.string_value(&p.package_id);
            ctx.platform.package_install(&user, &package_id)?
        }
        StepKind::SourcePush(p) => {
            let user = store.string_value(&p.target_user_name);
            let force_overwrite = flag(store, p.force_overwrite.as_ref());
            ctx.platform.source_push(&user, force_overwrite)?
        }
        StepKind::Unsupported(step_type) => {
            return Err(Error::internal_unexpected(format!(
                "step type '{}' has no handler",
                step_type
            )))
        }
    };

    Ok(Some(payload))
}

/// Boolean flag; absent means false.
fn flag(store: &mut VariableStore, raw: Option<&ParamValue>) -> bool {
    raw.map(|value| store.boolean_value(value)).unwrap_or(false)
}

/// Optional string parameter; an empty resolution counts as absent.
fn optional(store: &mut VariableStore, raw: Option<&str>) -> Option<String> {
    raw.map(|value| store.string_value(value)).filter(|value| !value.is_empty())
}

fn item(store: &mut VariableStore, raw: &SObjectItem) -> SObjectItem {
    match raw {
        SObjectItem::Same(name) => SObjectItem::Same(store.string_value(name)),
        SObjectItem::Mapped { source, target } => SObjectItem::Mapped {
            source: store.string_value(source),
            target: store.string_value(target),
        },
    }
}

fn allowance(store: &mut VariableStore, batches: Option<&ParamValue>, records: Option<&ParamValue>) -> BulkAllowance {
    BulkAllowance {
        failed_batches: store.optional_number(batches),
        failed_records: store.optional_number(records),
    }
}

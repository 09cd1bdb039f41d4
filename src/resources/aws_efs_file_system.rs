//! `duplocloud_aws_efs_file_system`
//!
//! Creation returns before the file system is usable; with `wait_until_ready`
//! the resource polls `LifeCycleState` until it reports `available`.

use crate::diag::{DiagResult, Diagnostics};
use crate::diag_errorf;
use crate::duplosdk::aws_efs::{
    DuploEfs, DuploEfsCreateRequest, DuploEfsLifecyclePolicy, DuploEfsLifecycleRequest, DuploEfsUpdateRequest,
    TRANSITION_TO_IA_RULES, TRANSITION_TO_PRIMARY_STORAGE_CLASS_RULES,
};
use crate::duplosdk::names::unprefix_name;
use crate::duplosdk::types::DuploStringValue;
use crate::duplosdk::DuploClient;
use crate::resource::{parse_id, Resource};
use crate::resource_data::{key_value_to_state, ResourceData};
use crate::schema::{key_value_schema, Elem, Operation, ResourceSchema, Schema, Timeouts};
use crate::validation;
use crate::wait::{
    wait_for_resource_to_be_missing_after_delete, wait_for_resource_to_be_present_after_create, Context,
    StateChangeConf,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const READY_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub struct AwsEfsFileSystemResource;

fn lifecycle_policy_schema() -> Schema {
    Schema::list(Elem::Block(
        [
            (
                "transition_to_ia".to_string(),
                Schema::string()
                    .description("Indicates how long it takes to transition files to the IA storage class.")
                    .optional()
                    .validate(validation::string_in_slice(TRANSITION_TO_IA_RULES, false)),
            ),
            (
                "transition_to_primary_storage_class".to_string(),
                Schema::string()
                    .description("Describes the policy used to transition a file from infequent access storage to primary storage. Valid values: `AFTER_1_ACCESS`")
                    .optional()
                    .validate(validation::string_in_slice(TRANSITION_TO_PRIMARY_STORAGE_CLASS_RULES, false)),
            ),
        ]
        .into_iter()
        .collect(),
    ))
    .optional()
    .max_items(2)
}

fn efs_schema() -> ResourceSchema {
    ResourceSchema::new("`duplocloud_aws_efs_file_system` Provides an Elastic File System (EFS) File System resource in DuploCloud.")
        .field(
            "tenant_id",
            Schema::string()
                .description("The GUID of the tenant that the efs file system will be created in.")
                .required()
                .force_new()
                .validate(validation::is_uuid()),
        )
        .field(
            "name",
            Schema::string()
                .description("The name of the EFS, this needs to be unique within a region.")
                .required()
                .force_new(),
        )
        .field(
            "creation_token",
            Schema::string()
                .description("A unique name (a maximum of 64 characters are allowed) used as reference when creating the Elastic File System to ensure idempotent file system creation.")
                .optional()
                .computed()
                .force_new()
                .validate(validation::string_len_between(0, 64)),
        )
        .field("fullname", Schema::string().description("Duplo generated name of the EFS.").computed())
        .field("lifecycle_policy", lifecycle_policy_schema())
        .field("file_system_arn", Schema::string().description("Amazon Resource Name of the file system.").computed())
        .field("file_system_id", Schema::string().description("The ID that identifies the file system.").computed())
        .field("owner_id", Schema::string().description("The AWS account that created the file system.").computed())
        .field(
            "size_in_bytes",
            Schema::int()
                .description("The latest known metered size (in bytes) of data stored in the file system.")
                .computed(),
        )
        .field(
            "number_of_mount_targets",
            Schema::int()
                .description("The current number of mount targets that the file system has.")
                .computed(),
        )
        .field(
            "performance_mode",
            Schema::string()
                .description("The file system performance mode. Can be either `generalPurpose` or `maxIO`.")
                .optional()
                .default("generalPurpose")
                .validate(validation::string_in_slice(&["generalPurpose", "maxIO"], false)),
        )
        .field(
            "throughput_mode",
            Schema::string()
                .description("Throughput mode for the file system. When using `provisioned`, also set `provisioned_throughput_in_mibps`.")
                .optional()
                .default("bursting")
                .validate(validation::string_in_slice(&["bursting", "provisioned", "elastic"], false)),
        )
        .field(
            "provisioned_throughput_in_mibps",
            Schema::float()
                .description("The throughput, measured in MiB/s, that you want to provision for the file system. Only applicable with `throughput_mode` set to `provisioned`.")
                .optional()
                .computed(),
        )
        .field("tag", Schema::list(key_value_schema()).description("Tags of the file system.").optional().computed())
        .field(
            "wait_until_ready",
            Schema::bool()
                .description("Whether or not to wait until EFS to be available, after creation.")
                .optional()
                .default(true),
        )
        .field(
            "encrypted",
            Schema::bool()
                .description("If true, the disk will be encrypted.")
                .optional()
                .computed(),
        )
        .field(
            "backup",
            Schema::bool()
                .description("Specifies whether automatic backups are enabled on the file system that you are creating.")
                .optional()
                .computed(),
        )
        .timeouts(
            Timeouts::default()
                .create(Duration::from_secs(60 * 60))
                .delete(Duration::from_secs(15 * 60)),
        )
        .importable()
}

fn expand_efs(d: &ResourceData) -> DuploEfsCreateRequest {
    let throughput_mode = d.get_string("throughput_mode");
    let mut rq = DuploEfsCreateRequest {
        name: d.get_string("name"),
        performance_mode: d.get_string("performance_mode"),
        backup: d.get_bool("backup"),
        encrypted: d.get_bool("encrypted"),
        creation_token: d.get_string("creation_token"),
        ..Default::default()
    };
    if throughput_mode == "provisioned" {
        rq.provisioned_throughput_in_mibps = d.get_float("provisioned_throughput_in_mibps");
    }
    rq.throughput_mode = throughput_mode;
    rq
}

fn expand_lifecycle_policies(items: &[Value]) -> Vec<DuploEfsLifecyclePolicy> {
    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(DuploStringValue::new)
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|m| DuploEfsLifecyclePolicy {
            transition_to_ia: non_empty(m.get("transition_to_ia")),
            transition_to_primary_storage_class: non_empty(m.get("transition_to_primary_storage_class")),
            ..Default::default()
        })
        .collect()
}

fn flatten_lifecycle_policies(policies: &[DuploEfsLifecyclePolicy]) -> Vec<Value> {
    let value = |v: &Option<DuploStringValue>| v.as_ref().map(|s| s.value.clone()).unwrap_or_default();
    policies
        .iter()
        .filter(|p| p.transition_to_ia.is_some() || p.transition_to_primary_storage_class.is_some())
        .map(|p| {
            json!({
                "transition_to_ia": value(&p.transition_to_ia),
                "transition_to_primary_storage_class": value(&p.transition_to_primary_storage_class),
            })
        })
        .collect()
}

fn flatten_efs(d: &mut ResourceData, prefix: &str, efs: &DuploEfs) {
    let string_value = |v: &Option<DuploStringValue>| v.as_ref().map(|s| s.value.clone()).unwrap_or_default();

    d.set("name", unprefix_name(prefix, &efs.name).unwrap_or_default());
    d.set("fullname", efs.name.clone());
    d.set("file_system_arn", efs.file_system_arn.clone());
    d.set("file_system_id", efs.file_system_id.clone());
    d.set("owner_id", efs.owner_id.clone());
    d.set("size_in_bytes", efs.size_in_bytes.as_ref().map(|s| s.value).unwrap_or_default());
    d.set("number_of_mount_targets", efs.number_of_mount_targets);
    d.set("throughput_mode", string_value(&efs.throughput_mode));
    d.set("performance_mode", string_value(&efs.performance_mode));
    d.set("encrypted", efs.encrypted);
    d.set("tag", key_value_to_state("tag", &efs.tags));
    d.set("provisioned_throughput_in_mibps", efs.provisioned_throughput_in_mibps);
    d.set("creation_token", efs.creation_token.clone());
}

/// Poll until the file system reports `available`
async fn efs_wait_until_ready(
    ctx: &Context,
    client: &DuploClient,
    tenant_id: &str,
    efs_id: &str,
    timeout: Duration,
) -> DiagResult<()> {
    tracing::debug!("efsWaitUntilReady({}, {})", tenant_id, efs_id);
    let refresh = move || async move {
        let efs = client.duplo_efs_get(tenant_id, efs_id).await?;
        anyhow::Ok(efs.map(|efs| {
            tracing::trace!("EFS status is ({}).", efs.state());
            let status = if efs.is_available() { "ready" } else { "pending" };
            (efs, status.to_string())
        }))
    };
    StateChangeConf::new(refresh)
        .pending(&["pending"])
        .target(&["ready"])
        .poll_interval(READY_POLL_INTERVAL)
        .timeout(timeout)
        .wait_for_state(ctx)
        .await
        .map_err(Diagnostics::from_err)?;
    Ok(())
}

async fn put_lifecycle_policies(
    client: &DuploClient,
    tenant_id: &str,
    efs_id: &str,
    policies: Vec<DuploEfsLifecyclePolicy>,
    id: &str,
) -> DiagResult<()> {
    let rq = DuploEfsLifecycleRequest {
        file_system_id: efs_id.to_string(),
        lifecycle_policies: policies,
    };
    client
        .duplo_efs_lifecycle_policy_update(tenant_id, &rq)
        .await
        .map_err(|e| Diagnostics::errorf(format!("putting EFS file system ({}) lifecycle configuration: {}", id, e)))
}

#[async_trait]
impl Resource for AwsEfsFileSystemResource {
    fn name(&self) -> &'static str {
        "duplocloud_aws_efs_file_system"
    }

    fn schema(&self) -> ResourceSchema {
        efs_schema()
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        let name = d.get_string("name");
        tracing::trace!("resourceAwsEFSCreate({}, {}): start", tenant_id, name);

        let rq = expand_efs(d);
        let resp = client
            .duplo_efs_create(&tenant_id, &rq)
            .await
            .map_err(|e| Diagnostics::errorf(format!("Error creating tenant {} EFS '{}': {}", tenant_id, name, e)))?;

        let id = format!("{}/{}", tenant_id, resp.file_system_id);
        let (tid, efs_id) = (tenant_id.as_str(), resp.file_system_id.as_str());
        let get = move || client.duplo_efs_get(tid, efs_id);
        wait_for_resource_to_be_present_after_create(ctx, d, "AWS EFS", &id, get).await?;
        d.set_id(id.clone());

        if d.get_bool("wait_until_ready") {
            efs_wait_until_ready(ctx, client, tid, efs_id, d.timeout(Operation::Create)).await?;
        }

        if let Some(Value::Array(items)) = d.get_ok("lifecycle_policy") {
            put_lifecycle_policies(client, tid, efs_id, expand_lifecycle_policies(&items), &id).await?;
        }

        self.read(ctx, d, client).await?;
        tracing::trace!("resourceAwsEFSCreate({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let parts = parse_id(&id, 2, "resourceAwsEFSRead")?;
        let (tenant_id, efs_id) = (parts[0], parts[1]);
        tracing::trace!("resourceAwsEFSRead({}, {}): start", tenant_id, efs_id);

        let efs = match client.duplo_efs_get(tenant_id, efs_id).await {
            Ok(Some(efs)) => efs,
            Ok(None) => {
                d.set_id("");
                return Ok(());
            }
            Err(e) if e.is_not_found() => {
                d.set_id("");
                return Ok(());
            }
            Err(e) => return diag_errorf!("Unable to retrieve tenant {} EFS '{}': {}", tenant_id, efs_id, e),
        };

        let prefix = client
            .get_duplo_services_prefix(tenant_id)
            .await
            .map_err(Diagnostics::from_err)?;
        d.set("tenant_id", tenant_id);
        flatten_efs(d, &prefix, &efs);

        match client.duplo_efs_lifecycle_policy_get(tenant_id, efs_id).await {
            Ok(policies) => d.set("lifecycle_policy", flatten_lifecycle_policies(&policies)),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                return diag_errorf!(
                    "Unable to retrieve tenant {} EFS '{}' lifecycle policies: {}",
                    tenant_id,
                    efs_id,
                    e
                )
            }
        }

        tracing::trace!("resourceAwsEFSRead({}, {}): end", tenant_id, efs_id);
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        let efs_id = d.get_string("file_system_id");
        let id = d.id().to_string();
        tracing::trace!("resourceAwsEFSUpdate({}, {}): start", tenant_id, efs_id);

        if d.has_changes(&["provisioned_throughput_in_mibps", "throughput_mode"]) {
            let throughput_mode = d.get_string("throughput_mode");
            let mut rq = DuploEfsUpdateRequest {
                file_system_id: efs_id.clone(),
                throughput_mode: Some(DuploStringValue::new(throughput_mode.clone())),
                ..Default::default()
            };
            if throughput_mode == "provisioned" {
                rq.provisioned_throughput_in_mibps = d.get_float("provisioned_throughput_in_mibps");
            }
            client
                .duplo_efs_update(&tenant_id, &rq)
                .await
                .map_err(|e| Diagnostics::errorf(format!("updating EFS file system ({}): {}", id, e)))?;

            if d.get_bool("wait_until_ready") {
                efs_wait_until_ready(ctx, client, &tenant_id, &efs_id, d.timeout(Operation::Create)).await?;
            }
        }

        if d.has_change("lifecycle_policy") {
            let policies = expand_lifecycle_policies(&d.get_list("lifecycle_policy"));
            put_lifecycle_policies(client, &tenant_id, &efs_id, policies, &id).await?;
        }

        self.read(ctx, d, client).await?;
        tracing::trace!("resourceAwsEFSUpdate({}, {}): end", tenant_id, efs_id);
        Ok(())
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let parts = parse_id(&id, 2, "resourceAwsEFSDelete")?;
        let (tenant_id, efs_id) = (parts[0], parts[1]);
        tracing::trace!("resourceAwsEFSDelete({}, {}): start", tenant_id, efs_id);

        match client.duplo_efs_delete(tenant_id, efs_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return diag_errorf!("Unable to delete tenant {} EFS '{}': {}", tenant_id, efs_id, e),
        }

        let get = move || client.duplo_efs_get(tenant_id, efs_id);
        wait_for_resource_to_be_missing_after_delete(ctx, d, "AWS EFS", &id, get).await?;

        tracing::trace!("resourceAwsEFSDelete({}, {}): end", tenant_id, efs_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplosdk::aws_efs::DuploEfsSizeInBytes;

    fn data(config: Value) -> ResourceData {
        ResourceData::default().with_config(config.as_object().cloned().unwrap())
    }

    #[test]
    fn test_expand_ignores_throughput_unless_provisioned() {
        let d = data(json!({
            "name": "shared",
            "performance_mode": "generalPurpose",
            "throughput_mode": "bursting",
            "provisioned_throughput_in_mibps": 64.0,
        }));
        assert_eq!(expand_efs(&d).provisioned_throughput_in_mibps, 0.0);

        let d = data(json!({
            "name": "shared",
            "throughput_mode": "provisioned",
            "provisioned_throughput_in_mibps": 64.0,
        }));
        assert_eq!(expand_efs(&d).provisioned_throughput_in_mibps, 64.0);
    }

    #[test]
    fn test_expand_lifecycle_policies_skips_empty_values() {
        let policies = expand_lifecycle_policies(&[
            json!({"transition_to_ia": "AFTER_30_DAYS", "transition_to_primary_storage_class": ""}),
            json!({"transition_to_primary_storage_class": "AFTER_1_ACCESS"}),
        ]);
        assert_eq!(policies.len(), 2);
        assert_eq!(policies[0].transition_to_ia, Some(DuploStringValue::new("AFTER_30_DAYS")));
        assert!(policies[0].transition_to_primary_storage_class.is_none());
        assert!(policies[1].transition_to_ia.is_none());
    }

    #[test]
    fn test_flatten_lifecycle_policies_drops_archive_only_rules() {
        let policies = vec![
            DuploEfsLifecyclePolicy {
                transition_to_ia: Some(DuploStringValue::new("AFTER_7_DAYS")),
                ..Default::default()
            },
            DuploEfsLifecyclePolicy {
                transition_to_archive: Some(DuploStringValue::new("AFTER_90_DAYS")),
                ..Default::default()
            },
        ];
        assert_eq!(
            flatten_lifecycle_policies(&policies),
            vec![json!({"transition_to_ia": "AFTER_7_DAYS", "transition_to_primary_storage_class": ""})]
        );
    }

    #[test]
    fn test_flatten_efs() {
        let mut d = ResourceData::default();
        let efs = DuploEfs {
            name: "duploservices-dev-shared".into(),
            file_system_id: "fs-123".into(),
            size_in_bytes: Some(DuploEfsSizeInBytes {
                value: 6144,
                ..Default::default()
            }),
            throughput_mode: Some(DuploStringValue::new("bursting")),
            ..Default::default()
        };
        flatten_efs(&mut d, "duploservices-dev", &efs);
        assert_eq!(d.get_string("name"), "shared");
        assert_eq!(d.get_string("fullname"), "duploservices-dev-shared");
        assert_eq!(d.get_int("size_in_bytes"), 6144);
        assert_eq!(d.get_string("throughput_mode"), "bursting");
        assert_eq!(d.get_string("performance_mode"), "");
    }

    #[test]
    fn test_defaults() {
        let schema = efs_schema();
        assert_eq!(schema.get("performance_mode").unwrap().default, Some(json!("generalPurpose")));
        assert_eq!(schema.get("wait_until_ready").unwrap().default, Some(json!(true)));
    }
}

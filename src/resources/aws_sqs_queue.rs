//! `duplocloud_aws_sqs_queue`
//!
//! The resource id is `<tenant id>/<queue url>`. The remote name is the
//! tenant-decorated fullname, recovered from the URL.

use crate::diag::{DiagResult, Diagnostics};
use crate::diag_errorf;
use crate::duplosdk::aws_sqs::{DuploSqsQueue, SQS_QUEUE_TYPE_FIFO};
use crate::duplosdk::names::unwrap_name;
use crate::duplosdk::DuploClient;
use crate::resource::{parse_id, Resource};
use crate::resource_data::{get_optional_block_as_map, ResourceData};
use crate::schema::{Elem, ResourceSchema, Schema, Timeouts};
use crate::validation;
use crate::wait::{wait_for_resource_to_be_missing_after_delete, wait_for_resource_to_be_present_after_create, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const SQS_NAME_MAX_LENGTH: usize = 80;
/// Length of `duploservices-` plus the joining `-`, less the leading character
const SQS_PREFIX_OVERHEAD: usize = 15 - 1;
const FIFO_SUFFIX: &str = ".fifo";

const UPDATABLE_FIELDS: &[&str] = &[
    "message_retention_seconds",
    "visibility_timeout_seconds",
    "content_based_deduplication",
    "deduplication_scope",
    "fifo_throughput_limit",
    "delay_seconds",
    "dead_letter_queue_configuration",
];

pub struct AwsSqsQueueResource;

fn dead_letter_queue_schema() -> Schema {
    Schema::list(Elem::Block(
        [
            (
                "target_sqs_dlq_name".to_string(),
                Schema::string()
                    .description("Name of the SQS queue meant to be the target dead letter queue for this SQS resource (queues must belong to same tenant)")
                    .required()
                    .validate(validation::string_is_not_empty()),
            ),
            (
                "max_message_receive_attempts".to_string(),
                Schema::int()
                    .description("Maximum number of processing attempts for a given message before it is moved to the dead letter queue")
                    .required()
                    .validate(validation::int_between(1, 1000)),
            ),
        ]
        .into_iter()
        .collect(),
    ))
    .description("SQS configuration for the SQS resource")
    .optional()
    .max_items(1)
}

pub(crate) fn sqs_queue_schema() -> ResourceSchema {
    ResourceSchema::new("`duplocloud_aws_sqs_queue` manages a SQS queue in Duplo.")
        .field("arn", Schema::string().description("The ARN of the SQS queue.").computed())
        .field(
            "tenant_id",
            Schema::string()
                .description("The GUID of the tenant that the SQS queue will be created in.")
                .required()
                .force_new()
                .validate(validation::is_uuid()),
        )
        .field(
            "name",
            Schema::string()
                .description(
                    "The name of the queue. Queue names must be made up of only uppercase and lowercase ASCII letters, \
                     numbers, underscores, and hyphens, and have up to 80 characters long which is inclusive of duplo \
                     prefix (duploservices-{tenant_name}-) appended by the system.",
                )
                .required()
                .force_new(),
        )
        .field(
            "fifo_queue",
            Schema::bool()
                .description("Boolean designating a FIFO queue. If not set, it defaults to `false` making it standard.")
                .optional(),
        )
        .field(
            "message_retention_seconds",
            Schema::int()
                .description("The number of seconds Amazon SQS retains a message. Integer representing seconds, from 60 (1 minute) to 1209600 (14 days).")
                .optional()
                .computed()
                .validate(validation::int_between(60, 1_209_600)),
        )
        .field(
            "visibility_timeout_seconds",
            Schema::int()
                .description("The visibility timeout for the queue. An integer from 0 to 43200 (12 hours).")
                .optional()
                .computed()
                .validate(validation::int_between(0, 43_200)),
        )
        .field(
            "content_based_deduplication",
            Schema::bool()
                .description("Enables content-based deduplication for FIFO queues.")
                .optional()
                .computed(),
        )
        .field(
            "deduplication_scope",
            Schema::string()
                .description("Specifies whether message deduplication occurs at the message group or queue level. Valid values are `messageGroup` and `queue`.")
                .optional()
                .computed()
                .validate(validation::string_in_slice(&["messageGroup", "queue"], false)),
        )
        .field(
            "fifo_throughput_limit",
            Schema::string()
                .description("Specifies whether the FIFO queue throughput quota applies to the entire queue or per message group. Valid values are `perQueue` (default) and `perMessageGroupId`.")
                .optional()
                .computed()
                .validate(validation::string_in_slice(&["perQueue", "perMessageGroupId"], false)),
        )
        .field("fullname", Schema::string().description("The full name of the SQS queue.").computed())
        .field("url", Schema::string().description("The URL for the created Amazon SQS queue.").computed())
        .field(
            "delay_seconds",
            Schema::int()
                .description("Postpone the delivery of new messages to consumers for a number of seconds seconds range [0-900]")
                .optional()
                .computed()
                .validate(validation::int_between(0, 900)),
        )
        .field("dead_letter_queue_configuration", dead_letter_queue_schema())
        .timeouts(
            Timeouts::default()
                .create(Duration::from_secs(60 * 60))
                .delete(Duration::from_secs(15 * 60)),
        )
        .importable()
}

/// Check a short queue name against the room left by the tenant prefix
pub fn validate_sqs_name(account_name: &str, name: &str, fifo: bool) -> Result<(), String> {
    let mut allowed = SQS_NAME_MAX_LENGTH.saturating_sub(SQS_PREFIX_OVERHEAD + account_name.chars().count());
    if fifo {
        allowed = allowed.saturating_sub(FIFO_SUFFIX.len());
    }

    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            let rest: Vec<char> = chars.collect();
            rest.len() <= allowed
                && rest
                    .iter()
                    .all(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err("invalid name format. Queue names must be made up of only uppercase and lowercase ASCII letters, numbers, \
             underscores, and hyphens, and have up to 80 characters long which is inclusive of duplo prefix \
             (duploservices-{tenant_name}-) added by the system"
            .to_string())
    }
}

pub(crate) fn expand_sqs_queue(d: &ResourceData) -> DiagResult<DuploSqsQueue> {
    let mut rq = DuploSqsQueue {
        name: d.get_string("name"),
        queue_type: if d.get_bool("fifo_queue") { SQS_QUEUE_TYPE_FIFO } else { 0 },
        content_based_deduplication: d.get_bool("content_based_deduplication"),
        ..Default::default()
    };
    if d.get_ok("message_retention_seconds").is_some() {
        rq.message_retention_period = d.get_int("message_retention_seconds") as i32;
    }
    if d.get_ok("visibility_timeout_seconds").is_some() {
        rq.visibility_timeout = d.get_int("visibility_timeout_seconds") as i32;
    }
    if d.get_ok("delay_seconds").is_some() {
        rq.delay_seconds = d.get_int("delay_seconds") as i32;
    }
    if let Some(Value::String(scope)) = d.get_ok("deduplication_scope") {
        rq.deduplication_scope = i32::from(scope == "messageGroup");
    }
    if let Some(Value::String(limit)) = d.get_ok("fifo_throughput_limit") {
        rq.fifo_throughput_limit = i32::from(limit == "perMessageGroupId");
    }
    if let Some(dlq) = get_optional_block_as_map(d, "dead_letter_queue_configuration")? {
        rq.dead_letter_target_queue_name = dlq
            .get("target_sqs_dlq_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        rq.max_message_times_received_before_dead_letter_queue = dlq
            .get("max_message_receive_attempts")
            .and_then(Value::as_i64)
            .unwrap_or_default() as i32;
    }
    Ok(rq)
}

/// Write the queue attributes shared with the data source
pub(crate) fn flatten_sqs_queue(d: &mut ResourceData, queue: &DuploSqsQueue) {
    d.set("arn", queue.arn.clone());
    d.set("url", queue.url.clone());
    d.set("fifo_queue", queue.is_fifo());
    d.set("content_based_deduplication", queue.content_based_deduplication);
    d.set("message_retention_seconds", queue.message_retention_period);
    d.set("visibility_timeout_seconds", queue.visibility_timeout);
    d.set("delay_seconds", queue.delay_seconds);
    if queue.is_fifo() {
        let scope = if queue.deduplication_scope == 0 { "queue" } else { "messageGroup" };
        d.set("deduplication_scope", scope);
        let limit = if queue.fifo_throughput_limit == 0 { "perQueue" } else { "perMessageGroupId" };
        d.set("fifo_throughput_limit", limit);
    }
    if !queue.dead_letter_target_queue_name.is_empty() {
        d.set(
            "dead_letter_queue_configuration",
            json!([{
                "target_sqs_dlq_name": queue.dead_letter_target_queue_name,
                "max_message_receive_attempts": queue.max_message_times_received_before_dead_letter_queue,
            }]),
        );
    }
}

/// Short name of a queue from its fullname
pub(crate) fn sqs_short_name(prefix: &str, account_id: &str, fullname: &str, fifo: bool) -> String {
    let name = unwrap_name(prefix, account_id, fullname, true).unwrap_or_default();
    if fifo {
        name.trim_end_matches(FIFO_SUFFIX).to_string()
    } else {
        name
    }
}

#[async_trait]
impl Resource for AwsSqsQueueResource {
    fn name(&self) -> &'static str {
        "duplocloud_aws_sqs_queue"
    }

    fn schema(&self) -> ResourceSchema {
        sqs_queue_schema()
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        let name = d.get_string("name");
        tracing::trace!("resourceAwsSqsQueueCreate({}, {}): start", tenant_id, name);

        let rq = expand_sqs_queue(d)?;
        let tenant = client
            .tenant_get_v3(&tenant_id)
            .await
            .map_err(Diagnostics::from_err)?
            .ok_or_else(|| Diagnostics::errorf(format!("tenant '{}' not found", tenant_id)))?;
        validate_sqs_name(&tenant.account_name, &name, rq.is_fifo()).map_err(Diagnostics::errorf)?;

        let resp = client.duplo_sqs_queue_create_v3(&tenant_id, &rq).await.map_err(|e| {
            Diagnostics::errorf(format!(
                "Error creating tenant {} SQS queue '{}': {}",
                tenant_id, name, e
            ))
        })?;
        let fullname = client
            .extract_sqs_fullname(&tenant_id, &resp.url)
            .await
            .map_err(Diagnostics::from_err)?;

        // Wait for the ARN to be available.
        let (tid, full) = (tenant_id.as_str(), fullname.as_str());
        let get = move || async move {
            client
                .duplo_sqs_queue_get_v3(tid, full)
                .await
                .map(|queue| queue.filter(|q| !q.arn.is_empty()))
        };
        let kind_id = format!("{}/{}", tenant_id, name);
        wait_for_resource_to_be_present_after_create(ctx, d, "SQS Queue", &kind_id, get).await?;

        d.set_id(format!("{}/{}", tenant_id, resp.url));
        self.read(ctx, d, client).await?;
        tracing::trace!("resourceAwsSqsQueueCreate({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let parts = parse_id(&id, 2, "resourceAwsSqsQueueRead")?;
        let (tenant_id, url) = (parts[0], parts[1]);
        tracing::trace!("resourceAwsSqsQueueRead({}, {}): start", tenant_id, url);

        let account_id = client
            .tenant_get_aws_account_id(tenant_id)
            .await
            .map_err(Diagnostics::from_err)?;
        let fullname = crate::duplosdk::aws_sqs::sqs_fullname_from_url(&account_id, url)
            .map_err(Diagnostics::from_err)?;

        let queue = match client.duplo_sqs_queue_get_v3(tenant_id, &fullname).await {
            Ok(Some(queue)) => queue,
            Ok(None) => {
                d.set_id("");
                return Ok(());
            }
            Err(e) if e.is_not_found() => {
                d.set_id("");
                return Ok(());
            }
            Err(e) => {
                return diag_errorf!("Unable to retrieve tenant {} sqs queue {} : {}", tenant_id, url, e);
            }
        };

        let prefix = client
            .get_duplo_services_prefix(tenant_id)
            .await
            .map_err(Diagnostics::from_err)?;

        d.set("tenant_id", tenant_id);
        d.set("fullname", fullname.clone());
        flatten_sqs_queue(d, &queue);
        let name = sqs_short_name(&prefix, &account_id, &fullname, queue.is_fifo());
        d.set("name", name.clone());

        tracing::trace!("resourceAwsSqsQueueRead({}, {}): end", tenant_id, name);
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        if !d.has_changes(UPDATABLE_FIELDS) {
            return Ok(());
        }

        let tenant_id = d.get_string("tenant_id");
        let fullname = d.get_string("fullname");
        tracing::trace!("resourceAwsSqsQueueUpdate({}, {}): start", tenant_id, fullname);

        let mut rq = expand_sqs_queue(d)?;
        rq.name = fullname.clone();
        rq.url = d.get_string("url");
        client.duplo_sqs_queue_update_v3(&tenant_id, &rq).await.map_err(|e| {
            Diagnostics::errorf(format!(
                "Error updating tenant {} SQS queue '{}': {}",
                tenant_id, fullname, e
            ))
        })?;

        let (tid, full) = (tenant_id.as_str(), fullname.as_str());
        let get = move || client.duplo_sqs_queue_get_v3(tid, full);
        let kind_id = format!("{}/{}", tenant_id, fullname);
        wait_for_resource_to_be_present_after_create(ctx, d, "SQS Queue", &kind_id, get).await?;

        self.read(ctx, d, client).await?;
        tracing::trace!("resourceAwsSqsQueueUpdate({}, {}): end", tenant_id, fullname);
        Ok(())
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let id = d.id().to_string();
        let parts = parse_id(&id, 2, "resourceAwsSqsQueueDelete")?;
        let (tenant_id, url) = (parts[0], parts[1]);
        tracing::trace!("resourceAwsSqsQueueDelete({}, {}): start", tenant_id, url);

        let fullname = client
            .extract_sqs_fullname(tenant_id, url)
            .await
            .map_err(Diagnostics::from_err)?;

        match client.duplo_sqs_queue_delete_v3(tenant_id, &fullname).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => {
                return diag_errorf!("Unable to delete tenant {} sqs queue '{}': {}", tenant_id, fullname, e);
            }
        }

        let full = fullname.as_str();
        let get = move || client.duplo_sqs_queue_get_v3(tenant_id, full);
        wait_for_resource_to_be_missing_after_delete(ctx, d, "SQS Queue", &id, get).await?;

        tracing::trace!("resourceAwsSqsQueueDelete({}, {}): end", tenant_id, fullname);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(config: Value) -> ResourceData {
        ResourceData::default().with_config(config.as_object().cloned().unwrap())
    }

    #[test]
    fn test_validate_sqs_name_length_depends_on_tenant() {
        // 80 - (14 + 3) = 63 characters after the first one
        let ok = format!("q{}", "a".repeat(63));
        let too_long = format!("q{}", "a".repeat(64));
        assert!(validate_sqs_name("dev", &ok, false).is_ok());
        assert!(validate_sqs_name("dev", &too_long, false).is_err());
        assert!(validate_sqs_name("dev", &ok, true).is_err());
    }

    #[test]
    fn test_validate_sqs_name_charset() {
        assert!(validate_sqs_name("dev", "orders_in-1", false).is_ok());
        assert!(validate_sqs_name("dev", "1orders", false).is_err());
        assert!(validate_sqs_name("dev", "orders.fifo", false).is_err());
        assert!(validate_sqs_name("dev", "", false).is_err());
    }

    #[test]
    fn test_expand_fifo_queue() {
        let d = data(json!({
            "name": "orders",
            "fifo_queue": true,
            "deduplication_scope": "messageGroup",
            "fifo_throughput_limit": "perMessageGroupId",
            "delay_seconds": 5,
            "dead_letter_queue_configuration": [{"target_sqs_dlq_name": "dlq", "max_message_receive_attempts": 3}],
        }));
        let rq = expand_sqs_queue(&d).unwrap();
        assert!(rq.is_fifo());
        assert_eq!(rq.deduplication_scope, 1);
        assert_eq!(rq.fifo_throughput_limit, 1);
        assert_eq!(rq.delay_seconds, 5);
        assert_eq!(rq.dead_letter_target_queue_name, "dlq");
        assert_eq!(rq.max_message_times_received_before_dead_letter_queue, 3);
    }

    #[test]
    fn test_flatten_standard_queue_skips_fifo_fields() {
        let mut d = ResourceData::default();
        let queue = DuploSqsQueue {
            name: "duploservices-dev-orders".into(),
            arn: "arn:aws:sqs:us-west-2:123:duploservices-dev-orders".into(),
            message_retention_period: 345_600,
            ..Default::default()
        };
        flatten_sqs_queue(&mut d, &queue);
        assert!(!d.get_bool("fifo_queue"));
        assert_eq!(d.get_int("message_retention_seconds"), 345_600);
        assert_eq!(d.get("deduplication_scope"), Value::Null);
        assert_eq!(d.get("dead_letter_queue_configuration"), Value::Null);
    }

    #[test]
    fn test_sqs_short_name() {
        assert_eq!(
            sqs_short_name("duploservices-dev", "123", "duploservices-dev-orders.fifo", true),
            "orders"
        );
        assert_eq!(
            sqs_short_name("duploservices-dev", "123", "duploservices-dev-orders-123", false),
            "orders"
        );
    }
}

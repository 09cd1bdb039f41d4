//! `duplocloud_aws_sqs_queue`

use super::block;
use crate::diag::{DiagResult, Diagnostics};
use crate::diag_errorf;
use crate::duplosdk::DuploClient;
use crate::resource::DataSource;
use crate::resource_data::ResourceData;
use crate::resources::aws_sqs_queue::flatten_sqs_queue;
use crate::schema::{ResourceSchema, Schema};
use crate::validation;
use crate::wait::Context;
use async_trait::async_trait;
use serde_json::json;

pub struct AwsSqsQueueDataSource;

fn computed_string(description: &str) -> Schema {
    Schema::string().description(description).computed()
}

fn computed_int(description: &str) -> Schema {
    Schema::int().description(description).computed()
}

#[async_trait]
impl DataSource for AwsSqsQueueDataSource {
    fn name(&self) -> &'static str {
        "duplocloud_aws_sqs_queue"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("`duplocloud_aws_sqs_queue` retrieves an SQS queue in a Duplo tenant.")
            .field(
                "tenant_id",
                Schema::string()
                    .description("The GUID of the tenant that the SQS queue resides in.")
                    .required()
                    .validate(validation::is_uuid()),
            )
            .field(
                "name",
                Schema::string()
                    .description("The short name of the SQS queue. Add `fifo` suffix for FIFO queues.")
                    .required(),
            )
            .field("arn", computed_string("The ARN of the SQS queue."))
            .field("fullname", computed_string("The full name of the SQS queue."))
            .field("url", computed_string("The URL for the SQS queue."))
            .field("fifo_queue", Schema::bool().description("Boolean designating a FIFO queue.").computed())
            .field("message_retention_seconds", computed_int("The number of seconds Amazon SQS retains a message."))
            .field("visibility_timeout_seconds", computed_int("The visibility timeout for the queue."))
            .field(
                "content_based_deduplication",
                Schema::bool()
                    .description("Enables content-based deduplication for FIFO queues.")
                    .computed(),
            )
            .field(
                "deduplication_scope",
                computed_string("Specifies whether message deduplication occurs at the message group or queue level."),
            )
            .field(
                "fifo_throughput_limit",
                computed_string("Specifies whether the FIFO queue throughput quota applies to the entire queue or per message group."),
            )
            .field("delay_seconds", computed_int("Postpone the delivery of new messages to consumers for a number of seconds."))
            .field(
                "dead_letter_queue_configuration",
                Schema::list(block(vec![
                    (
                        "target_sqs_dlq_name",
                        computed_string("Name of the SQS queue meant to be the target dead letter queue."),
                    ),
                    (
                        "max_message_receive_attempts",
                        computed_int("Maximum number of processing attempts before moving to the dead letter queue."),
                    ),
                ]))
                .description("SQS dead letter queue configuration.")
                .computed(),
            )
            .field(
                "receive_wait_time_seconds",
                computed_int("The time for which a ReceiveMessage call will wait for a message to arrive."),
            )
    }

    async fn read(&self, _ctx: &Context, d: &mut ResourceData, client: &DuploClient) -> DiagResult<()> {
        let tenant_id = d.get_string("tenant_id");
        let name = d.get_string("name");
        tracing::trace!("dataSourceAwsSqsQueueRead({}, {}): start", tenant_id, name);

        let prefix = client
            .get_duplo_services_prefix(&tenant_id)
            .await
            .map_err(Diagnostics::from_err)?;
        let fullname = format!("{}-{}", prefix, name);

        let queue = match client.duplo_sqs_queue_get_v3(&tenant_id, &fullname).await {
            Ok(Some(queue)) => queue,
            Ok(None) => {
                return diag_errorf!(
                    "dataSourceAwsSqsQueueRead: SQS queue not found (tenant: {}, queue: {})",
                    tenant_id,
                    name
                )
            }
            Err(e) if e.is_not_found() => {
                return diag_errorf!(
                    "dataSourceAwsSqsQueueRead: SQS queue not found (tenant: {}, queue: {})",
                    tenant_id,
                    name
                )
            }
            Err(e) => {
                return diag_errorf!(
                    "dataSourceAwsSqsQueueRead: Unable to retrieve SQS queue (tenant: {}, queue: {}: error: {})",
                    tenant_id,
                    name,
                    e
                )
            }
        };

        d.set_id(format!("{}/{}", tenant_id, queue.url));
        d.set("tenant_id", tenant_id.clone());
        d.set("name", name.clone());
        d.set("fullname", fullname);
        flatten_sqs_queue(d, &queue);
        d.set("receive_wait_time_seconds", queue.receive_message_wait_time_seconds);
        if !queue.is_fifo() {
            d.set("deduplication_scope", "");
            d.set("fifo_throughput_limit", "");
        }
        if queue.dead_letter_target_queue_name.is_empty() {
            d.set("dead_letter_queue_configuration", json!([]));
        }

        tracing::trace!("dataSourceAwsSqsQueueRead({}, {}): end", tenant_id, name);
        Ok(())
    }
}

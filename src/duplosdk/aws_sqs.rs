//! SQS queue API (v3)

use super::client::DuploClient;
use super::error::{ClientError, ClientResult};
use super::types::null_default;
use serde::{Deserialize, Serialize};

/// `QueueType` of a FIFO queue
pub const SQS_QUEUE_TYPE_FIFO: i32 = 1;

fn is_zero(v: &i32) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// An SQS queue as returned and accepted by the v3 API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuploSqsQueue {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "String::is_empty")]
    pub arn: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub queue_type: i32,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub message_retention_period: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub visibility_timeout: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub receive_message_wait_time_seconds: i32,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "is_false")]
    pub content_based_deduplication: bool,
    #[serde(default)]
    pub deduplication_scope: i32,
    #[serde(default)]
    pub fifo_throughput_limit: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub resource_type: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub delay_seconds: i32,
    #[serde(default, deserialize_with = "null_default", skip_serializing_if = "String::is_empty")]
    pub dead_letter_target_queue_name: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_message_times_received_before_dead_letter_queue: i32,
}

impl DuploSqsQueue {
    pub fn is_fifo(&self) -> bool {
        self.queue_type == SQS_QUEUE_TYPE_FIFO
    }
}

/// Queue fullname from a queue URL, i.e. everything after `/<account id>/`
pub fn sqs_fullname_from_url(account_id: &str, url: &str) -> ClientResult<String> {
    let separator = format!("/{}/", account_id);
    url.split_once(&separator)
        .map(|(_, fullname)| fullname.to_string())
        .ok_or_else(|| ClientError::new("invalid SQS URL format"))
}

impl DuploClient {
    pub async fn duplo_sqs_queue_create_v3(&self, tenant_id: &str, rq: &DuploSqsQueue) -> ClientResult<DuploSqsQueue> {
        let queue: Option<DuploSqsQueue> = self
            .post_api_with_retry(
                &format!("DuploSQSQueueCreateV3({}, {})", tenant_id, rq.name),
                &format!("v3/subscriptions/{}/aws/sqs", tenant_id),
                rq,
            )
            .await?;
        Ok(queue.unwrap_or_default())
    }

    /// `rq.name` is the queue fullname.
    pub async fn duplo_sqs_queue_update_v3(&self, tenant_id: &str, rq: &DuploSqsQueue) -> ClientResult<DuploSqsQueue> {
        let queue: Option<DuploSqsQueue> = self
            .put_api_with_retry(
                &format!("DuploSQSQueueUpdateV3({}, {})", tenant_id, rq.name),
                &format!("v3/subscriptions/{}/aws/sqs/{}", tenant_id, rq.name),
                rq,
            )
            .await?;
        Ok(queue.unwrap_or_default())
    }

    pub async fn duplo_sqs_queue_list_v3(&self, tenant_id: &str) -> ClientResult<Vec<DuploSqsQueue>> {
        let list: Option<Vec<DuploSqsQueue>> = self
            .get_api_with_retry(
                &format!("DuploSQSQueueListV3({})", tenant_id),
                &format!("v3/subscriptions/{}/aws/sqs", tenant_id),
            )
            .await?;
        Ok(list.unwrap_or_default())
    }

    /// Find a queue by fullname
    pub async fn duplo_sqs_queue_get_v3(&self, tenant_id: &str, fullname: &str) -> ClientResult<Option<DuploSqsQueue>> {
        let list = self.duplo_sqs_queue_list_v3(tenant_id).await?;
        Ok(list.into_iter().find(|q| q.name == fullname))
    }

    pub async fn duplo_sqs_queue_delete_v3(&self, tenant_id: &str, fullname: &str) -> ClientResult<()> {
        self.delete_api_unit_with_retry(
            &format!("DuploSQSQueueDeleteV3({}, {})", tenant_id, fullname),
            &format!("v3/subscriptions/{}/aws/sqs/{}", tenant_id, fullname),
        )
        .await
    }

    /// Resolve a queue URL to its fullname using the tenant's AWS account
    pub async fn extract_sqs_fullname(&self, tenant_id: &str, url: &str) -> ClientResult<String> {
        let account_id = self.tenant_get_aws_account_id(tenant_id).await?;
        sqs_fullname_from_url(&account_id, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fullname_from_url() {
        let url = "https://sqs.us-west-2.amazonaws.com/123456789012/duploservices-dev-orders.fifo";
        assert_eq!(
            sqs_fullname_from_url("123456789012", url).unwrap(),
            "duploservices-dev-orders.fifo"
        );
        assert_eq!(
            sqs_fullname_from_url("999", url).unwrap_err().message(),
            "invalid SQS URL format"
        );
    }

    #[test]
    fn test_queue_always_sends_fifo_enums() {
        let rq = DuploSqsQueue {
            name: "orders".into(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&rq).unwrap(),
            serde_json::json!({"Name": "orders", "DeduplicationScope": 0, "FifoThroughputLimit": 0})
        );
    }

    #[test]
    fn test_is_fifo() {
        let queue: DuploSqsQueue = serde_json::from_str(r#"{"Name":"q","QueueType":1}"#).unwrap();
        assert!(queue.is_fifo());
    }
}

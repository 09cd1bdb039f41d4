//! Integration tests for the DuploCloud client and provider using wiremock
//!
//! These tests run the REST client and the provider callbacks against a
//! mocked DuploCloud API, covering headers, error classification, retries
//! and the create/read/delete round trips of a few resource types.

use duplocloud_provider::duplosdk::{DuploClient, HttpOptions, RetryConf};
use duplocloud_provider::provider::Provider;
use duplocloud_provider::wait::Context;
use serde_json::{json, Map, Value};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{bearer_token, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TENANT: &str = "8b1c0c5f-3b28-4b5a-9a4c-7c0bd0e1d3a1";

fn obj(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

fn client(server: &MockServer) -> DuploClient {
    DuploClient::new(&server.uri(), "test-token")
        .unwrap()
        .with_retry(RetryConf::immediate(3))
}

/// Test module for the REST client
mod client_tests {
    use super::*;

    /// Requests carry the bearer token and the DuploUser header
    #[tokio::test]
    async fn test_requests_carry_auth_headers() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/GetTenantsForUser"))
            .and(bearer_token("test-token"))
            .and(header("DuploUser", "ops@acme.io"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"TenantId": TENANT, "AccountName": "dev", "PlanID": "default"},
                {"TenantId": "other", "AccountName": "prod", "PlanID": null}
            ])))
            .mount(&server)
            .await;

        let options = HttpOptions {
            user_account: Some("ops@acme.io".to_string()),
            ..Default::default()
        };
        let client = DuploClient::with_options(&server.uri(), "test-token", &options).unwrap();
        let tenants = client.list_tenants_for_user().await.unwrap();

        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants[0].account_name, "dev");
        assert_eq!(tenants[1].plan_id, "");
    }

    /// Legacy endpoints get a hint appended to 404 messages
    #[tokio::test]
    async fn test_legacy_404_message_has_hint() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/subscriptions/{}/GetAwsAccountId", TENANT)))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .mount(&server)
            .await;

        let err = assert_err!(client(&server).tenant_get_aws_account_id(TENANT).await);
        assert!(err.is_not_found());
        assert!(err.possible_missing_api());
        assert!(err.message().contains("Please verify object exists in duplocloud."));
        assert!(err.response().contains_key("Message"));
    }

    /// v3 endpoints keep the original message
    #[tokio::test]
    async fn test_v3_404_message_has_no_hint() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/v3/admin/tenant/{}", TENANT)))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"Message": "tenant not found"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).tenant_get_v3(TENANT).await.unwrap_err();
        assert_eq!(err.status(), 404);
        assert!(!err.message().contains("Please verify"));
        assert_eq!(err.response()["Message"], json!("tenant not found"));
    }

    /// An API documented to return nothing must not return a body
    #[tokio::test]
    async fn test_unexpected_body_on_unit_api_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/admin/AddTenant"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"Surprise\":true}"))
            .mount(&server)
            .await;

        let rq = duplocloud_provider::duplosdk::tenant::DuploTenant {
            account_name: "dev".into(),
            plan_id: "default".into(),
            ..Default::default()
        };
        let err = client(&server).tenant_create(&rq).await.unwrap_err();
        assert_eq!(err.status(), -1);
        assert!(err.message().contains("received unexpected response"));
    }

    /// "Rate exceeded" failures are retried
    #[tokio::test]
    async fn test_rate_exceeded_is_retried() {
        let server = MockServer::start().await;
        let list_path = format!("/v3/subscriptions/{}/aws/sqs", TENANT);

        Mock::given(method("GET"))
            .and(path(list_path.as_str()))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"Message": "Rate exceeded"})))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(list_path.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"Name": "duploservices-dev-jobs"}])))
            .expect(1)
            .mount(&server)
            .await;

        let queues = assert_ok!(client(&server).duplo_sqs_queue_list_v3(TENANT).await);
        assert_eq!(queues.len(), 1);
        assert_eq!(queues[0].name, "duploservices-dev-jobs");
    }

    /// Errors other than throttling are returned right away
    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/v3/subscriptions/{}/aws/sqs", TENANT)))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"Message": "forbidden"})))
            .expect(1)
            .mount(&server)
            .await;

        let err = assert_err!(client(&server).duplo_sqs_queue_list_v3(TENANT).await);
        assert_eq!(err.status(), 403);
    }
}

/// Test module for provider callbacks
mod provider_tests {
    use super::*;

    fn config_map_path() -> String {
        format!("/v2/subscriptions/{}/K8ConfigMapApiV2", TENANT)
    }

    /// Creating a config map posts it and reads it back
    #[tokio::test]
    async fn test_k8_config_map_create_reads_back() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(config_map_path()))
            .and(body_partial_json(json!({
                "metadata": {"name": "app-settings"},
                "data": {"LOG_LEVEL": "debug"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{}/app-settings", config_map_path())))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metadata": {"name": "app-settings", "namespace": "duploservices-dev"},
                "data": {"LOG_LEVEL": "debug"}
            })))
            .mount(&server)
            .await;

        let provider = Provider::with_client(client(&server));
        let response = provider
            .create(
                &Context::background(),
                "duplocloud_k8_config_map",
                &obj(json!({
                    "tenant_id": TENANT,
                    "name": "app-settings",
                    "data": "{\"LOG_LEVEL\": \"debug\"}"
                })),
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{}", response.diagnostics);
        let state = response.state.unwrap();
        assert_eq!(
            state["id"],
            json!(format!("v2/subscriptions/{}/K8ConfigMapApiV2/app-settings", TENANT))
        );
        assert_eq!(state["tenant_id"], json!(TENANT));
        let metadata: Value = serde_json::from_str(state["metadata"].as_str().unwrap()).unwrap();
        assert_eq!(metadata["namespace"], json!("duploservices-dev"));
    }

    /// A config map gone from the backend is removed from state
    #[tokio::test]
    async fn test_k8_config_map_read_404_removes_state() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/app-settings", config_map_path())))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = Provider::with_client(client(&server));
        let state = obj(json!({
            "id": format!("v2/subscriptions/{}/K8ConfigMapApiV2/app-settings", TENANT),
            "tenant_id": TENANT,
            "name": "app-settings",
            "data": "{}"
        }));
        let response = provider
            .read(&Context::background(), "duplocloud_k8_config_map", &state)
            .await;

        assert!(response.state.is_none());
        assert!(!response.diagnostics.has_error());
    }

    /// Deleting a config map calls the item endpoint
    #[tokio::test]
    async fn test_k8_config_map_delete() {
        let server = MockServer::start().await;
        let item = format!("{}/app-settings", config_map_path());

        Mock::given(method("GET"))
            .and(path(item.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metadata": {"name": "app-settings"},
                "data": {}
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(item.as_str()))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let provider = Provider::with_client(client(&server));
        let state = obj(json!({
            "id": format!("v2/subscriptions/{}/K8ConfigMapApiV2/app-settings", TENANT),
            "tenant_id": TENANT,
            "name": "app-settings"
        }));
        let response = provider
            .delete(&Context::background(), "duplocloud_k8_config_map", &state)
            .await;

        assert!(response.state.is_none());
        assert!(response.diagnostics.is_empty(), "{}", response.diagnostics);
    }

    /// Deleting a tenant polls until the tenant is gone
    #[tokio::test]
    async fn test_tenant_delete_waits_until_missing() {
        let server = MockServer::start().await;
        let tenant_path = format!("/v3/admin/tenant/{}", TENANT);

        Mock::given(method("GET"))
            .and(path(tenant_path.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "TenantId": TENANT,
                "AccountName": "dev",
                "PlanID": "default"
            })))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(tenant_path.as_str()))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"Message": "tenant not found"})))
            .expect(1..)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/admin/DeleteTenant/{}", TENANT)))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = Provider::with_client(client(&server));
        let state = obj(json!({
            "id": format!("v2/admin/TenantV2/{}", TENANT),
            "tenant_id": TENANT,
            "account_name": "dev",
            "allow_deletion": true,
            "wait_until_deleted": false
        }));
        let response = provider
            .delete(&Context::background(), "duplocloud_tenant", &state)
            .await;

        assert!(response.state.is_none());
        assert!(response.diagnostics.is_empty(), "{}", response.diagnostics);
    }

    /// Secrets are looked up by name suffix
    #[tokio::test]
    async fn test_tenant_secret_data_source_by_suffix() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/subscriptions/{}/ListTenantSecrets", TENANT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"ARN": "arn:aws:secretsmanager:us-west-2:1:secret:a", "Name": "duploservices-dev-api-key"},
                {"ARN": "arn:aws:secretsmanager:us-west-2:1:secret:b", "Name": "duploservices-dev-db-password",
                 "RotationEnabled": true, "Tags": [{"Key": "team", "Value": "data"}]}
            ])))
            .mount(&server)
            .await;

        let provider = Provider::with_client(client(&server));
        let response = provider
            .read_data_source(
                &Context::background(),
                "duplocloud_tenant_secret",
                &obj(json!({"tenant_id": TENANT, "name_suffix": "db-password"})),
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{}", response.diagnostics);
        let state = response.state.unwrap();
        assert_eq!(state["id"], json!(format!("{}/duploservices-dev-db-password", TENANT)));
        assert_eq!(state["arn"], json!("arn:aws:secretsmanager:us-west-2:1:secret:b"));
        assert_eq!(state["rotation_enabled"], json!(true));
        assert_eq!(state["tags"], json!([{"key": "team", "value": "data"}]));
    }

    fn mock_tenant(account_name: &str) -> Mock {
        Mock::given(method("GET"))
            .and(path(format!("/v3/admin/tenant/{}", TENANT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "TenantId": TENANT,
                "AccountName": account_name
            })))
    }

    /// A missing queue is reported, not silently returned empty
    #[tokio::test]
    async fn test_sqs_data_source_not_found() {
        let server = MockServer::start().await;

        mock_tenant("dev").mount(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v3/subscriptions/{}/aws/sqs", TENANT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let provider = Provider::with_client(client(&server));
        let response = provider
            .read_data_source(
                &Context::background(),
                "duplocloud_aws_sqs_queue",
                &obj(json!({"tenant_id": TENANT, "name": "jobs"})),
            )
            .await;

        assert_eq!(
            response.diagnostics.to_string(),
            format!("dataSourceAwsSqsQueueRead: SQS queue not found (tenant: {}, queue: jobs)", TENANT)
        );
    }

    /// A standard queue is flattened with empty FIFO settings
    #[tokio::test]
    async fn test_sqs_data_source_found() {
        let server = MockServer::start().await;
        let url = "https://sqs.us-west-2.amazonaws.com/123456789012/duploservices-dev-jobs";

        mock_tenant("dev").mount(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v3/subscriptions/{}/aws/sqs", TENANT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "Name": "duploservices-dev-jobs",
                "Arn": "arn:aws:sqs:us-west-2:123456789012:duploservices-dev-jobs",
                "Url": url,
                "MessageRetentionPeriod": 345600,
                "VisibilityTimeout": 30,
                "ReceiveMessageWaitTimeSeconds": 10
            }])))
            .mount(&server)
            .await;

        let provider = Provider::with_client(client(&server));
        let response = provider
            .read_data_source(
                &Context::background(),
                "duplocloud_aws_sqs_queue",
                &obj(json!({"tenant_id": TENANT, "name": "jobs"})),
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{}", response.diagnostics);
        let state = response.state.unwrap();
        assert_eq!(state["id"], json!(format!("{}/{}", TENANT, url)));
        assert_eq!(state["fullname"], json!("duploservices-dev-jobs"));
        assert_eq!(state["fifo_queue"], json!(false));
        assert_eq!(state["receive_wait_time_seconds"], json!(10));
        assert_eq!(state["deduplication_scope"], json!(""));
        assert_eq!(state["dead_letter_queue_configuration"], json!([]));
    }

    /// Tenants can be filtered by plan
    #[tokio::test]
    async fn test_tenants_data_source_filters_by_plan() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/admin/GetTenantsForUser"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"TenantId": TENANT, "AccountName": "dev", "PlanID": "nonprod"},
                {"TenantId": "f00d", "AccountName": "prod", "PlanID": "prod"}
            ])))
            .mount(&server)
            .await;

        let provider = Provider::with_client(client(&server));
        let response = provider
            .read_data_source(
                &Context::background(),
                "duplocloud_tenants",
                &obj(json!({"plan_id": "prod"})),
            )
            .await;

        let state = response.state.unwrap();
        let tenants = state["tenants"].as_array().unwrap();
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0]["name"], json!("prod"));
        assert_eq!(state["id"], json!("user-tenants"));
    }

    /// Unknown types never reach the backend
    #[tokio::test]
    async fn test_unknown_resource_type() {
        let server = MockServer::start().await;
        let provider = Provider::with_client(client(&server));
        let response = provider
            .read(&Context::background(), "duplocloud_nope", &obj(json!({"id": "x"})))
            .await;
        assert!(response.diagnostics.to_string().starts_with("unknown resource type: duplocloud_nope"));
    }
}

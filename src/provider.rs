//! Provider
//!
//! Host-facing entry points: configure the API client, then validate, plan,
//! apply, read, import and destroy resources by type name. Every entry point
//! turns raw JSON objects into a [`ResourceData`], runs the matching
//! callback from the [`registry`](crate::resource::get_registry), and turns
//! the result back into a state object plus diagnostics.

use crate::config::Config;
use crate::diag::{DiagResult, Diagnostic, Diagnostics};
use crate::diag_errorf;
use crate::duplosdk::{DuploClient, HttpOptions};
use crate::resource::{
    get_all_data_source_names, get_all_resource_names, get_data_source, get_registry, get_resource, DataSource,
    Resource,
};
use crate::resource_data::ResourceData;
use crate::schema::{apply_defaults, validate_config, ResourceSchema, Schema, ValueType};
use crate::validation;
use crate::wait::Context;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Resolved provider settings
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub host: String,
    pub token: String,
    pub ssl_no_verify: bool,
    pub http_timeout: Duration,
    pub user_account: Option<String>,
}

impl ProviderConfig {
    /// Provider block, then the environment, then the persisted config file
    pub fn resolve(
        config: &Map<String, Value>,
        env: impl Fn(&str) -> Option<String>,
        file: &Config,
    ) -> DiagResult<Self> {
        let setting = |key: &str, env_keys: &[&str], fallback: &Option<String>| {
            config
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .or_else(|| env_keys.iter().find_map(|k| env(k).filter(|v| !v.is_empty())))
                .or_else(|| fallback.clone())
                .unwrap_or_default()
        };

        let host = setting("duplo_host", &["duplo_host", "DUPLO_HOST"], &file.duplo_host);
        let token = setting("duplo_token", &["duplo_token", "DUPLO_TOKEN"], &file.duplo_token);
        if host.is_empty() || token.is_empty() {
            return diag_errorf!(
                "missing provider config for 'duplo_token' 'duplo_host'. Not defined in environment var / main.tf"
            );
        }
        let host = validate_host(&host)?;

        let user_account = Some(setting("user_account", &[], &file.user_account)).filter(|s| !s.is_empty());
        let http_timeout = config
            .get("http_timeout")
            .and_then(Value::as_u64)
            .filter(|t| *t > 0)
            .unwrap_or(30);

        Ok(Self {
            host,
            token,
            ssl_no_verify: config.get("ssl_no_verify").and_then(Value::as_bool).unwrap_or(false),
            http_timeout: Duration::from_secs(http_timeout),
            user_account,
        })
    }

    pub fn client(&self) -> DiagResult<DuploClient> {
        let options = HttpOptions {
            timeout: self.http_timeout,
            insecure_skip_verify: self.ssl_no_verify,
            user_account: self.user_account.clone(),
        };
        DuploClient::with_options(&self.host, &self.token, &options).map_err(Diagnostics::from_err)
    }
}

/// Trim trailing slashes and require an http(s) URL
fn validate_host(host: &str) -> DiagResult<String> {
    let host = host.trim_end_matches('/');
    match url::Url::parse(host) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Ok(host.to_string()),
        Ok(u) => diag_errorf!("invalid duplo_host '{}': unsupported scheme '{}'", host, u.scheme()),
        Err(e) => diag_errorf!("invalid duplo_host '{}': {}", host, e),
    }
}

/// What applying a plan will do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    NoOp,
    Create,
    Update,
    Replace,
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub action: Action,
    pub planned_state: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires_replace: Vec<String>,
}

/// New state (absent once the object is gone) plus diagnostics
#[derive(Debug, Clone, Default, Serialize)]
pub struct Response {
    pub state: Option<Map<String, Value>>,
    pub diagnostics: Diagnostics,
}

impl Response {
    fn failed(diagnostics: Diagnostics) -> Self {
        Self {
            state: None,
            diagnostics,
        }
    }

    fn from_data(d: ResourceData, result: DiagResult<()>) -> Self {
        Self {
            state: d.into_state(),
            diagnostics: result.err().unwrap_or_default(),
        }
    }
}

/// Scalar rendering handed to diff suppression predicates
fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn collection_len(value: &Value) -> usize {
    value.as_array().map_or(0, Vec::len)
}

/// Whether a change to `key` is hidden by the field's suppression predicate
fn is_suppressed(key: &str, schema: &Schema, d: &ResourceData) -> bool {
    let Some(suppress) = schema.diff_suppress else {
        return false;
    };
    let (old, new) = d.get_change(key);
    match schema.value_type {
        ValueType::List | ValueType::Set if collection_len(&old) != collection_len(&new) => suppress(
            &format!("{}.#", key),
            &collection_len(&old).to_string(),
            &collection_len(&new).to_string(),
            d,
        ),
        _ => suppress(key, &render(&old), &render(&new), d),
    }
}

#[derive(Default)]
pub struct Provider {
    config: Option<ProviderConfig>,
    client: Option<DuploClient>,
}

impl Provider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema of the provider block
    pub fn schema() -> ResourceSchema {
        ResourceSchema::new("The DuploCloud provider manages resources of a DuploCloud portal.")
            .field(
                "duplo_host",
                Schema::string()
                    .description("This is the base URL to the Duplo REST API. It must be provided, but it can also be sourced from the `duplo_host` environment variable.")
                    .optional(),
            )
            .field(
                "duplo_token",
                Schema::string()
                    .description("This is a bearer token used to authenticate to the Duplo REST API. It must be provided, but it can also be sourced from the `duplo_token` environment variable.")
                    .optional()
                    .sensitive(),
            )
            .field(
                "ssl_no_verify",
                Schema::bool()
                    .description("Disable SSL certificate verification.")
                    .optional()
                    .default(false),
            )
            .field(
                "http_timeout",
                Schema::int()
                    .description("Timeout for HTTP requests in seconds.")
                    .optional()
                    .default(30)
                    .validate(validation::positive_integer()),
            )
            .field(
                "user_account",
                Schema::string()
                    .description("User account sent with every request in the `DuploUser` header.")
                    .optional(),
            )
    }

    /// Provider, resource and data source schemas, as printed by the `schema` command
    pub fn schemas_json() -> Value {
        let registry = get_registry();
        json!({
            "provider": Self::schema().to_json(),
            "resource_schemas": registry
                .resources
                .iter()
                .map(|(name, r)| (name.to_string(), r.schema().to_json()))
                .collect::<Map<String, Value>>(),
            "data_source_schemas": registry
                .data_sources
                .iter()
                .map(|(name, d)| (name.to_string(), d.schema().to_json()))
                .collect::<Map<String, Value>>(),
        })
    }

    /// Resolve settings and build the API client
    pub fn configure(&mut self, config: &Map<String, Value>, file: &Config) -> DiagResult<()> {
        let diags = validate_config(&Self::schema().fields, config);
        if diags.has_error() {
            return Err(diags);
        }
        let resolved = ProviderConfig::resolve(config, |k| std::env::var(k).ok(), file)?;
        tracing::debug!("configure: host={}", resolved.host);
        self.client = Some(resolved.client()?);
        self.config = Some(resolved);
        Ok(())
    }

    /// Use an already built client
    pub fn with_client(client: DuploClient) -> Self {
        Self {
            config: None,
            client: Some(client),
        }
    }

    pub fn config(&self) -> Option<&ProviderConfig> {
        self.config.as_ref()
    }

    fn client(&self) -> DiagResult<&DuploClient> {
        match &self.client {
            Some(client) => Ok(client),
            None => diag_errorf!("provider is not configured"),
        }
    }

    fn resource(name: &str) -> DiagResult<&'static dyn Resource> {
        match get_resource(name) {
            Some(r) => Ok(r),
            None => Err(Diagnostic::error(format!("unknown resource type: {}", name))
                .with_detail(format!("known types: {}", get_all_resource_names().join(", ")))
                .into()),
        }
    }

    fn data_source(name: &str) -> DiagResult<&'static dyn DataSource> {
        match get_data_source(name) {
            Some(d) => Ok(d),
            None => Err(Diagnostic::error(format!("unknown data source type: {}", name))
                .with_detail(format!("known types: {}", get_all_data_source_names().join(", ")))
                .into()),
        }
    }

    /// Check a resource configuration against its schema
    pub fn validate_resource_config(&self, type_name: &str, config: &Map<String, Value>) -> Diagnostics {
        match Self::resource(type_name) {
            Ok(resource) => validate_config(&resource.schema().fields, config),
            Err(diags) => diags,
        }
    }

    pub fn validate_data_source_config(&self, type_name: &str, config: &Map<String, Value>) -> Diagnostics {
        match Self::data_source(type_name) {
            Ok(data_source) => validate_config(&data_source.schema().fields, config),
            Err(diags) => diags,
        }
    }

    /// Compute the planned state and whether the change needs a replacement
    pub fn plan(
        &self,
        type_name: &str,
        prior_state: Option<&Map<String, Value>>,
        config: &Map<String, Value>,
    ) -> DiagResult<Plan> {
        let resource = Self::resource(type_name)?;
        let schema = resource.schema();
        validate_config(&schema.fields, config).into_result(())?;

        let mut config = config.clone();
        apply_defaults(&schema.fields, &mut config);

        let Some(prior) = prior_state else {
            return Ok(Plan {
                action: Action::Create,
                planned_state: config,
                requires_replace: Vec::new(),
            });
        };

        let d = ResourceData::new(schema.timeouts.clone())
            .with_state(prior.clone())
            .with_config(config);
        let mut planned = prior.clone();
        let mut changed = false;
        let mut requires_replace = Vec::new();
        for (key, field) in schema.fields.iter().filter(|(_, f)| f.is_configurable()) {
            if !d.has_change(key) || is_suppressed(key, field, &d) {
                continue;
            }
            let new = d.get(key);
            if new.is_null() && field.computed {
                continue;
            }
            tracing::debug!("plan({}, {}): {} changed", type_name, d.id(), key);
            changed = true;
            if field.force_new {
                requires_replace.push(key.clone());
            }
            planned.insert(key.clone(), new);
        }

        let action = match (changed, requires_replace.is_empty()) {
            (false, _) => Action::NoOp,
            (true, true) => Action::Update,
            (true, false) => Action::Replace,
        };
        Ok(Plan {
            action,
            planned_state: planned,
            requires_replace,
        })
    }

    pub async fn create(&self, ctx: &Context, type_name: &str, config: &Map<String, Value>) -> Response {
        let prepared = (|| {
            let resource = Self::resource(type_name)?;
            let schema = resource.schema();
            validate_config(&schema.fields, config).into_result(())?;
            let mut config = config.clone();
            apply_defaults(&schema.fields, &mut config);
            let d = ResourceData::new(schema.timeouts)
                .with_config(config)
                .with_id("")
                .new_resource();
            Ok::<_, Diagnostics>((resource, d, self.client()?))
        })();
        let (resource, mut d, client) = match prepared {
            Ok(prepared) => prepared,
            Err(diags) => return Response::failed(diags),
        };

        tracing::info!("create({})", type_name);
        let result = resource.create(ctx, &mut d, client).await;
        Response::from_data(d, result)
    }

    pub async fn read(&self, ctx: &Context, type_name: &str, state: &Map<String, Value>) -> Response {
        let (resource, client) = match Self::resource(type_name).and_then(|r| Ok((r, self.client()?))) {
            Ok(found) => found,
            Err(diags) => return Response::failed(diags),
        };
        let mut d = ResourceData::new(resource.schema().timeouts).with_state(state.clone());
        let result = resource.read(ctx, &mut d, client).await;
        if d.id().is_empty() {
            tracing::info!("read({}): object is gone, removing from state", type_name);
        }
        Response::from_data(d, result)
    }

    pub async fn update(
        &self,
        ctx: &Context,
        type_name: &str,
        prior_state: &Map<String, Value>,
        config: &Map<String, Value>,
    ) -> Response {
        let prepared = (|| {
            let resource = Self::resource(type_name)?;
            let schema = resource.schema();
            validate_config(&schema.fields, config).into_result(())?;
            let mut config = config.clone();
            apply_defaults(&schema.fields, &mut config);
            let d = ResourceData::new(schema.timeouts)
                .with_state(prior_state.clone())
                .with_config(config);
            Ok::<_, Diagnostics>((resource, d, self.client()?))
        })();
        let (resource, mut d, client) = match prepared {
            Ok(prepared) => prepared,
            Err(diags) => return Response::failed(diags),
        };

        tracing::info!("update({}, {})", type_name, d.id());
        let result = resource.update(ctx, &mut d, client).await;
        Response::from_data(d, result)
    }

    /// Delete the object; the state is dropped unless deletion failed
    pub async fn delete(&self, ctx: &Context, type_name: &str, state: &Map<String, Value>) -> Response {
        let (resource, client) = match Self::resource(type_name).and_then(|r| Ok((r, self.client()?))) {
            Ok(found) => found,
            Err(diags) => return Response::failed(diags),
        };
        let mut d = ResourceData::new(resource.schema().timeouts).with_state(state.clone());

        tracing::info!("delete({}, {})", type_name, d.id());
        match resource.delete(ctx, &mut d, client).await {
            Ok(()) => Response::default(),
            Err(diags) => Response {
                state: Some(state.clone()),
                diagnostics: diags,
            },
        }
    }

    /// Import by id: run the resource's import step, then read
    pub async fn import(&self, ctx: &Context, type_name: &str, id: &str) -> Response {
        let (resource, client) = match Self::resource(type_name).and_then(|r| Ok((r, self.client()?))) {
            Ok(found) => found,
            Err(diags) => return Response::failed(diags),
        };
        let schema = resource.schema();
        if !schema.importable {
            return Response::failed(Diagnostics::errorf(format!(
                "resource {} doesn't support import",
                type_name
            )));
        }

        let mut d = ResourceData::new(schema.timeouts).with_id(id);
        if let Err(diags) = resource.import(ctx, &mut d, client).await {
            return Response::failed(diags);
        }
        let result = resource.read(ctx, &mut d, client).await;
        if result.is_ok() && d.id().is_empty() {
            return Response::failed(
                Diagnostic::error(format!("Cannot import non-existent remote object {}", id)).into(),
            );
        }
        Response::from_data(d, result)
    }

    pub async fn read_data_source(&self, ctx: &Context, type_name: &str, config: &Map<String, Value>) -> Response {
        let prepared = (|| {
            let data_source = Self::data_source(type_name)?;
            let schema = data_source.schema();
            validate_config(&schema.fields, config).into_result(())?;
            let mut config = config.clone();
            apply_defaults(&schema.fields, &mut config);
            let d = ResourceData::new(schema.timeouts).with_config(config);
            Ok::<_, Diagnostics>((data_source, d, self.client()?))
        })();
        let (data_source, mut d, client) = match prepared {
            Ok(prepared) => prepared,
            Err(diags) => return Response::failed(diags),
        };

        tracing::info!("read_data_source({})", type_name);
        let result = data_source.read(ctx, &mut d, client).await;
        Response::from_data(d, result)
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::{
    FlowError, Result,
    delegate::{ApiRequest, DelegateError, with_retry},
    executor::{
        ExecContext,
        handlers::{NodeHandler, Step, advance},
    },
    graph::{Node, template, value_to_text},
};

const DEFAULT_RESULT_VARIABLE: &str = "api_response";
const ERROR_VARIABLE: &str = "api_error";

/// Calls the api delegate and stores the reply in the context.
pub struct ApiCallHandler;

impl ApiCallHandler {
    fn build_request(
        node: &Node,
        ctx: &ExecContext<'_>,
    ) -> Result<ApiRequest> {
        let scope = ctx.scope();
        let url = node.field_str("url").ok_or_else(|| FlowError::Configuration(format!("api_call node {} has no url", node.id)))?;

        let headers = match node.field("headers") {
            Some(Value::Object(headers)) => headers
                .iter()
                .map(|(k, v)| (k.clone(), template::render(&value_to_text(v).unwrap_or_default(), &scope)))
                .collect(),
            _ => HashMap::new(),
        };

        Ok(ApiRequest {
            method: node.field_str("method").unwrap_or("GET").to_uppercase(),
            url: template::resolve_template(url, &scope)?,
            headers,
            body: node.field("body").map(|b| template::resolve_json_value(b, &scope)).transpose()?,
            timeout: node.field("timeout_ms").and_then(Value::as_u64),
        })
    }
}

#[async_trait]
impl NodeHandler for ApiCallHandler {
    async fn run(
        &self,
        node: &Node,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Step> {
        let request = Self::build_request(node, ctx)?;
        let api = ctx.delegates.api.as_ref().ok_or_else(|| DelegateError::unavailable("api"))?;
        let config = ctx.config;

        match with_retry("api", config.delegate_max_retries, config.retry_backoff(), || api.call(&request)).await {
            Ok(reply) => {
                let variable = node.field_str("result_variable").unwrap_or(DEFAULT_RESULT_VARIABLE);
                ctx.state.context.set(variable, reply);
                advance(node, &ctx.scope())
            }
            Err(e) => match node.metadata.get_str("error_target") {
                Some(target) => {
                    warn!(node = %node.id, url = %request.url, error = %e, "api call failed, following error target");
                    ctx.state.context.set(ERROR_VARIABLE, e.to_string());
                    Ok(Step::Advance(target.to_string()))
                }
                None => Err(e.into()),
            },
        }
    }
}

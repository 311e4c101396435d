//! The Lambda entry point: translates API Gateway proxy events into GraphQL
//! executions and back into proxy responses.

use std::{sync::Arc, time::Instant};

use aws_lambda_events::{
    encodings::Body,
    event::apigw::{ApiGatewayProxyRequest, ApiGatewayProxyResponse},
    query_map::QueryMap,
};
use base64::Engine as _;
use http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Method, StatusCode};
use juniper::http::{graphiql, playground, GraphQLBatchRequest, GraphQLRequest};
use lambda_runtime::LambdaEvent;
use serde::Deserialize;

use crate::{
    api,
    auth::{AuthConfig, Authenticator},
    prelude::*,
    store::CatalogStore,
};


#[derive(Debug, confique::Config)]
pub(crate) struct GatewayConfig {
    /// Path under which the GraphQL endpoint is reachable from the outside,
    /// e.g. `/dev/graphql` behind a stage prefix. Only used to render the
    /// explorer page; the actual routing is API Gateway's business.
    #[config(default = "/graphql")]
    pub(crate) endpoint: String,

    /// The interactive explorer page served for GET requests without a
    /// `query` parameter: `playground`, `graphiql` or `off`.
    #[config(default = "playground")]
    pub(crate) explorer: Explorer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Explorer {
    Playground,
    Graphiql,
    Off,
}


/// Everything a warm instance keeps alive across invocations: the schema, the
/// prepared auth keys and the (lazily connected) store handle.
pub(crate) struct Gateway {
    auth: Arc<Authenticator>,
    config: GatewayConfig,
    store: Arc<dyn CatalogStore>,
    root: api::RootNode,
}

impl Gateway {
    pub(crate) fn new(
        auth: AuthConfig,
        config: GatewayConfig,
        store: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            auth: Arc::new(Authenticator::new(auth)),
            config,
            store,
            root: api::root_node(),
        }
    }

    /// Serves one Lambda invocation. This never fails: anything that goes
    /// wrong is mapped to an HTTP-shaped response, so the runtime does not
    /// count ordinary bad requests as invocation errors.
    pub(crate) async fn handle(
        &self,
        event: LambdaEvent<serde_json::Value>,
    ) -> Result<ApiGatewayProxyResponse, lambda_runtime::Error> {
        Ok(self.respond(event).await)
    }

    async fn respond(&self, event: LambdaEvent<serde_json::Value>) -> ApiGatewayProxyResponse {
        let (payload, lambda_context) = event.into_parts();

        // Keep-warm pings are answered before anything else; in particular
        // they must not force a store connection.
        if is_warmup(&payload, &lambda_context) {
            debug!("Answering keep-warm ping");
            return text(StatusCode::OK, "warmed");
        }

        let request: ApiGatewayProxyRequest = match serde_json::from_value(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!("Invocation payload is not an API Gateway proxy request: {e}");
                return text(StatusCode::BAD_REQUEST, "invalid request");
            }
        };

        trace!(
            "Incoming {} request to '{}'",
            request.http_method,
            request.path.as_deref().unwrap_or("/"),
        );

        // Sort out method and request shape before we bother connecting
        // anywhere.
        let gql = match self.graphql_request(&request) {
            Ok(Some(gql)) => gql,
            Ok(None) => return self.explorer(),
            Err(response) => return response,
        };

        // The first real request on a cold instance connects to the store
        // here; warm instances reuse the connection.
        if let Err(e) = self.store.ensure_ready().await {
            error!("Store is not reachable, cannot serve API request: {e}");
            return text(StatusCode::SERVICE_UNAVAILABLE, "store unavailable");
        }

        let before = Instant::now();
        let api_context = api::Context {
            store: self.store.clone(),
            auth: self.auth.clone(),
            current_user: self.auth.current_user(&request.headers, &*self.store).await,
        };

        let response = gql.execute(&self.root, &api_context).await;
        // Resolver errors still count as a successful execution (they travel
        // in the `errors` array of a 200 response); only requests the GraphQL
        // layer itself rejected get a 400.
        let status = if response.is_ok() { StatusCode::OK } else { StatusCode::BAD_REQUEST };
        debug!("Finished GraphQL request in {:.2?}", before.elapsed());

        match serde_json::to_string(&response) {
            Ok(body) => json(status, body),
            Err(e) => {
                error!("Failed to serialize GraphQL response: {e}");
                text(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }

    /// Extracts the GraphQL request, if there is one. `Ok(None)` means "serve
    /// the explorer page"; an `Err` is a ready-made error response.
    fn graphql_request(
        &self,
        request: &ApiGatewayProxyRequest,
    ) -> Result<Option<GraphQLBatchRequest>, ApiGatewayProxyResponse> {
        if request.http_method == Method::GET {
            match request.query_string_parameters.first("query") {
                Some(query) => get_request(query, &request.query_string_parameters).map(Some),
                None => Ok(None),
            }
        } else if request.http_method == Method::POST {
            let body = decode_body(request)?;
            match serde_json::from_str(&body) {
                Ok(gql) => Ok(Some(gql)),
                Err(e) => {
                    debug!("Rejecting POST body that is no GraphQL request: {e}");
                    Err(text(StatusCode::BAD_REQUEST, "invalid GraphQL request body"))
                }
            }
        } else {
            debug!("Rejecting {} request, only GET and POST are served", request.http_method);
            Err(text(StatusCode::METHOD_NOT_ALLOWED, "405 Method not allowed"))
        }
    }

    fn explorer(&self) -> ApiGatewayProxyResponse {
        // The explorer stays available in production: it does not expose any
        // information that isn't already exposed by the API itself.
        match self.config.explorer {
            Explorer::Playground => html(playground::playground_source(&self.config.endpoint, None)),
            Explorer::Graphiql => html(graphiql::graphiql_source(&self.config.endpoint, None)),
            Explorer::Off => text(StatusCode::NOT_FOUND, "404 Not found"),
        }
    }
}

/// Recognizes the keep-warm pings of `serverless-plugin-warmup`. Depending on
/// the plugin version they arrive as a custom payload or via the client
/// context, so both places are checked for the marker.
fn is_warmup(payload: &serde_json::Value, context: &lambda_runtime::Context) -> bool {
    const WARMUP_SOURCE: &str = "serverless-plugin-warmup";

    if payload.get("source").and_then(|source| source.as_str()) == Some(WARMUP_SOURCE) {
        return true;
    }

    context.client_context.as_ref().map_or(false, |cc| {
        cc.custom.get("source").map(String::as_str) == Some(WARMUP_SOURCE)
    })
}

/// Builds the request from GET parameters: `query`, plus optionally
/// `operationName` and `variables` (the latter as JSON string).
fn get_request(
    query: &str,
    params: &QueryMap,
) -> Result<GraphQLBatchRequest, ApiGatewayProxyResponse> {
    let operation_name = params.first("operationName").map(|s| s.to_owned());
    let variables: Option<juniper::InputValue> = match params.first("variables") {
        Some(raw) => match serde_json::from_str(raw) {
            Ok(variables) => Some(variables),
            Err(e) => {
                debug!("Rejecting GET with unparsable `variables` parameter: {e}");
                return Err(text(StatusCode::BAD_REQUEST, "invalid `variables` parameter"));
            }
        },
        None => None,
    };

    Ok(GraphQLBatchRequest::Single(GraphQLRequest::new(
        query.to_owned(),
        operation_name,
        variables,
    )))
}

/// Returns the request body as text, undoing the transport base64 if API
/// Gateway flagged it.
fn decode_body(request: &ApiGatewayProxyRequest) -> Result<String, ApiGatewayProxyResponse> {
    let body = match &request.body {
        Some(body) => body,
        None => {
            debug!("Rejecting POST without a body");
            return Err(text(StatusCode::BAD_REQUEST, "missing request body"));
        }
    };

    if !request.is_base64_encoded {
        return Ok(body.clone());
    }

    base64::engine::general_purpose::STANDARD
        .decode(body)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| {
            debug!("Rejecting POST with a body that is not valid base64");
            text(StatusCode::BAD_REQUEST, "body is not valid base64")
        })
}


// ===== Response helpers ======================================================================

fn response(status: StatusCode, content_type: &'static str, body: String) -> ApiGatewayProxyResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    ApiGatewayProxyResponse {
        status_code: status.as_u16() as i64,
        headers,
        multi_value_headers: HeaderMap::new(),
        body: Some(Body::Text(body)),
        is_base64_encoded: false,
    }
}

fn text(status: StatusCode, body: &str) -> ApiGatewayProxyResponse {
    response(status, "text/plain; charset=UTF-8", body.into())
}

fn json(status: StatusCode, body: String) -> ApiGatewayProxyResponse {
    response(status, "application/json", body)
}

fn html(body: String) -> ApiGatewayProxyResponse {
    response(StatusCode::OK, "text/html; charset=UTF-8", body)
}

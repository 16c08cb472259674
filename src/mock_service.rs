//! Mock tower service that answers Kubernetes API requests from an object tracker

use crate::client_utils::{extract_gvk, singular_kind};
use crate::error::Error;
use crate::label_selector::parse_label_selector;
use crate::options::PatchType;
use crate::reactor::list_object;
use crate::tracker::{filter_by_labels, ObjectTracker, GVK, GVR};
use crate::watcher::{RawEvent, SelectorFilter};
use crate::Result;
use bytes::Bytes;
use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use http_body::Frame;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use kube::api::WatchEvent;
use kube::client::Body as KubeBody;
use serde_json::{json, Value};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{BoxError, Service};
use tracing::{debug, trace};

/// Response body; watch responses stream newline-delimited JSON events.
pub type MockBody = UnsyncBoxBody<Bytes, BoxError>;

/// Parsed Kubernetes API path
#[derive(Debug, PartialEq)]
struct ParsedPath {
    group: String,
    version: String,
    namespace: Option<String>,
    resource: String,
    name: Option<String>,
    subresource: Option<String>,
}

impl ParsedPath {
    fn gvr(&self) -> GVR {
        GVR::new(self.group.clone(), self.version.clone(), self.resource.clone())
    }

    fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or_default()
    }

    fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    fn require_name(&self) -> Result<&str> {
        self.name
            .as_deref()
            .ok_or_else(|| Error::Invalid(format!("a name is required for {}", self.resource)))
    }

    /// Whether the request targets the status subresource. Any other
    /// subresource does not exist.
    fn is_status(&self) -> Result<bool> {
        match self.subresource.as_deref() {
            None => Ok(false),
            Some("status") => Ok(true),
            Some(other) => Err(Error::NotFound {
                kind: format!("{}/{}", self.resource, other),
                name: self.name.clone().unwrap_or_default(),
                namespace: self.namespace().to_string(),
            }),
        }
    }
}

/// Split an API path into its coordinates:
/// - /apis/longhorn.rancher.io/v1alpha1/engines
/// - /apis/longhorn.rancher.io/v1alpha1/namespaces/longhorn-system/engines
/// - /apis/longhorn.rancher.io/v1alpha1/namespaces/longhorn-system/engines/e1/status
/// - /api/v1/namespaces/default/configmaps/c1
fn parse_path(path: &str) -> Result<ParsedPath> {
    let invalid = || Error::NotFound {
        kind: "path".to_string(),
        name: path.to_string(),
        namespace: String::new(),
    };
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let (group, rest) = match parts.as_slice() {
        ["api", rest @ ..] => (String::new(), rest),
        ["apis", group, rest @ ..] => (group.to_string(), rest),
        _ => return Err(invalid()),
    };

    let (version, namespace, tail) = match rest {
        [version, "namespaces", namespace, tail @ ..] if !tail.is_empty() => {
            (version, Some(namespace.to_string()), tail)
        }
        [version, tail @ ..] if !tail.is_empty() => (version, None, tail),
        _ => return Err(invalid()),
    };

    match tail {
        [resource, rest @ ..] if rest.len() <= 2 => Ok(ParsedPath {
            group,
            version: version.to_string(),
            namespace,
            resource: resource.to_string(),
            name: rest.first().map(|s| s.to_string()),
            subresource: rest.get(1).map(|s| s.to_string()),
        }),
        _ => Err(invalid()),
    }
}

/// Query parameters the mock understands; everything else is ignored.
#[derive(Debug, Default, PartialEq)]
struct QueryParams {
    label_selector: Option<String>,
    resource_version: Option<String>,
    watch: bool,
    limit: Option<usize>,
}

fn parse_query(query: Option<&str>) -> QueryParams {
    let mut params = QueryParams::default();
    let Some(query) = query else {
        return params;
    };

    for pair in query.split('&') {
        let Some((key, raw)) = pair.split_once('=') else {
            continue;
        };
        // Form encoding turns spaces into '+'
        let spaced = raw.replace('+', " ");
        let value = urlencoding::decode(&spaced)
            .map(|v| v.into_owned())
            .unwrap_or(spaced);

        match key {
            "labelSelector" => params.label_selector = Some(value),
            "resourceVersion" => params.resource_version = Some(value),
            "watch" => params.watch = value == "true" || value == "1",
            "limit" => params.limit = value.parse().ok().filter(|l| *l > 0),
            _ => {}
        }
    }
    params
}

/// HTTP front end over an [`ObjectTracker`], usable as the transport of a
/// `kube::Client`.
///
/// Requests go straight to the tracker; they are not recorded as actions and
/// no reactors run.
#[derive(Clone)]
pub struct MockService {
    tracker: Arc<ObjectTracker>,
}

impl MockService {
    pub fn new(tracker: Arc<ObjectTracker>) -> Self {
        Self { tracker }
    }

    /// Wrap the service in a `kube::Client` defaulting to `default_namespace`.
    pub fn into_client(self, default_namespace: &str) -> kube::Client {
        kube::Client::new(self, default_namespace)
    }

    async fn handle_request(
        &self,
        req: Request<KubeBody>,
    ) -> std::result::Result<Response<MockBody>, BoxError> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = parse_query(req.uri().query());
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = req.into_body().collect().await?.to_bytes();

        trace!("{} {} {:?}", method, path, query);

        let result = match method.as_str() {
            "GET" => self.handle_get(&path, &query),
            "POST" => self.handle_post(&path, &body),
            "PUT" => self.handle_put(&path, &body),
            "PATCH" => self.handle_patch(&path, &body, content_type.as_deref()),
            "DELETE" => self.handle_delete(&path, &query),
            other => Err(Error::Invalid(format!("method {} is not supported", other))),
        };

        Ok(result.unwrap_or_else(|err| {
            debug!("{} {} failed: {}", method, path, err);
            error_response(&err)
        }))
    }

    fn handle_get(&self, path: &str, query: &QueryParams) -> Result<Response<MockBody>> {
        let parsed = parse_path(path)?;
        let gvr = parsed.gvr();

        if let Some(name) = &parsed.name {
            parsed.is_status()?;
            let object = self.tracker.get(&gvr, parsed.namespace(), name)?;
            return json_response(StatusCode::OK, &object);
        }

        if query.watch {
            return self.handle_watch(&parsed, query);
        }

        let scope = parsed.namespace.as_deref();
        let mut items = filter_by_labels(
            self.tracker.list(&gvr, scope)?,
            query.label_selector.as_deref(),
        )?;
        if let Some(limit) = query.limit {
            items.truncate(limit);
        }

        json_response(StatusCode::OK, &self.list_of(&parsed, items))
    }

    /// Stream events as newline-delimited JSON. A watch without a resource
    /// version, or from "0", starts with the current objects as ADDED events.
    fn handle_watch(&self, parsed: &ParsedPath, query: &QueryParams) -> Result<Response<MockBody>> {
        let selector = query
            .label_selector
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_label_selector)
            .transpose()
            .map_err(Error::Invalid)?;
        let replay = query
            .resource_version
            .as_deref()
            .is_none_or(|rv| rv.is_empty() || rv == "0");

        let (items, events) = self
            .tracker
            .list_and_watch(&parsed.gvr(), parsed.namespace.as_deref());
        let mut filter = SelectorFilter::new(selector);
        filter.seed(&items);
        let initial: Vec<RawEvent> = if replay {
            items.into_iter().map(WatchEvent::Added).collect()
        } else {
            Vec::new()
        };

        let frames = stream::iter(initial)
            .chain(events)
            .filter_map(move |event| future::ready(filter.apply(event)))
            .map(|event| -> std::result::Result<Frame<Bytes>, BoxError> {
                let mut line = serde_json::to_vec(&event)?;
                line.push(b'\n');
                Ok(Frame::data(Bytes::from(line)))
            });

        let mut response = Response::new(StreamBody::new(frames).boxed_unsync());
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(response)
    }

    fn handle_post(&self, path: &str, body: &Bytes) -> Result<Response<MockBody>> {
        let parsed = parse_path(path)?;
        if parsed.name.is_some() {
            return Err(Error::Invalid("POST must target a collection".to_string()));
        }

        let object = self.decode_object(&parsed, body)?;
        let gvk = extract_gvk(&object)?;
        let created = self
            .tracker
            .create(&parsed.gvr(), &gvk, object, parsed.namespace())?;
        json_response(StatusCode::CREATED, &created)
    }

    fn handle_put(&self, path: &str, body: &Bytes) -> Result<Response<MockBody>> {
        let parsed = parse_path(path)?;
        let name = parsed.require_name()?;
        let is_status = parsed.is_status()?;

        let object = self.decode_object(&parsed, body)?;
        let body_name = object
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str);
        if body_name != Some(name) {
            return Err(Error::Invalid(format!(
                "the name of the object ({}) does not match the name on the URL ({})",
                body_name.unwrap_or_default(),
                name
            )));
        }

        let gvk = extract_gvk(&object)?;
        let updated =
            self.tracker
                .update(&parsed.gvr(), &gvk, object, parsed.namespace(), is_status)?;
        json_response(StatusCode::OK, &updated)
    }

    fn handle_patch(
        &self,
        path: &str,
        body: &Bytes,
        content_type: Option<&str>,
    ) -> Result<Response<MockBody>> {
        let parsed = parse_path(path)?;
        let name = parsed.require_name()?;
        let is_status = parsed.is_status()?;

        let patched = self.tracker.patch(
            &parsed.gvr(),
            parsed.namespace(),
            name,
            PatchType::from_content_type(content_type),
            body,
            is_status,
        )?;
        json_response(StatusCode::OK, &patched)
    }

    fn handle_delete(&self, path: &str, query: &QueryParams) -> Result<Response<MockBody>> {
        let parsed = parse_path(path)?;
        let gvr = parsed.gvr();

        match &parsed.name {
            Some(name) => {
                let deleted = self.tracker.delete(&gvr, parsed.namespace(), name)?;
                json_response(StatusCode::OK, &deleted)
            }
            None => {
                let deleted = self.tracker.delete_collection(
                    &gvr,
                    parsed.namespace.as_deref(),
                    query.label_selector.as_deref(),
                )?;
                json_response(StatusCode::OK, &self.list_of(&parsed, deleted))
            }
        }
    }

    fn decode_object(&self, parsed: &ParsedPath, body: &Bytes) -> Result<Value> {
        let mut object: Value = serde_json::from_slice(body)
            .map_err(|e| Error::Invalid(format!("malformed request body: {}", e)))?;
        if !object.is_object() {
            return Err(Error::Invalid("request body must be an object".to_string()));
        }
        if object.get("apiVersion").is_none() {
            object["apiVersion"] = json!(parsed.api_version());
        }
        if object.get("kind").is_none() {
            object["kind"] = json!(self.kind_for(parsed));
        }
        Ok(object)
    }

    fn kind_for(&self, parsed: &ParsedPath) -> String {
        self.tracker
            .kind_of(&parsed.gvr())
            .map(|gvk| gvk.kind)
            .unwrap_or_else(|| singular_kind(&parsed.resource))
    }

    fn list_of(&self, parsed: &ParsedPath, items: Vec<Value>) -> Value {
        let kind = GVK::new(
            parsed.group.clone(),
            parsed.version.clone(),
            format!("{}List", self.kind_for(parsed)),
        );
        list_object(&self.tracker, &kind, items)
    }
}

fn full_body(bytes: Vec<u8>) -> MockBody {
    Full::new(Bytes::from(bytes))
        .map_err(|never| match never {})
        .boxed_unsync()
}

fn json_response(status: StatusCode, value: &Value) -> Result<Response<MockBody>> {
    let mut response = Response::new(full_body(serde_json::to_vec(value)?));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

/// Render an error as a `Status` object with the code and reason an API
/// server would use.
fn error_response(err: &Error) -> Response<MockBody> {
    let (status, reason) = err.status();
    let body = json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": err.to_string(),
        "reason": reason,
        "code": status.as_u16()
    });

    let mut response = Response::new(full_body(body.to_string().into_bytes()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

impl Service<Request<KubeBody>> for MockService {
    type Response = Response<MockBody>;
    type Error = BoxError;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<KubeBody>) -> Self::Future {
        let this = self.clone();
        async move { this.handle_request(req).await }.boxed()
    }
}

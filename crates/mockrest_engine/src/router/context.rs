use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

use mockrest_base::pal::http::{
    HttpBody, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpStatusCode,
};

/// Decoded query string as an ordered multimap.
///
/// Repeated keys keep every value in arrival order (`?id=1&id=2`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Parse an `application/x-www-form-urlencoded` string (`+` is a space).
    pub fn parse(query: &str) -> Self {
        let pairs = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(key), decode_component(value))
            })
            .collect();
        Self(pairs)
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`, in order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Remove every value for `key`, returning them.
    pub fn remove(&mut self, key: &str) -> Vec<String> {
        let (removed, kept) = std::mem::take(&mut self.0)
            .into_iter()
            .partition(|(k, _)| k == key);
        self.0 = kept;
        removed.into_iter().map(|(_, v)| v).collect()
    }

    /// Distinct keys in first-seen order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (key, _) in &self.0 {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to a JSON object; repeated keys become arrays of strings.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for key in self.keys() {
            let values = self.get_all(key);
            let value = match values.as_slice() {
                [single] => Value::String(single.to_string()),
                many => Value::Array(many.iter().map(|v| Value::String(v.to_string())).collect()),
            };
            object.insert(key.to_string(), value);
        }
        Value::Object(object)
    }
}

fn decode_component(component: &str) -> String {
    let spaced = component.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Per-request state passed through the stage pipeline.
///
/// Stages may rewrite the method and path (method override, nested resolution),
/// add query filters and body fields, and attach a result. The renderer reads
/// the result, status and response headers. A stage that sets a response ends
/// the pipeline.
#[derive(Debug)]
pub struct RenderContext {
    method: HttpMethod,
    path: String,
    original_url: String,
    query: QueryParams,
    pinned_filters: Vec<String>,
    headers: HttpHeaders,
    raw_body: HttpBody,
    body: Value,
    status: Option<HttpStatusCode>,
    response_headers: HttpHeaders,
    data: Option<Value>,
    response: Option<HttpResponse>,
}

impl RenderContext {
    pub fn from_request(request: HttpRequest) -> Self {
        let path = request.path().to_string();
        let query = QueryParams::parse(request.query_string());
        let (method, url, headers, raw_body) = request.into_parts();
        Self {
            method,
            path,
            original_url: url,
            query,
            pinned_filters: Vec::new(),
            headers,
            raw_body,
            body: Value::Object(Map::new()),
            status: None,
            response_headers: HttpHeaders::new(),
            data: None,
            response: None,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn set_method(&mut self, method: HttpMethod) {
        self.method = method;
    }

    /// The path used for dispatch, possibly rewritten by an earlier stage.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// The URL as received, before any rewriting.
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// The received path without its query string.
    pub fn original_path(&self) -> &str {
        self.original_url
            .split_once('?')
            .map_or(self.original_url.as_str(), |(path, _)| path)
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut QueryParams {
        &mut self.query
    }

    /// Add a query filter that applies even if no record has the field.
    pub fn pin_filter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.query.push(key.clone(), value);
        self.pinned_filters.push(key);
    }

    /// Whether `key` was added with [`RenderContext::pin_filter`].
    pub fn is_pinned_filter(&self, key: &str) -> bool {
        self.pinned_filters.iter().any(|pinned| pinned == key)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn raw_body(&self) -> &HttpBody {
        &self.raw_body
    }

    /// The decoded request body; an empty object until the body decoder ran.
    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    pub fn set_body(&mut self, body: Value) {
        self.body = body;
    }

    pub fn status(&self) -> Option<HttpStatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: HttpStatusCode) {
        self.status = Some(status);
    }

    pub fn response_headers(&self) -> &HttpHeaders {
        &self.response_headers
    }

    pub fn set_response_header(&mut self, name: &str, value: impl Into<String>) {
        self.response_headers.insert(name, value);
    }

    /// The result attached by a handler, if any.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn set_data(&mut self, data: Value) {
        self.data = Some(data);
    }

    /// Answer the request directly, skipping the remaining stages.
    pub fn respond(&mut self, response: HttpResponse) {
        self.response = Some(response);
    }

    pub fn take_response(&mut self) -> Option<HttpResponse> {
        self.response.take()
    }

    /// Scheme and host the request was addressed to, for absolute links.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.header("host").unwrap_or("localhost"))
    }
}

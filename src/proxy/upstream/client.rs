// Upstream client implementation
// Builds and sends the outbound half of every proxy route

use axum::http::Method;
use bytes::Bytes;
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Client, RequestBuilder,
};
use serde_json::Value;
use url::Url;

use super::normalize::{self, ProxyOutcome};
use crate::error::{AppResult, ProxyError};
use crate::proxy::config::ProxyConfig;

/// Verbs the upstream API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl ProxyMethod {
    fn as_reqwest(&self) -> reqwest::Method {
        match self {
            ProxyMethod::Get => reqwest::Method::GET,
            ProxyMethod::Post => reqwest::Method::POST,
            ProxyMethod::Put => reqwest::Method::PUT,
            ProxyMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl TryFrom<&Method> for ProxyMethod {
    type Error = ProxyError;

    fn try_from(method: &Method) -> Result<Self, Self::Error> {
        match *method {
            Method::GET => Ok(ProxyMethod::Get),
            Method::POST => Ok(ProxyMethod::Post),
            Method::PUT => Ok(ProxyMethod::Put),
            Method::DELETE => Ok(ProxyMethod::Delete),
            _ => Err(ProxyError::MethodNotAllowed),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    /// Multipart or urlencoded payload, sent byte for byte
    Form(Bytes),
}

/// One outbound call. Cheap to clone so the refresh path can replay it.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub url: Url,
    pub method: ProxyMethod,
    pub body: Option<RequestBody>,
    pub extra_headers: HeaderMap,
}

impl ProxyRequest {
    pub fn new(method: ProxyMethod, url: Url) -> Self {
        Self {
            url,
            method,
            body: None,
            extra_headers: HeaderMap::new(),
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// The caller's Content-Type carries the multipart boundary, so it is
    /// forwarded as-is.
    pub fn form(mut self, body: Bytes, content_type: HeaderValue) -> Self {
        self.body = Some(RequestBody::Form(body));
        self.extra_headers.insert(header::CONTENT_TYPE, content_type);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.extra_headers.insert(name, value);
        self
    }
}

pub struct UpstreamClient {
    http_client: Client,
    base_url: Url,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> AppResult<Self> {
        let base_url = Url::parse(&config.upstream_base_url)?;
        let http_client = crate::utils::http::create_client_with_proxy(
            config.request_timeout,
            Some(&config.upstream_proxy),
        );
        Ok(Self::with_client(http_client, base_url))
    }

    pub fn with_client(http_client: Client, base_url: Url) -> Self {
        Self {
            http_client,
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an upstream URL from path segments under the base URL.
    ///
    /// Segments are percent-encoded individually; dot segments are refused so
    /// a browser path cannot climb out of its scope prefix.
    pub fn endpoint<'a, I>(&self, segments: I, query: Option<&str>) -> Result<Url, ProxyError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ProxyError::BadRequest("Upstream base URL cannot be a base".into()))?;
            path.pop_if_empty();
            for segment in segments.into_iter().flat_map(|s| s.split('/')) {
                if segment.is_empty() {
                    continue;
                }
                if segment == "." || segment == ".." {
                    return Err(ProxyError::BadRequest("Invalid path".to_string()));
                }
                path.push(segment);
            }
        }
        url.set_query(query.filter(|q| !q.is_empty()));
        Ok(url)
    }

    /// Headers for one call: JSON content type unless the body is a form
    /// payload, bearer auth when a token is given, caller headers last.
    pub fn build_headers(
        request: &ProxyRequest,
        token: Option<&str>,
    ) -> Result<HeaderMap, ProxyError> {
        let mut headers = HeaderMap::new();

        if !matches!(request.body, Some(RequestBody::Form(_))) {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ProxyError::BadRequest("Malformed credential".to_string()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        for (name, value) in request.extra_headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        Ok(headers)
    }

    /// Prepare the outbound request without sending it.
    pub fn build(
        &self,
        request: &ProxyRequest,
        token: Option<&str>,
    ) -> Result<RequestBuilder, ProxyError> {
        let headers = Self::build_headers(request, token)?;

        let mut builder = self
            .http_client
            .request(request.method.as_reqwest(), request.url.clone())
            .headers(headers);

        builder = match &request.body {
            Some(RequestBody::Json(value)) => {
                let bytes = serde_json::to_vec(value)
                    .map_err(|e| ProxyError::BadRequest(format!("Unserializable body: {}", e)))?;
                builder.body(bytes)
            }
            Some(RequestBody::Form(bytes)) => builder.body(bytes.clone()),
            None => builder,
        };

        Ok(builder)
    }

    /// Send and normalize into a [`ProxyOutcome`]. Transport errors come back
    /// from reqwest untouched and are classified here, not in `build`.
    pub async fn dispatch(
        &self,
        request: &ProxyRequest,
        token: Option<&str>,
    ) -> Result<ProxyOutcome, ProxyError> {
        let builder = self.build(request, token)?;
        tracing::debug!(
            "Upstream {:?} {} (auth: {})",
            request.method,
            request.url.path(),
            token.is_some()
        );

        Ok(match builder.send().await {
            Ok(response) => normalize::normalize(response, token.is_some()).await,
            Err(e) => normalize::classify_transport(&e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> UpstreamClient {
        UpstreamClient::with_client(
            Client::new(),
            Url::parse("https://api.example.com/v1/").unwrap(),
        )
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let client = client();
        let url = client
            .endpoint(["/admin", "records", "12/notes"], Some("page=2&size=10"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/admin/records/12/notes?page=2&size=10"
        );

        let url = client.endpoint(["", "resumes"], Some("")).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/resumes");
    }

    #[test]
    fn test_endpoint_refuses_dot_segments() {
        let client = client();
        assert!(matches!(
            client.endpoint(["records", "../../admin/staff"], None),
            Err(ProxyError::BadRequest(_))
        ));
    }

    #[test]
    fn test_endpoint_encodes_segment_content() {
        let url = client().endpoint(["records", "a b?c"], None).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/records/a%20b%3Fc");
    }

    #[test]
    fn test_json_request_headers() {
        let request = ProxyRequest::new(
            ProxyMethod::Post,
            Url::parse("https://api.example.com/records").unwrap(),
        )
        .json(serde_json::json!({ "title": "x" }));

        let headers = UpstreamClient::build_headers(&request, Some("abc")).unwrap();
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc");
        assert!(headers[header::AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_form_request_keeps_caller_content_type() {
        let request = ProxyRequest::new(
            ProxyMethod::Post,
            Url::parse("https://api.example.com/resumes/upload").unwrap(),
        )
        .form(
            Bytes::from_static(b"--xyz\r\n"),
            HeaderValue::from_static("multipart/form-data; boundary=xyz"),
        );

        let headers = UpstreamClient::build_headers(&request, None).unwrap();
        assert_eq!(
            headers[header::CONTENT_TYPE],
            "multipart/form-data; boundary=xyz"
        );
        assert!(headers.get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_extra_headers_override_defaults() {
        let request = ProxyRequest::new(
            ProxyMethod::Get,
            Url::parse("https://api.example.com/templates").unwrap(),
        )
        .header(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"))
        .header(
            HeaderName::from_static("x-tenant"),
            HeaderValue::from_static("acme"),
        );

        let headers = UpstreamClient::build_headers(&request, Some("abc")).unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Basic Zm9v");
        assert_eq!(headers["x-tenant"], "acme");
    }

    #[test]
    fn test_build_does_not_touch_body() {
        let body = serde_json::json!({ "order": 3 });
        let request = ProxyRequest::new(
            ProxyMethod::Put,
            Url::parse("https://api.example.com/templates/3").unwrap(),
        )
        .json(body.clone());

        let built = client().build(&request, None).unwrap().build().unwrap();
        assert_eq!(built.method(), reqwest::Method::PUT);
        assert_eq!(
            built.body().and_then(|b| b.as_bytes()),
            Some(br#"{"order":3}"# as &[u8])
        );
        assert!(matches!(&request.body, Some(RequestBody::Json(v)) if *v == body));
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(ProxyMethod::try_from(&Method::PUT).unwrap(), ProxyMethod::Put);
        assert!(matches!(
            ProxyMethod::try_from(&Method::PATCH),
            Err(ProxyError::MethodNotAllowed)
        ));
    }
}

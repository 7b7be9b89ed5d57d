//! Wrapper around the inbound HTTP request.

use std::ops::Deref;

use http::HeaderMap;
use http::Method;
use http::Uri;
use http::header::ACCEPT;
use mediatype::MediaType;
use mediatype::MediaTypeList;
use mediatype::names::HTML;
use mediatype::names::TEXT;

use crate::graphql::GraphQLParams;
use crate::json_ext::Value;

/// An inbound GraphQL-over-HTTP request with its decoded JSON body.
///
/// The pipeline only ever reads it.
#[derive(Debug)]
pub struct Request {
    pub(crate) inner: http::Request<Value>,
}

impl Request {
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn body(&self) -> &Value {
        self.inner.body()
    }

    pub fn into_inner(self) -> http::Request<Value> {
        self.inner
    }

    /// The GraphQL parameters carried by this request.
    ///
    /// GET requests carry them in the query string and POST requests in the body.
    /// Any other method has none.
    pub fn graphql_params(&self) -> GraphQLParams {
        if is_http_method(&Method::GET, self.method()) {
            let query = self.uri().query().unwrap_or_default();
            GraphQLParams::from_urlencoded_query(query).unwrap_or_else(|error| {
                tracing::debug!(%error, "could not decode the query string");
                GraphQLParams::default()
            })
        } else if is_http_method(&Method::POST, self.method()) {
            GraphQLParams::from_body(self.body())
        } else {
            GraphQLParams::default()
        }
    }

    /// Whether the client is a browser asking for an interactive page rather than
    /// a GraphQL response.
    pub fn should_render_graphiql(&self) -> bool {
        is_http_method(&Method::GET, self.method()) && prefers_html(self.headers())
    }
}

impl Deref for Request {
    type Target = http::Request<Value>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<http::Request<Value>> for Request {
    fn from(inner: http::Request<Value>) -> Self {
        Self { inner }
    }
}

impl From<http::Request<()>> for Request {
    fn from(request: http::Request<()>) -> Self {
        let (parts, ()) = request.into_parts();
        Self {
            inner: http::Request::from_parts(parts, Value::Null),
        }
    }
}

/// Compares HTTP method names ignoring ASCII case.
pub fn is_http_method(expected: &Method, actual: &Method) -> bool {
    expected.as_str().eq_ignore_ascii_case(actual.as_str())
}

fn prefers_html(headers: &HeaderMap) -> bool {
    let text_html = MediaType::new(TEXT, HTML);

    headers.get_all(ACCEPT).iter().any(|value| {
        value
            .to_str()
            .map(|accept_str| {
                let mut list = MediaTypeList::new(accept_str);

                list.any(|mime| mime.as_ref() == Ok(&text_html))
            })
            .unwrap_or(false)
    })
}

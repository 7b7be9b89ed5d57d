//! Request processing errors.
use displaydoc::Display;
use http::HeaderMap;
use http::HeaderValue;
use http::StatusCode;
use http::header::ALLOW;
use thiserror::Error;

use crate::graphql;
use crate::graphql::ErrorExtension;
use crate::result;

/// Every way processing a request can fail.
///
/// Each variant knows its HTTP status, its transport headers and the GraphQL errors
/// reported to the client. All of them end up as a single [`result::Response`] whose
/// payload is `{ "data": null, "errors": [...] }`.
#[derive(Error, Display, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProcessRequestError {
    /// GraphQL only supports GET and POST requests.
    MethodNotAllowed,

    /// Must provide query string.
    MissingQuery,

    /// GraphQL syntax error.
    Syntax(graphql::Error),

    /// GraphQL validation error.
    Validation(Vec<graphql::Error>),

    /// Could not determine what operation to execute.
    UnknownOperation,

    /// Can only perform a mutation operation from a POST request.
    MutationOverGet,

    /// Variables are invalid JSON.
    InvalidVariables,

    /// Unexpected error encountered while executing GraphQL request.
    Execution(String),
}

impl ProcessRequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProcessRequestError::MethodNotAllowed | ProcessRequestError::MutationOverGet => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            ProcessRequestError::MissingQuery
            | ProcessRequestError::Syntax(_)
            | ProcessRequestError::Validation(_)
            | ProcessRequestError::UnknownOperation
            | ProcessRequestError::InvalidVariables => StatusCode::BAD_REQUEST,
            ProcessRequestError::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match self {
            ProcessRequestError::MethodNotAllowed => {
                headers.insert(ALLOW, HeaderValue::from_static("GET, POST"));
            }
            ProcessRequestError::MutationOverGet => {
                headers.insert(ALLOW, HeaderValue::from_static("POST"));
            }
            _ => {}
        }
        headers
    }

    /// The GraphQL errors reported to the client.
    ///
    /// Rejections that carry no engine errors report their own message.
    pub fn into_graphql_errors(self) -> Vec<graphql::Error> {
        let code = self.extension_code();
        match self {
            ProcessRequestError::Syntax(error) => {
                vec![error.with_default_extension_code(&code)]
            }
            ProcessRequestError::Validation(errors) => errors
                .into_iter()
                .map(|error| error.with_default_extension_code(&code))
                .collect(),
            // Only the message crosses the transport boundary.
            ProcessRequestError::Execution(message) => vec![
                graphql::Error::builder()
                    .message(message)
                    .extension_code(code)
                    .build(),
            ],
            other => vec![
                graphql::Error::builder()
                    .message(other.to_string())
                    .extension_code(code)
                    .build(),
            ],
        }
    }

    /// Convert the error to the single response sent to the client.
    pub fn into_response(self) -> result::Response {
        result::Response {
            status: self.status_code(),
            headers: self.headers(),
            payload: graphql::Response::from_errors(self.into_graphql_errors()),
        }
    }
}

impl ErrorExtension for ProcessRequestError {
    fn extension_code(&self) -> String {
        match self {
            ProcessRequestError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ProcessRequestError::MissingQuery => "MISSING_QUERY_STRING",
            ProcessRequestError::Syntax(_) => "GRAPHQL_PARSING_FAILED",
            ProcessRequestError::Validation(_) => "GRAPHQL_VALIDATION_FAILED",
            ProcessRequestError::UnknownOperation => "GRAPHQL_UNKNOWN_OPERATION_NAME",
            ProcessRequestError::MutationOverGet => "MUTATION_FORBIDDEN",
            ProcessRequestError::InvalidVariables => "INVALID_VARIABLES",
            ProcessRequestError::Execution(_) => "INTERNAL_SERVER_ERROR",
        }
        .to_string()
    }
}

/// Configuration loading errors.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
}

//! Turns GraphQL-over-HTTP requests into responses.
//!
//! [`process_request`] takes one request through method checks, parsing, validation,
//! operation selection and variable decoding, then hands it to a pluggable execution
//! engine. What comes back is a [`ProcessRequestResult`]: a single response, a
//! multipart response for incremental delivery, or a push feed for subscriptions.
//!
//! [`GraphQLService`] wraps the same pipeline in a [`tower::Service`].

#![warn(unreachable_pub)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod json_ext;

pub mod configuration;
mod context;
pub mod engine;
pub mod error;
pub mod graphql;
pub mod http_ext;
pub mod processor;
pub mod result;
mod service;

pub use configuration::Configuration;
pub use context::Context;
pub use error::ProcessRequestError;
pub use processor::ProcessRequestOptions;
pub use processor::process_request;
pub use result::ProcessRequestResult;
pub use result::ResponseSubscription;
pub use service::GraphQLService;

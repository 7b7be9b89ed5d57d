//! A [`tower::Service`] answering GraphQL-over-HTTP requests.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::Poll;

use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;

use crate::Configuration;
use crate::engine::ContextFactory;
use crate::engine::ExecuteFn;
use crate::engine::ParseFn;
use crate::engine::RootValueFactory;
use crate::engine::SubscribeFn;
use crate::engine::ValidateFn;
use crate::engine::ValidationRules;
use crate::http_ext;
use crate::processor::ProcessRequestOptions;
use crate::processor::process_request;
use crate::result::ProcessRequestResult;

/// Processes every request it receives against the same schema and engine.
///
/// GraphQL parameters are read from the query string of GET requests and from the
/// body of POST requests.
#[derive(Clone)]
pub struct GraphQLService {
    schema: Arc<Valid<Schema>>,
    parse: ParseFn,
    validate: ValidateFn,
    validation_rules: Option<ValidationRules>,
    execute: ExecuteFn,
    subscribe: SubscribeFn,
    context_factory: Option<ContextFactory>,
    root_value_factory: Option<RootValueFactory>,
}

#[buildstructor::buildstructor]
impl GraphQLService {
    #[builder(visibility = "pub")]
    #[allow(clippy::too_many_arguments)]
    fn new(
        schema: Arc<Valid<Schema>>,
        execute: ExecuteFn,
        configuration: Option<Configuration>,
        subscribe: Option<SubscribeFn>,
        validate: Option<ValidateFn>,
        validation_rules: Option<ValidationRules>,
        context_factory: Option<ContextFactory>,
        root_value_factory: Option<RootValueFactory>,
    ) -> Self {
        let configuration = configuration.unwrap_or_default();
        Self {
            schema,
            parse: ParseFn::from_configuration(&configuration),
            validate: validate.unwrap_or_default(),
            validation_rules,
            execute,
            subscribe: subscribe.unwrap_or_default(),
            context_factory,
            root_value_factory,
        }
    }
}

impl Service<http_ext::Request> for GraphQLService {
    type Response = ProcessRequestResult;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http_ext::Request) -> Self::Future {
        let params = request.graphql_params();
        let options = ProcessRequestOptions::builder()
            .request(request)
            .schema(self.schema.clone())
            .and_query(params.query)
            .and_operation_name(params.operation_name)
            .and_variables(params.variables)
            .and_validation_rules(self.validation_rules.clone())
            .parse(self.parse.clone())
            .validate(self.validate.clone())
            .execute(self.execute.clone())
            .subscribe(self.subscribe.clone())
            .and_context_factory(self.context_factory.clone())
            .and_root_value_factory(self.root_value_factory.clone())
            .build();

        async move { Ok(process_request(options).await) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;
    use test_log::test;
    use tower::ServiceExt;

    use super::*;
    use crate::engine::ExecutionArgs;
    use crate::graphql;
    use crate::json_ext::Value;

    fn service(configuration: Configuration) -> GraphQLService {
        let schema =
            Schema::parse_and_validate("type Query { hello(name: String): String }", "schema.graphql")
                .unwrap();
        GraphQLService::builder()
            .schema(Arc::new(schema))
            .configuration(configuration)
            .execute(ExecuteFn::new(|args: ExecutionArgs| async move {
                let name = args
                    .variables
                    .as_ref()
                    .and_then(|variables| variables.get("name"))
                    .cloned()
                    .unwrap_or(Value::Null);
                Ok(graphql::Response::builder()
                    .data(json!({ "hello": name }))
                    .build())
            }))
            .build()
    }

    async fn call(request: http_ext::Request) -> crate::result::Response {
        let result = service(Configuration::default())
            .oneshot(request)
            .await
            .unwrap();
        result.into_response().unwrap()
    }

    #[test(tokio::test)]
    async fn get_reads_the_query_string() {
        let request = http::Request::get(
            "/graphql?query=query%20Hello(%24name%3A%20String)%20%7B%20hello(name%3A%20%24name)%20%7D&variables=%7B%22name%22%3A%22Ada%22%7D",
        )
        .body(())
        .unwrap();

        let response = call(request.into()).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            serde_json_bytes::to_value(&response.payload).unwrap(),
            json!({ "data": { "hello": "Ada" } })
        );
    }

    #[test(tokio::test)]
    async fn post_reads_the_body() {
        let request = http::Request::post("/graphql")
            .body(json!({
                "query": "query Hello($name: String) { hello(name: $name) }",
                "operationName": "Hello",
                "variables": { "name": "Grace" }
            }))
            .unwrap();

        let response = call(request.into()).await;
        assert_eq!(
            serde_json_bytes::to_value(&response.payload).unwrap(),
            json!({ "data": { "hello": "Grace" } })
        );
    }

    #[test(tokio::test)]
    async fn post_without_query_is_a_bad_request() {
        let request = http::Request::post("/graphql").body(json!({})).unwrap();

        let response = call(request.into()).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.payload.data, Some(Value::Null));
    }

    #[test(tokio::test)]
    async fn other_methods_are_not_allowed() {
        let request = http::Request::builder()
            .method(Method::PUT)
            .uri("/graphql")
            .body(json!({ "query": "{ hello }" }))
            .unwrap();

        let response = call(request.into()).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test(tokio::test)]
    async fn configured_parser_limits_apply() {
        let configuration = Configuration::builder()
            .parser(crate::configuration::Parser::builder().token_limit(2).build())
            .build();
        let request = http::Request::post("/graphql")
            .body(json!({ "query": "{ hello hello hello }" }))
            .unwrap();

        let result = service(configuration)
            .oneshot(request.into())
            .await
            .unwrap();
        let response = result.into_response().unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.payload.errors.len(), 1);
    }
}

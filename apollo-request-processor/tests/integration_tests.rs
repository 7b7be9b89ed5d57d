use std::sync::Arc;

use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;
use apollo_request_processor::Configuration;
use apollo_request_processor::Context;
use apollo_request_processor::GraphQLService;
use apollo_request_processor::ProcessRequestOptions;
use apollo_request_processor::ProcessRequestResult;
use apollo_request_processor::engine::ContextFactory;
use apollo_request_processor::engine::ExecuteFn;
use apollo_request_processor::engine::ExecutionArgs;
use apollo_request_processor::engine::ExecutionOutcome;
use apollo_request_processor::engine::SubscribeFn;
use apollo_request_processor::graphql;
use apollo_request_processor::json_ext::Value;
use apollo_request_processor::process_request;
use futures::channel::mpsc;
use http::Method;
use http::StatusCode;
use http::header::ALLOW;
use pretty_assertions::assert_eq;
use serde_json_bytes::json;
use test_log::test;
use tower::BoxError;
use tower::ServiceExt;

const SCHEMA: &str = r#"
type Query {
  ping: String
  me: String
}

type Mutation {
  inc: Int
}

type Subscription {
  ticks: Int
}
"#;

fn schema() -> Arc<Valid<Schema>> {
    Arc::new(Schema::parse_and_validate(SCHEMA, "schema.graphql").unwrap())
}

fn resolver() -> ExecuteFn {
    ExecuteFn::new(|args: ExecutionArgs| async move {
        let me = args.context.get::<String>();
        Ok(graphql::Response::builder()
            .data(json!({ "ping": "pong", "me": me }))
            .build())
    })
}

fn response(result: ProcessRequestResult) -> apollo_request_processor::result::Response {
    result.into_response().expect("a single response")
}

#[test(tokio::test)]
async fn ping_over_get() {
    let request = http::Request::get("/graphql").body(()).unwrap();

    let result = process_request(
        ProcessRequestOptions::builder()
            .request(request)
            .schema(schema())
            .query("{ ping }")
            .execute(ExecuteFn::new(|_args| async {
                Ok(graphql::Response::builder()
                    .data(json!({ "ping": "pong" }))
                    .build())
            }))
            .build(),
    )
    .await;

    let response = response(result);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        serde_json_bytes::to_value(&response.payload).unwrap(),
        json!({ "data": { "ping": "pong" } })
    );
}

#[test(tokio::test)]
async fn mutation_over_get() {
    let request = http::Request::get("/graphql").body(()).unwrap();

    let result = process_request(
        ProcessRequestOptions::builder()
            .request(request)
            .schema(schema())
            .query("mutation { inc }")
            .execute(resolver())
            .build(),
    )
    .await;

    let response = response(result);
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers.get(ALLOW).unwrap(), "POST");
    assert_eq!(response.payload.data, Some(Value::Null));
}

#[test(tokio::test)]
async fn no_query_over_post() {
    let request = http::Request::post("/graphql").body(json!({})).unwrap();

    let result = process_request(
        ProcessRequestOptions::builder()
            .request(request)
            .schema(schema())
            .execute(resolver())
            .build(),
    )
    .await;

    let response = response(result);
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        serde_json_bytes::to_value(&response.payload).unwrap(),
        json!({
            "data": null,
            "errors": [{
                "message": "Must provide query string.",
                "extensions": { "code": "MISSING_QUERY_STRING" }
            }]
        })
    );
}

#[test(tokio::test)]
async fn service_with_context_factory() {
    let service = GraphQLService::builder()
        .schema(schema())
        .configuration(Configuration::default())
        .context_factory(ContextFactory::from_fn(|_execution| {
            let context = Context::new();
            context.insert("ada".to_string());
            Ok(context)
        }))
        .execute(resolver())
        .build();

    let request = http::Request::post("/graphql")
        .body(json!({ "query": "{ me }" }))
        .unwrap();
    let result = service.clone().oneshot(request.into()).await.unwrap();
    assert_eq!(
        serde_json_bytes::to_value(&response(result).payload).unwrap(),
        json!({ "data": { "ping": "pong", "me": "ada" } })
    );

    let request = http::Request::builder()
        .method(Method::DELETE)
        .uri("/graphql")
        .body(())
        .unwrap();
    let result = service.oneshot(request.into()).await.unwrap();
    let response = response(result);
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers.get(ALLOW).unwrap(), "GET, POST");
}

#[test(tokio::test)]
async fn subscription_consumed_and_cancelled_across_tasks() {
    let (sender, receiver) = mpsc::unbounded::<graphql::Response>();
    let receiver = Arc::new(parking_lot::Mutex::new(Some(receiver)));
    let subscribe = SubscribeFn::new(move |_args| {
        let events = receiver.lock().take();
        async move {
            let events = events.ok_or_else(|| BoxError::from("already subscribed"))?;
            Ok::<_, BoxError>(ExecutionOutcome::stream(events))
        }
    });

    let result = process_request(
        ProcessRequestOptions::builder()
            .request(http::Request::post("/graphql").body(Value::Null).unwrap())
            .schema(schema())
            .query("subscription { ticks }")
            .subscribe(subscribe)
            .execute(resolver())
            .build(),
    )
    .await;
    let ProcessRequestResult::Push(subscription) = result else {
        panic!("expected a push result");
    };

    let (seen_sender, mut seen) = mpsc::unbounded();
    let consumer = {
        let subscription = subscription.clone();
        tokio::spawn(async move {
            subscription
                .subscribe(|event| {
                    let _ = seen_sender.unbounded_send(event);
                })
                .await;
        })
    };

    for tick in 0..3 {
        sender
            .unbounded_send(graphql::Response::builder().data(json!({ "ticks": tick })).build())
            .unwrap();
    }
    for tick in 0..3 {
        let event = futures::StreamExt::next(&mut seen).await.unwrap();
        assert_eq!(event.data, Some(json!({ "ticks": tick })));
    }

    subscription.unsubscribe();
    consumer.await.unwrap();
    assert!(subscription.is_unsubscribed());
    // the engine side sees the feed go away
    assert!(sender.is_closed());

    subscription.unsubscribe();
}

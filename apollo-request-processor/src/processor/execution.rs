use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use apollo_compiler::Schema;
use apollo_compiler::validation::Valid;
use futures::FutureExt;
use tower::BoxError;
use tracing::Instrument;

use super::ExecutionContext;
use super::operation::OperationKind;
use crate::context::Context;
use crate::engine::ContextFactory;
use crate::engine::ExecuteFn;
use crate::engine::ExecutionArgs;
use crate::engine::ExecutionOutcome;
use crate::engine::RootValueFactory;
use crate::engine::SubscribeFn;
use crate::error::ProcessRequestError;
use crate::json_ext::Object;
use crate::result;
use crate::result::ProcessRequestResult;
use crate::result::ResponseSubscription;

/// The engine functions of one request.
pub(crate) struct Engine {
    pub(crate) execute: ExecuteFn,
    pub(crate) subscribe: SubscribeFn,
    pub(crate) context_factory: Option<ContextFactory>,
    pub(crate) root_value_factory: Option<RootValueFactory>,
}

/// Runs the context factory, then the root value factory.
pub(crate) async fn build_context(
    execution: &ExecutionContext,
    context_factory: Option<&ContextFactory>,
    root_value_factory: Option<&RootValueFactory>,
) -> Result<(Context, Object), BoxError> {
    let context = match context_factory {
        Some(factory) => factory.call(execution.clone()).await?,
        None => Context::new(),
    };
    let root_value = match root_value_factory {
        Some(factory) => factory.call(execution.clone()).await?,
        None => Object::new(),
    };
    Ok((context, root_value))
}

/// Subscriptions go to `subscribe`, every other operation to `execute`.
pub(crate) async fn dispatch(
    engine: &Engine,
    kind: OperationKind,
    args: ExecutionArgs,
) -> Result<ExecutionOutcome, BoxError> {
    let span = tracing::info_span!(
        "execute",
        "otel.kind" = "INTERNAL",
        "graphql.operation.type" = kind.as_str(),
        "graphql.operation.name" = args.operation_name.as_deref().unwrap_or_default(),
    );
    let outcome = match kind {
        OperationKind::Subscription => engine.subscribe.call(args),
        OperationKind::Query | OperationKind::Mutation => engine.execute.call(args),
    };
    outcome.instrument(span).await
}

pub(crate) fn classify(kind: OperationKind, outcome: ExecutionOutcome) -> ProcessRequestResult {
    match (kind, outcome) {
        (_, ExecutionOutcome::Response(response)) => {
            ProcessRequestResult::Response(result::Response::ok(response))
        }
        (OperationKind::Subscription, ExecutionOutcome::Stream(stream)) => {
            ProcessRequestResult::Push(ResponseSubscription::new(stream))
        }
        (OperationKind::Query | OperationKind::Mutation, ExecutionOutcome::Stream(stream)) => {
            ProcessRequestResult::MultipartResponse(ResponseSubscription::new(stream))
        }
    }
}

/// Builds the context, calls the engine and classifies what it produced.
///
/// Errors and panics of the factories or the engine become execution errors.
pub(crate) async fn execute_operation(
    engine: Engine,
    schema: Arc<Valid<Schema>>,
    execution: ExecutionContext,
    operation_name: Option<String>,
) -> Result<ProcessRequestResult, ProcessRequestError> {
    let kind = OperationKind::from(execution.operation.operation_type);

    let outcome = AssertUnwindSafe(async move {
        let (context, root_value) = build_context(
            &execution,
            engine.context_factory.as_ref(),
            engine.root_value_factory.as_ref(),
        )
        .await?;
        let args = ExecutionArgs {
            schema,
            document: execution.document,
            root_value,
            context,
            variables: execution.variables,
            operation_name,
        };
        dispatch(&engine, kind, args).await
    })
    .catch_unwind()
    .await;

    match outcome {
        Ok(Ok(outcome)) => Ok(classify(kind, outcome)),
        Ok(Err(error)) => {
            tracing::error!(%error, "execution failed");
            Err(ProcessRequestError::Execution(error.to_string()))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(%message, "execution panicked");
            Err(ProcessRequestError::Execution(message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "execution panicked".to_string()
    }
}

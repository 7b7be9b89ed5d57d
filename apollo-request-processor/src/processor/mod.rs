//! The GraphQL-over-HTTP request pipeline.
//!
//! One request goes through these stages, any of which may reject it:
//!
//! 1. the HTTP method must be GET or POST
//! 2. the document is parsed, unless it was provided pre-parsed
//! 3. mutations are refused over GET
//! 4. the document is validated against the schema
//! 5. the operation to execute is selected
//! 6. the variables are decoded
//! 7. the context and root value are built, then the operation is executed or
//!    subscribed to
//!
//! Rejections are reported as a single [`result::Response`](crate::result::Response).

mod document;
mod execution;
mod operation;
mod variables;


use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::validation::Valid;
use http::Method;
pub use operation::OperationKind;

use crate::engine::ContextFactory;
use crate::engine::ExecuteFn;
use crate::engine::ParseFn;
use crate::engine::RootValueFactory;
use crate::engine::SubscribeFn;
use crate::engine::ValidateFn;
use crate::engine::ValidationRules;
use crate::error::ProcessRequestError;
use crate::graphql::Query;
use crate::graphql::Variables;
use crate::http_ext;
use crate::http_ext::is_http_method;
use crate::json_ext::Object;
use crate::result::ProcessRequestResult;

/// What the context and root value factories know about the request.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ExecutionContext {
    /// The resolved document.
    pub document: ast::Document,
    /// The operation that is about to run.
    pub operation: Node<ast::OperationDefinition>,
    /// The decoded variables, if the request had any.
    pub variables: Option<Object>,
}

impl ExecutionContext {
    pub fn operation_kind(&self) -> OperationKind {
        OperationKind::from(self.operation.operation_type)
    }
}

/// Everything needed to process one request.
pub struct ProcessRequestOptions {
    request: http_ext::Request,
    schema: Arc<Valid<Schema>>,
    query: Option<Query>,
    operation_name: Option<String>,
    variables: Option<Variables>,
    validation_rules: Option<ValidationRules>,
    parse: ParseFn,
    validate: ValidateFn,
    execute: ExecuteFn,
    subscribe: SubscribeFn,
    context_factory: Option<ContextFactory>,
    root_value_factory: Option<RootValueFactory>,
}

#[buildstructor::buildstructor]
impl ProcessRequestOptions {
    /// Only `request`, `schema` and `execute` are required.
    ///
    /// `parse` defaults to the apollo-compiler parser with default limits,
    /// `validate` to [`validate_with_rules`](crate::engine::validate_with_rules) and
    /// `subscribe` to a function refusing every subscription.
    #[builder(visibility = "pub")]
    #[allow(clippy::too_many_arguments)]
    fn new(
        request: http_ext::Request,
        schema: Arc<Valid<Schema>>,
        execute: ExecuteFn,
        query: Option<Query>,
        operation_name: Option<String>,
        variables: Option<Variables>,
        validation_rules: Option<ValidationRules>,
        parse: Option<ParseFn>,
        validate: Option<ValidateFn>,
        subscribe: Option<SubscribeFn>,
        context_factory: Option<ContextFactory>,
        root_value_factory: Option<RootValueFactory>,
    ) -> Self {
        Self {
            request,
            schema,
            query,
            operation_name,
            variables,
            validation_rules,
            parse: parse.unwrap_or_default(),
            validate: validate.unwrap_or_default(),
            execute,
            subscribe: subscribe.unwrap_or_default(),
            context_factory,
            root_value_factory,
        }
    }
}

/// Processes one GraphQL request.
///
/// Never fails: every rejection is turned into a [`ProcessRequestResult::Response`]
/// with the matching status code.
pub async fn process_request(options: ProcessRequestOptions) -> ProcessRequestResult {
    match run(options).await {
        Ok(result) => result,
        Err(error) => {
            tracing::debug!(%error, status = %error.status_code(), "request rejected");
            ProcessRequestResult::Response(error.into_response())
        }
    }
}

async fn run(options: ProcessRequestOptions) -> Result<ProcessRequestResult, ProcessRequestError> {
    let ProcessRequestOptions {
        request,
        schema,
        query,
        operation_name,
        variables,
        validation_rules,
        parse,
        validate,
        execute,
        subscribe,
        context_factory,
        root_value_factory,
    } = options;

    let method = request.method();
    if !is_http_method(&Method::GET, method) && !is_http_method(&Method::POST, method) {
        return Err(ProcessRequestError::MethodNotAllowed);
    }

    let document = document::resolve_document(query, &parse)?;

    // The method policy only needs the operation kind, so it applies to invalid
    // documents too.
    if let Some(operation) = operation::find_operation(&document, operation_name.as_deref()) {
        operation::allow_method(operation.operation_type.into(), method)?;
    }

    document::validate_document(&schema, &document, &validate, validation_rules.as_ref())?;

    let operation = operation::select_operation(&document, operation_name.as_deref())?;
    let variables = variables::coerce_variables(variables)?;

    let engine = execution::Engine {
        execute,
        subscribe,
        context_factory,
        root_value_factory,
    };
    let execution = ExecutionContext {
        document,
        operation,
        variables,
    };
    execution::execute_operation(engine, schema, execution, operation_name).await
}

//! The pluggable GraphQL engine: parsing, validation, execution and subscriptions.
//!
//! The request pipeline never parses, validates or executes anything by itself. It
//! calls the functions defined here, which default to apollo-compiler where it has
//! an implementation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::parser::Parser;
use apollo_compiler::validation::Valid;
use futures::FutureExt;
use futures::Stream;
use futures::future::BoxFuture;
use tower::BoxError;

use crate::Configuration;
use crate::context::Context;
use crate::graphql;
use crate::graphql::ResponseStream;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::processor::ExecutionContext;

/// Name under which query sources are reported in diagnostics.
pub(crate) const QUERY_SOURCE_PATH: &str = "query.graphql";

/// Everything the execution engine needs to run one operation.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ExecutionArgs {
    pub schema: Arc<Valid<Schema>>,
    pub document: ast::Document,
    pub root_value: Object,
    pub context: Context,
    pub variables: Option<Object>,
    pub operation_name: Option<String>,
}

/// What the engine produced for one operation.
pub enum ExecutionOutcome {
    /// A single, complete result.
    Response(graphql::Response),
    /// An incremental delivery or a subscription event feed.
    Stream(ResponseStream),
}

impl ExecutionOutcome {
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = graphql::Response> + Send + 'static,
    {
        ExecutionOutcome::Stream(Box::pin(stream))
    }
}

impl From<graphql::Response> for ExecutionOutcome {
    fn from(response: graphql::Response) -> Self {
        ExecutionOutcome::Response(response)
    }
}

impl From<ResponseStream> for ExecutionOutcome {
    fn from(stream: ResponseStream) -> Self {
        ExecutionOutcome::Stream(stream)
    }
}

impl fmt::Debug for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Response(response) => {
                f.debug_tuple("Response").field(response).finish()
            }
            ExecutionOutcome::Stream(_) => f.write_str("Stream"),
        }
    }
}

type ParseCallback = dyn Fn(&str) -> Result<ast::Document, graphql::Error> + Send + Sync;

/// Turns query source text into a document.
///
/// A failure is reported as a single GraphQL error.
#[derive(Clone)]
pub struct ParseFn(Arc<ParseCallback>);

impl ParseFn {
    pub fn new<F>(parse: F) -> Self
    where
        F: Fn(&str) -> Result<ast::Document, graphql::Error> + Send + Sync + 'static,
    {
        Self(Arc::new(parse))
    }

    /// The apollo-compiler parser with the limits of `configuration`.
    pub fn from_configuration(configuration: &Configuration) -> Self {
        let limits = configuration.parser.clone();
        Self::new(move |source| parse_with_limits(&limits, source))
    }

    pub(crate) fn parse(&self, source: &str) -> Result<ast::Document, graphql::Error> {
        (self.0)(source)
    }
}

impl Default for ParseFn {
    fn default() -> Self {
        Self::from_configuration(&Configuration::default())
    }
}

fn parse_with_limits(
    limits: &crate::configuration::Parser,
    source: &str,
) -> Result<ast::Document, graphql::Error> {
    let mut parser = Parser::new().recursion_limit(limits.recursion_limit);
    if let Some(token_limit) = limits.token_limit {
        parser = parser.token_limit(token_limit);
    }
    let result = parser.parse_ast(source, QUERY_SOURCE_PATH);

    // Trace log recursion limit data
    let recursion_limit = parser.recursion_reached();
    tracing::trace!(?recursion_limit, "recursion limit data");

    // Only the first diagnostic is reported, later ones are usually follow-ups.
    let document = result.map_err(|invalid| {
        invalid
            .errors
            .iter()
            .next()
            .map(|diagnostic| graphql::Error::from(diagnostic.to_json()))
            .unwrap_or_else(|| {
                graphql::Error::builder()
                    .message("could not parse the query")
                    .build()
            })
    })?;

    // a document needs at least one definition
    if document.definitions.is_empty() {
        return Err(graphql::Error::builder()
            .message("Syntax Error: Unexpected <EOF>.")
            .build());
    }
    Ok(document)
}

/// A validation rule run against a parsed document.
pub trait ValidationRule: Send + Sync {
    /// Returns every violation of the rule, or nothing if the document follows it.
    fn validate(&self, schema: &Valid<Schema>, document: &ast::Document) -> Vec<graphql::Error>;
}

/// All validation rules of the GraphQL specification, as implemented by apollo-compiler.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpecifiedRules;

impl ValidationRule for SpecifiedRules {
    fn validate(&self, schema: &Valid<Schema>, document: &ast::Document) -> Vec<graphql::Error> {
        match document.to_executable_validate(schema) {
            Ok(_) => Vec::new(),
            Err(invalid) => invalid
                .errors
                .iter()
                .map(|diagnostic| graphql::Error::from(diagnostic.to_json()))
                .collect(),
        }
    }
}

struct FnRule<F>(F);

impl<F> ValidationRule for FnRule<F>
where
    F: Fn(&Valid<Schema>, &ast::Document) -> Vec<graphql::Error> + Send + Sync,
{
    fn validate(&self, schema: &Valid<Schema>, document: &ast::Document) -> Vec<graphql::Error> {
        (self.0)(schema, document)
    }
}

/// An ordered list of validation rules.
///
/// When a request supplies its own rules they replace [`SpecifiedRules`] entirely.
#[derive(Clone, Default)]
pub struct ValidationRules(Vec<Arc<dyn ValidationRule>>);

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: impl ValidationRule + 'static) -> Self {
        self.0.push(Arc::new(rule));
        self
    }

    /// Adds a rule written as a plain function.
    pub fn with_fn<F>(self, rule: F) -> Self
    where
        F: Fn(&Valid<Schema>, &ast::Document) -> Vec<graphql::Error> + Send + Sync + 'static,
    {
        self.with_rule(FnRule(rule))
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ValidationRule> {
        self.0.iter().map(|rule| rule.as_ref())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Arc<dyn ValidationRule>> for ValidationRules {
    fn from_iter<T: IntoIterator<Item = Arc<dyn ValidationRule>>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Debug for ValidationRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRules")
            .field("rules", &self.0.len())
            .finish()
    }
}

type ValidateCallback = dyn Fn(&Valid<Schema>, &ast::Document, Option<&ValidationRules>) -> Vec<graphql::Error>
    + Send
    + Sync;

/// Checks a document against the schema and returns every violation found.
#[derive(Clone)]
pub struct ValidateFn(Arc<ValidateCallback>);

impl ValidateFn {
    pub fn new<F>(validate: F) -> Self
    where
        F: Fn(&Valid<Schema>, &ast::Document, Option<&ValidationRules>) -> Vec<graphql::Error>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(validate))
    }

    pub(crate) fn validate(
        &self,
        schema: &Valid<Schema>,
        document: &ast::Document,
        rules: Option<&ValidationRules>,
    ) -> Vec<graphql::Error> {
        (self.0)(schema, document, rules)
    }
}

impl Default for ValidateFn {
    fn default() -> Self {
        Self::new(validate_with_rules)
    }
}

/// Runs `rules` in order, or [`SpecifiedRules`] when no rules are supplied.
pub fn validate_with_rules(
    schema: &Valid<Schema>,
    document: &ast::Document,
    rules: Option<&ValidationRules>,
) -> Vec<graphql::Error> {
    match rules {
        Some(rules) => rules
            .iter()
            .flat_map(|rule| rule.validate(schema, document))
            .collect(),
        None => SpecifiedRules.validate(schema, document),
    }
}

type EngineCallback =
    dyn Fn(ExecutionArgs) -> BoxFuture<'static, Result<ExecutionOutcome, BoxError>> + Send + Sync;

fn engine_callback<F, Fut, O>(engine: F) -> Arc<EngineCallback>
where
    F: Fn(ExecutionArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, BoxError>> + Send + 'static,
    O: Into<ExecutionOutcome>,
{
    Arc::new(move |args| engine(args).map(|result| result.map(Into::into)).boxed())
}

/// Executes query and mutation operations.
///
/// Returning a [`ExecutionOutcome::Stream`] means the result is delivered
/// incrementally, e.g. because of `@defer`.
#[derive(Clone)]
pub struct ExecuteFn(Arc<EngineCallback>);

impl ExecuteFn {
    pub fn new<F, Fut, O>(execute: F) -> Self
    where
        F: Fn(ExecutionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, BoxError>> + Send + 'static,
        O: Into<ExecutionOutcome>,
    {
        Self(engine_callback(execute))
    }

    pub(crate) fn call(
        &self,
        args: ExecutionArgs,
    ) -> BoxFuture<'static, Result<ExecutionOutcome, BoxError>> {
        (self.0)(args)
    }
}

/// Sets up subscription operations.
///
/// A subscription that could not be set up should be reported as a single
/// [`ExecutionOutcome::Response`] carrying the errors.
#[derive(Clone)]
pub struct SubscribeFn(Arc<EngineCallback>);

impl SubscribeFn {
    pub fn new<F, Fut, O>(subscribe: F) -> Self
    where
        F: Fn(ExecutionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, BoxError>> + Send + 'static,
        O: Into<ExecutionOutcome>,
    {
        Self(engine_callback(subscribe))
    }

    pub(crate) fn call(
        &self,
        args: ExecutionArgs,
    ) -> BoxFuture<'static, Result<ExecutionOutcome, BoxError>> {
        (self.0)(args)
    }
}

impl Default for SubscribeFn {
    fn default() -> Self {
        Self::new(|_args| async {
            Ok(graphql::Response::builder()
                .data(Value::Null)
                .error(
                    graphql::Error::builder()
                        .message("subscriptions are not supported")
                        .extension_code("SUBSCRIPTION_NOT_SUPPORTED")
                        .build(),
                )
                .build())
        })
    }
}

type ContextCallback =
    dyn Fn(ExecutionContext) -> BoxFuture<'static, Result<Context, BoxError>> + Send + Sync;

/// Builds the context value handed to the engine.
#[derive(Clone)]
pub struct ContextFactory(Arc<ContextCallback>);

impl ContextFactory {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context, BoxError>> + Send + 'static,
    {
        Self(Arc::new(move |execution| factory(execution).boxed()))
    }

    /// A factory that never suspends.
    pub fn from_fn<F>(factory: F) -> Self
    where
        F: Fn(ExecutionContext) -> Result<Context, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(move |execution| {
            futures::future::ready(factory(execution)).boxed()
        }))
    }

    pub(crate) fn call(
        &self,
        execution: ExecutionContext,
    ) -> BoxFuture<'static, Result<Context, BoxError>> {
        (self.0)(execution)
    }
}

type RootValueCallback =
    dyn Fn(ExecutionContext) -> BoxFuture<'static, Result<Object, BoxError>> + Send + Sync;

/// Builds the root value handed to the engine.
#[derive(Clone)]
pub struct RootValueFactory(Arc<RootValueCallback>);

impl RootValueFactory {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Object, BoxError>> + Send + 'static,
    {
        Self(Arc::new(move |execution| factory(execution).boxed()))
    }

    /// A factory that never suspends.
    pub fn from_fn<F>(factory: F) -> Self
    where
        F: Fn(ExecutionContext) -> Result<Object, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(move |execution| {
            futures::future::ready(factory(execution)).boxed()
        }))
    }

    pub(crate) fn call(
        &self,
        execution: ExecutionContext,
    ) -> BoxFuture<'static, Result<Object, BoxError>> {
        (self.0)(execution)
    }
}

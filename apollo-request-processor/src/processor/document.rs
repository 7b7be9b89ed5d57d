use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::validation::Valid;

use crate::engine::ParseFn;
use crate::engine::ValidateFn;
use crate::engine::ValidationRules;
use crate::error::ProcessRequestError;
use crate::graphql::Query;

/// Returns the document to execute.
///
/// Pre-parsed documents are used as-is, source text goes through `parse`. Only an
/// absent query counts as a missing one; empty text is left to the parser.
pub(crate) fn resolve_document(
    query: Option<Query>,
    parse: &ParseFn,
) -> Result<ast::Document, ProcessRequestError> {
    match query {
        Some(Query::Document(document)) => Ok(document),
        Some(Query::Source(source)) => {
            tracing::info_span!("parse_query", "otel.kind" = "INTERNAL")
                .in_scope(|| parse.parse(&source))
                .map_err(|error| {
                    tracing::debug!(%error, "GraphQL syntax error");
                    ProcessRequestError::Syntax(error)
                })
        }
        None => Err(ProcessRequestError::MissingQuery),
    }
}

/// Fails with every violation found in `document`.
pub(crate) fn validate_document(
    schema: &Valid<Schema>,
    document: &ast::Document,
    validate: &ValidateFn,
    validation_rules: Option<&ValidationRules>,
) -> Result<(), ProcessRequestError> {
    let errors = tracing::info_span!("validate_query", "otel.kind" = "INTERNAL")
        .in_scope(|| validate.validate(schema, document, validation_rules));

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(count = errors.len(), "GraphQL validation error");
        Err(ProcessRequestError::Validation(errors))
    }
}

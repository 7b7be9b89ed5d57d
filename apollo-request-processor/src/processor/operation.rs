use apollo_compiler::Node;
use apollo_compiler::ast;
use http::Method;

use crate::error::ProcessRequestError;
use crate::http_ext::is_http_method;

/// The kind of a GraphQL operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl From<ast::OperationType> for OperationKind {
    fn from(operation_type: ast::OperationType) -> Self {
        match operation_type {
            ast::OperationType::Query => OperationKind::Query,
            ast::OperationType::Mutation => OperationKind::Mutation,
            ast::OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

/// Finds the operation to execute without validating anything.
///
/// With a name, the first operation carrying exactly that name. Without one, the
/// only operation of the document.
pub(crate) fn find_operation<'doc>(
    document: &'doc ast::Document,
    operation_name: Option<&str>,
) -> Option<&'doc Node<ast::OperationDefinition>> {
    let mut operations = document
        .definitions
        .iter()
        .filter_map(|definition| match definition {
            ast::Definition::OperationDefinition(operation) => Some(operation),
            _ => None,
        });

    match operation_name {
        Some(name) => operations
            .find(|operation| operation.name.as_ref().map(|n| n.as_str()) == Some(name)),
        None => {
            let operation = operations.next()?;
            operations.next().is_none().then_some(operation)
        }
    }
}

pub(crate) fn select_operation(
    document: &ast::Document,
    operation_name: Option<&str>,
) -> Result<Node<ast::OperationDefinition>, ProcessRequestError> {
    find_operation(document, operation_name)
        .cloned()
        .ok_or_else(|| {
            tracing::debug!(?operation_name, "could not determine what operation to execute");
            ProcessRequestError::UnknownOperation
        })
}

/// Mutations must not run on GET, which is expected to be safe.
pub(crate) fn allow_method(kind: OperationKind, method: &Method) -> Result<(), ProcessRequestError> {
    if kind == OperationKind::Mutation && is_http_method(&Method::GET, method) {
        tracing::debug!("mutation requested over GET");
        return Err(ProcessRequestError::MutationOverGet);
    }
    Ok(())
}

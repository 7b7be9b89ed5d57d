use std::collections::HashMap;

use apollo_compiler::ast;
use serde::Deserialize;
use serde::Serialize;

use crate::json_ext::Object;
use crate::json_ext::Value;

/// The GraphQL document to execute: either source text, or a document the caller
/// already parsed.
///
/// A pre-parsed document is used as-is and never goes through the parser again.
#[derive(Clone, Debug)]
pub enum Query {
    /// GraphQL source text.
    Source(String),
    /// An already parsed document.
    Document(ast::Document),
}

impl From<String> for Query {
    fn from(source: String) -> Self {
        Query::Source(source)
    }
}

impl From<&str> for Query {
    fn from(source: &str) -> Self {
        Query::Source(source.to_owned())
    }
}

impl From<ast::Document> for Query {
    fn from(document: ast::Document) -> Self {
        Query::Document(document)
    }
}

/// The variables of a request, as received.
///
/// POST bodies usually carry a JSON object, while GET query strings carry the JSON
/// text of that object.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variables {
    /// Already decoded variables.
    Object(Object),
    /// JSON text expected to decode to an object.
    Json(String),
}

impl From<Object> for Variables {
    fn from(object: Object) -> Self {
        Variables::Object(object)
    }
}

impl From<String> for Variables {
    fn from(json: String) -> Self {
        Variables::Json(json)
    }
}

impl From<&str> for Variables {
    fn from(json: &str) -> Self {
        Variables::Json(json.to_owned())
    }
}

/// The GraphQL parameters of one HTTP request.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct GraphQLParams {
    /// The GraphQL operation (e.g., query, mutation) to execute.
    pub query: Option<Query>,

    /// The (optional) GraphQL operation name.
    ///
    /// When specified, this name must match the name of an operation in the
    /// GraphQL document.  When excluded, there must exist only a single
    /// operation in the GraphQL document.
    pub operation_name: Option<String>,

    /// The (optional) GraphQL variables.
    pub variables: Option<Variables>,
}

#[buildstructor::buildstructor]
impl GraphQLParams {
    #[builder(visibility = "pub")]
    fn new(
        query: Option<Query>,
        operation_name: Option<String>,
        variables: Option<Variables>,
    ) -> Self {
        Self {
            query,
            operation_name,
            variables,
        }
    }

    /// Reads `query`, `operationName` and `variables` from an urlencoded query string.
    pub fn from_urlencoded_query(
        url_encoded_query: &str,
    ) -> Result<Self, serde_urlencoded::de::Error> {
        let mut decoded: HashMap<String, String> =
            serde_urlencoded::from_str(url_encoded_query)?;

        Ok(Self {
            query: decoded.remove("query").map(Query::Source),
            operation_name: decoded.remove("operationName"),
            variables: decoded.remove("variables").map(Variables::Json),
        })
    }

    /// Reads `query`, `operationName` and `variables` from a decoded JSON body.
    ///
    /// Anything that is not an object yields empty parameters. Variables that are
    /// neither an object nor a string are kept as their JSON text, so that they get
    /// rejected when decoded.
    pub fn from_body(body: &Value) -> Self {
        let Some(object) = body.as_object() else {
            return Self::default();
        };

        let query = match object.get("query") {
            Some(Value::String(query)) => Some(Query::Source(query.as_str().to_owned())),
            _ => None,
        };
        let operation_name = match object.get("operationName") {
            Some(Value::String(name)) => Some(name.as_str().to_owned()),
            _ => None,
        };
        let variables = match object.get("variables") {
            None | Some(Value::Null) => None,
            Some(Value::Object(variables)) => Some(Variables::Object(variables.clone())),
            Some(Value::String(json)) => Some(Variables::Json(json.as_str().to_owned())),
            Some(other) => Some(Variables::Json(
                serde_json::to_string(other).unwrap_or_default(),
            )),
        };

        Self {
            query,
            operation_name,
            variables,
        }
    }
}

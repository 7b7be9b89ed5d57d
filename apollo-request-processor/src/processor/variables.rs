use crate::error::ProcessRequestError;
use crate::graphql::Variables;
use crate::json_ext::Object;
use crate::json_ext::object_from_str;

/// Brings variables to their decoded form.
///
/// Absent variables stay absent, which is not the same as an empty object.
pub(crate) fn coerce_variables(
    variables: Option<Variables>,
) -> Result<Option<Object>, ProcessRequestError> {
    match variables {
        None => Ok(None),
        Some(Variables::Object(variables)) => Ok(Some(variables)),
        Some(Variables::Json(json)) if json.is_empty() => Ok(None),
        Some(Variables::Json(json)) => object_from_str(&json).map(Some).map_err(|error| {
            // the decoder error is not reported to the client
            tracing::debug!(%error, "variables are invalid JSON");
            ProcessRequestError::InvalidVariables
        }),
    }
}

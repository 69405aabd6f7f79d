//! Walking a finished result tree and its accumulated errors into the
//! GraphQL response format.
//!
//! Deliberately unoptimized: a full `serde_json::Value` tree is built and
//! handed back, rather than streamed or written directly into an output
//! buffer. A minimal concrete walk exists only so the crate is testable
//! end-to-end; a streaming writer is left to whatever transport embeds
//! this crate.

use serde::Serialize;

use crate::{error::Error, result_tree::ResultNode};

/// One execution's outcome, in field order `errors` (omitted when empty)
/// then `data`, matching the GraphQL response spec.
#[derive(Debug, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<Error>,
    data: serde_json::Value,
}

impl Response {
    /// Whether any error was recorded for this execution.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The recorded errors, in the deterministic order they serialize in.
    #[must_use]
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// The result data, `null` if the root field itself was nulled.
    #[must_use]
    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }
}

/// Builds the response for one finished execution: the result tree's root
/// converted to JSON, paired with its errors sorted by path for
/// deterministic, byte-identical output across repeated executions.
#[must_use]
pub fn build_response(root: &ResultNode, mut errors: Vec<Error>) -> Response {
    errors.sort_by(|a, b| {
        a.path().iter().map(ToString::to_string).collect::<Vec<_>>().cmp(
            &b.path().iter().map(ToString::to_string).collect::<Vec<_>>(),
        )
    });
    Response { errors, data: root.to_json() }
}

/// Serializes one execution's outcome directly to a JSON value, the way a
/// caller that doesn't need the intermediate [`Response`] would use it.
#[must_use]
pub fn serialize_response(root: &ResultNode, errors: &crate::error::ErrorList) -> serde_json::Value {
    let response = build_response(root, errors.snapshot());
    serde_json::to_value(&response).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn omits_errors_when_none_occurred() {
        let root = ResultNode::default();
        root.resolve_leaf(crate::value::Value::Int(1));
        let v = serialize_response(&root, &crate::error::ErrorList::new());
        assert_eq!(v, serde_json::json!({"data": 1}));
    }

    #[test]
    fn sorts_errors_by_path_for_determinism() {
        let root = ResultNode::default();
        root.resolve_leaf(crate::value::Value::Null);
        let errors = vec![
            Error::new("b failed").with_kind(ErrorKind::Execution).with_path(vec!["b".into()]),
            Error::new("a failed").with_kind(ErrorKind::Execution).with_path(vec!["a".into()]),
        ];
        let response = build_response(&root, errors);
        let messages: Vec<_> = response.errors().iter().map(Error::message).collect();
        assert_eq!(messages, vec!["a failed", "b failed"]);
    }
}

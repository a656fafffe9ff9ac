//! Named actions and the `{ type, payload }` envelope.
//!
//! Every store accepts actions in one calling convention: an action name plus
//! an optional JSON payload. Action enums implement [`NamedAction`] (usually via
//! `#[derive(Action)]` from `tally-macros`) to turn an [`Envelope`] into a typed
//! action.
//!
//! # Example
//!
//! ```
//! use tally_core::action::Envelope;
//!
//! let envelope: Envelope = serde_json::from_str(r#"{"type":"multiplyByLast","payload":3}"#)?;
//! assert_eq!(envelope.kind, "multiplyByLast");
//! assert_eq!(envelope.payload, Some(serde_json::json!(3)));
//! # Ok::<(), serde_json::Error>(())
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wire form of a dispatched action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Action name
    #[serde(rename = "type")]
    pub kind: String,

    /// Optional payload, only read by actions that carry data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Envelope {
    /// Create an envelope without a payload
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
        }
    }

    /// Attach a payload
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// Errors raised while turning an envelope into an action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The action was recognized but its payload is missing or has the wrong shape
    #[error("Invalid argument for `{action}`: {reason}")]
    InvalidArgument {
        /// Canonical name of the action
        action: &'static str,
        /// What was wrong with the payload
        reason: String,
    },
}

/// An action type that can be dispatched by name
pub trait NamedAction: Sized {
    /// Resolve an envelope into an action
    ///
    /// Returns `Ok(None)` when no action answers to `envelope.kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidArgument`] when the name is known but the
    /// payload the action requires is missing or cannot be decoded.
    fn from_envelope(envelope: &Envelope) -> Result<Option<Self>, ActionError>;

    /// Canonical name of this action
    fn name(&self) -> &'static str;

    /// Canonical names of every action, in declaration order
    fn known_names() -> &'static [&'static str];
}

/// Decode the payload a data-carrying action requires
///
/// Called by `#[derive(Action)]` expansions.
///
/// # Errors
///
/// Returns [`ActionError::InvalidArgument`] if the payload is absent or does not
/// deserialize into `T`. Numbers are not coerced: an `i64` field rejects `2.5`,
/// `"2"` and `null`.
pub fn decode_payload<T>(action: &'static str, payload: Option<&Value>) -> Result<T, ActionError>
where
    T: DeserializeOwned,
{
    let Some(value) = payload else {
        return Err(ActionError::InvalidArgument {
            action,
            reason: "missing payload".to_string(),
        });
    };

    T::deserialize(value).map_err(|e| ActionError::InvalidArgument {
        action,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_without_payload() {
        let envelope: Envelope = serde_json::from_str(r#"{"type":"increment"}"#).unwrap();
        assert_eq!(envelope, Envelope::new("increment"));
    }

    #[test]
    fn test_envelope_serializes_type_tag() {
        let json = serde_json::to_value(Envelope::new("multiplyByLast").with_payload(4)).unwrap();
        assert_eq!(json, json!({ "type": "multiplyByLast", "payload": 4 }));

        let json = serde_json::to_value(Envelope::new("decrement")).unwrap();
        assert_eq!(json, json!({ "type": "decrement" }));
    }

    #[test]
    fn test_decode_integer_payload() {
        let value = json!(-3);
        let decoded: i64 = decode_payload("multiplyByLast", Some(&value)).unwrap();
        assert_eq!(decoded, -3);
    }

    #[test]
    fn test_decode_missing_payload() {
        let err = decode_payload::<i64>("multiplyByLast", None).unwrap_err();
        assert_eq!(
            err,
            ActionError::InvalidArgument {
                action: "multiplyByLast",
                reason: "missing payload".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_rejects_non_integers() {
        for value in [json!(2.5), json!("2"), json!(null), json!(true), json!([2])] {
            let result = decode_payload::<i64>("multiplyByLast", Some(&value));
            assert!(
                matches!(result, Err(ActionError::InvalidArgument { action: "multiplyByLast", .. })),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_error_message() {
        let err = decode_payload::<i64>("multiplyByLast", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid argument for `multiplyByLast`: missing payload"
        );
    }
}

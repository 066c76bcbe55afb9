//! Routing-key extraction from call arguments

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AttributeError, RouterError};

/// Capability of exposing named attributes as strings
///
/// `Ok(None)` means the attribute exists but carries no value (null).
pub trait HasNamedAttribute {
    fn attribute(&self, name: &str) -> Result<Option<String>, AttributeError>;
}

impl HasNamedAttribute for Value {
    fn attribute(&self, name: &str) -> Result<Option<String>, AttributeError> {
        let field = self
            .as_object()
            .and_then(|obj| obj.get(name))
            .ok_or_else(|| AttributeError::NotFound(name.to_string()))?;

        match field {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            other => Err(AttributeError::Unreadable {
                name: name.to_string(),
                detail: format!("{} is not a scalar", other),
            }),
        }
    }
}

impl HasNamedAttribute for HashMap<String, String> {
    fn attribute(&self, name: &str) -> Result<Option<String>, AttributeError> {
        self.get(name)
            .map(|v| Some(v.clone()))
            .ok_or_else(|| AttributeError::NotFound(name.to_string()))
    }
}

impl HasNamedAttribute for BTreeMap<String, String> {
    fn attribute(&self, name: &str) -> Result<Option<String>, AttributeError> {
        self.get(name)
            .map(|v| Some(v.clone()))
            .ok_or_else(|| AttributeError::NotFound(name.to_string()))
    }
}

/// One argument of a routed call
#[derive(Clone, Copy)]
pub enum CallArg<'a> {
    /// Plain string; used directly when it is the only argument
    Str(&'a str),
    /// Argument exposing named attributes
    Object(&'a dyn HasNamedAttribute),
}

impl<'a> CallArg<'a> {
    pub fn object<T: HasNamedAttribute>(value: &'a T) -> Self {
        CallArg::Object(value)
    }
}

impl<'a> From<&'a str> for CallArg<'a> {
    fn from(s: &'a str) -> Self {
        CallArg::Str(s)
    }
}

impl<'a> From<&'a String> for CallArg<'a> {
    fn from(s: &'a String) -> Self {
        CallArg::Str(s.as_str())
    }
}

impl fmt::Debug for CallArg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallArg::Str(s) => f.debug_tuple("Str").field(s).finish(),
            CallArg::Object(_) => f.write_str("Object(..)"),
        }
    }
}

/// Find the routing-key value for `attr` among the call arguments
///
/// A single plain-string argument is the key itself. Otherwise the first
/// argument with a non-blank `attr` attribute wins; failures on individual
/// arguments are logged and skipped.
pub fn extract_route_key(attr: &str, args: &[CallArg<'_>]) -> Result<String, RouterError> {
    if let [CallArg::Str(key)] = args {
        return Ok((*key).to_string());
    }

    for (position, arg) in args.iter().enumerate() {
        let obj = match arg {
            CallArg::Object(obj) => obj,
            CallArg::Str(_) => {
                debug!(attr = %attr, position, "Skipping string argument without attributes");
                continue;
            }
        };

        match obj.attribute(attr) {
            Ok(Some(value)) if !value.trim().is_empty() => return Ok(value),
            Ok(_) => {
                debug!(attr = %attr, position, "Routing attribute present but empty");
            }
            Err(e) => {
                warn!(attr = %attr, position, error = %e, "Failed to read routing attribute");
            }
        }
    }

    Err(RouterError::MissingRouteKey {
        attr: attr.to_string(),
    })
}

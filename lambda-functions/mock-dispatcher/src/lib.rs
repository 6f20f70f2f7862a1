pub mod functions;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::{error, info};

/// Toy handlers selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFunction {
    Average,
    Greeting,
    Sleep,
}

impl MockFunction {
    /// Accepts both the short (`a`) and long (`function_a`) names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "a" | "function_a" => Some(Self::Average),
            "b" | "function_b" => Some(Self::Greeting),
            "c" | "function_c" => Some(Self::Sleep),
            _ => None,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Average => "a",
            Self::Greeting => "b",
            Self::Sleep => "c",
        }
    }
}

impl fmt::Display for MockFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function_{}", self.short_name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid function '{0}'. Must be one of: a, b, c")]
    UnknownFunction(String),
    #[error("invalid input for {function}: {source}")]
    InvalidInput {
        function: MockFunction,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    InvalidArgument(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl DispatchResponse {
    fn new(status_code: u16, body: &Value) -> Self {
        Self {
            status_code,
            body: body.to_string(),
        }
    }
}

/// Name of the requested function: `function`, falling back to `function_name`.
pub fn requested_function(event: &Value) -> Option<&str> {
    event
        .get("function")
        .or_else(|| event.get("function_name"))
        .and_then(Value::as_str)
}

/// Runs the selected function and returns its result as JSON.
pub async fn invoke(function: MockFunction, event: &Value) -> Result<Value, DispatchError> {
    let params = |source: serde_json::Error| DispatchError::InvalidInput { function, source };

    let result = match function {
        MockFunction::Average => {
            let request = serde_json::from_value(event.clone()).map_err(params)?;
            json!(functions::average(request))
        }
        MockFunction::Greeting => {
            let request = serde_json::from_value(event.clone()).map_err(params)?;
            json!(functions::greeting(request)?)
        }
        MockFunction::Sleep => {
            let request = serde_json::from_value(event.clone()).map_err(params)?;
            json!(functions::sleep(request).await?)
        }
    };

    Ok(result)
}

/// Routes the event to its function and wraps the outcome in an HTTP-style
/// response: 400 for an unknown name, 500 for a failed function.
pub async fn dispatch(event: &Value) -> DispatchResponse {
    let name = requested_function(event).unwrap_or_default();

    let Some(function) = MockFunction::from_name(name) else {
        let err = DispatchError::UnknownFunction(name.to_string());
        info!("{}", err);
        return DispatchResponse::new(400, &json!({ "error": err.to_string() }));
    };

    match invoke(function, event).await {
        Ok(result) => DispatchResponse::new(200, &result),
        Err(e) => {
            error!("Error in {}: {}", function, e);
            DispatchResponse::new(500, &json!({ "error": e.to_string() }))
        }
    }
}

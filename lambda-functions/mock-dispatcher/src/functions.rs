use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::time::Duration;
use tracing::info;

use crate::DispatchError;

#[derive(Deserialize, Debug, Default)]
pub struct AverageRequest {
    #[serde(default)]
    pub items: Vec<Number>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AverageResult {
    pub average: f64,
    pub count: usize,
    /// Integer when every item is an integer, otherwise a float.
    pub total: Number,
}

/// Mean of `items`; an empty list averages to zero.
pub fn average(request: AverageRequest) -> AverageResult {
    let count = request.items.len();
    if count == 0 {
        return AverageResult {
            average: 0.0,
            count: 0,
            total: Number::from(0),
        };
    }

    let float_total: f64 = request.items.iter().filter_map(Number::as_f64).sum();
    let integer_total = request
        .items
        .iter()
        .try_fold(0i64, |acc, item| acc.checked_add(item.as_i64()?));

    let total = match integer_total {
        Some(total) => Number::from(total),
        None => Number::from_f64(float_total).unwrap_or_else(|| Number::from(0)),
    };

    AverageResult {
        average: float_total / count as f64,
        count,
        total,
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct GreetingRequest {
    pub name: Option<String>,
    pub age: Option<Value>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GreetingResult {
    pub message: String,
}

pub fn greeting(request: GreetingRequest) -> Result<GreetingResult, DispatchError> {
    let name = request.name.unwrap_or_else(|| "World".to_string());
    let age = match request.age {
        None | Some(Value::Null) => "0".to_string(),
        Some(Value::Number(age)) => age.to_string(),
        Some(Value::String(age)) => age,
        Some(other) => {
            return Err(DispatchError::InvalidArgument(format!(
                "age must be a number or string, got {}",
                other
            )))
        }
    };

    Ok(GreetingResult {
        message: format!("Hello {} age: {}", name, age),
    })
}

#[derive(Deserialize, Debug, Default)]
pub struct SleepRequest {
    pub duration: Option<f64>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SleepResult {
    pub status: String,
}

pub const DEFAULT_SLEEP_SECS: f64 = 2.0;

/// Simulates slow processing by sleeping for `duration` seconds.
pub async fn sleep(request: SleepRequest) -> Result<SleepResult, DispatchError> {
    let secs = request.duration.unwrap_or(DEFAULT_SLEEP_SECS);
    let duration = Duration::try_from_secs_f64(secs).map_err(|_| {
        DispatchError::InvalidArgument(format!(
            "duration must be a non-negative number of seconds, got {}",
            secs
        ))
    })?;

    info!("Starting heavy processing for {} seconds...", secs);
    tokio::time::sleep(duration).await;

    Ok(SleepResult {
        status: "completed".to_string(),
    })
}

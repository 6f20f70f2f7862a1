use alert_relay::{AlertRelay, RelayConfig, RelayResponse};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;

async fn function_handler(
    relay: &AlertRelay,
    event: LambdaEvent<Value>,
) -> Result<RelayResponse, Error> {
    Ok(relay.relay(&event.payload).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let relay = AlertRelay::new(RelayConfig::from_env())?;

    let relay = &relay;
    run(service_fn(move |event: LambdaEvent<Value>| async move {
        function_handler(relay, event).await
    }))
    .await
}

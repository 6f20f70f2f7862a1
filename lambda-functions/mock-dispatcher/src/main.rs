use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use mock_dispatcher::{dispatch, DispatchResponse};
use serde_json::Value;

async fn function_handler(event: LambdaEvent<Value>) -> Result<DispatchResponse, Error> {
    Ok(dispatch(&event.payload).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    run(service_fn(function_handler)).await
}

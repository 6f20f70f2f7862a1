use alarm_forwarder::{
    AlarmForwarder, CloudWatchLogStore, ForwarderConfig, HttpWebhook, InvocationOutcome,
    NotificationEnvelope,
};
use aws_config::BehaviorVersion;
use aws_sdk_cloudwatchlogs::Client as LogsClient;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

type Forwarder = AlarmForwarder<CloudWatchLogStore, HttpWebhook>;

async fn function_handler(
    forwarder: &Forwarder,
    event: LambdaEvent<NotificationEnvelope>,
) -> Result<InvocationOutcome, Error> {
    Ok(forwarder.handle(event.payload).await?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = ForwarderConfig::from_env()?;
    let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;

    let webhook = HttpWebhook::new(&config)?;
    let log_store = CloudWatchLogStore::new(LogsClient::new(&aws_config));
    let forwarder = AlarmForwarder::new(config, log_store, webhook);

    let forwarder = &forwarder;
    run(service_fn(move |event: LambdaEvent<NotificationEnvelope>| async move {
        function_handler(forwarder, event).await
    }))
    .await
}

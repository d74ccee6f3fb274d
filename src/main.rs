use offload::compute::SqrtSum;
use offload::config::OffloadConfig;
use offload::liveness::LivenessLoop;
use offload::worker::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = OffloadConfig::from_env()?;

    eprintln!("offload v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Iterations: {}", config.iterations);
    eprintln!("   Payload: {:?}", config.payload);
    eprintln!("   Tick: {:?}\n", config.tick_interval);

    // Host stays responsive while the worker computes
    let liveness = LivenessLoop::spawn(config.tick_interval);

    tracing::info!("Main: Starting worker");
    let mut dispatcher = Dispatcher::new(SqrtSum::new(config.iterations))
        .on_result(|outcome| match outcome.to_json() {
            Ok(data) => tracing::info!(%data, "Main: Received from worker"),
            Err(e) => tracing::warn!(
                error = %e,
                result = outcome.result,
                "Main: Received from worker (unrenderable)"
            ),
        })
        .on_error(|err| {
            tracing::error!(error = %err, "Worker failed");
        });

    // Failures were already reported by the error handler and do not change
    // the process exit code.
    let outcome = dispatcher.dispatch(config.payload.clone())?.await;

    if !config.linger.is_zero() {
        tokio::time::sleep(config.linger).await;
    }

    let last_tick = liveness.stop();
    tracing::info!(
        state = %dispatcher.state(),
        succeeded = outcome.is_ok(),
        last_tick = ?last_tick,
        "Host finished"
    );
    dispatcher.close();

    Ok(())
}

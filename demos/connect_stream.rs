use std::error::Error;
use std::time::Duration;

use gridlink_sdk::client::GridClient;
use gridlink_sdk::config::Config;
use gridlink_sdk::events::{ClientEvent, Topic};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridlink_sdk=debug".into()),
        )
        .init();

    let config = Config::new("http://localhost:8080", "ws://localhost:8081/ws")
        .with_reconnect_delay(Duration::from_secs(5));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = GridClient::new(config)?;

        client.bus().register(Topic::Telemetry, |event| {
            if let ClientEvent::Telemetry(sample) = event {
                println!(
                    "{}: generating {:.1} kW, battery {:.0}%",
                    sample.plant_id, sample.generated_kw, sample.battery_soc_pct
                );
            }
        });
        client.bus().register(Topic::Alert, |event| {
            if let ClientEvent::Alert(alert) = event {
                println!("[{:?}] {}: {}", alert.severity, alert.plant_id, alert.message);
            }
        });
        client.bus().register(Topic::StreamDisconnected, |_| {
            println!("stream dropped; reconnecting shortly");
        });

        client.init();

        tokio::signal::ctrl_c().await?;
        client.teardown();
        Ok::<_, Box<dyn Error>>(())
    })?;

    Ok(())
}

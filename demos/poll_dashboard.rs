use std::error::Error;
use std::time::Duration;

use gridlink_sdk::client::GridClient;
use gridlink_sdk::config::Config;
use gridlink_sdk::watch::WatchOptions;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridlink_sdk=info".into()),
        )
        .init();

    let config = Config::new("http://localhost:8080", "ws://localhost:8081/ws")
        .with_stream_enabled(false);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = GridClient::new(config)?;

        let plants = client.watch_plants(WatchOptions {
            poll_interval: Some(Duration::from_secs(30)),
        });
        let health = client.watch_system_health(WatchOptions {
            poll_interval: Some(Duration::from_secs(10)),
        });
        let alerts = client.watch_alerts(Some(false), WatchOptions::default());

        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;

            let fleet = plants.snapshot();
            match (&fleet.data, &fleet.error) {
                (Some(list), _) => println!("fleet: {} plants registered", list.len()),
                (None, Some(error)) => println!("fleet unavailable: {error}"),
                (None, None) => println!("fleet: loading..."),
            }

            if let Some(status) = health.data() {
                println!(
                    "system {:?}: {}/{} online, {:.1} kW total",
                    status.overall,
                    status.plants_online,
                    status.plants_total,
                    status.total_generation_kw
                );
            }

            if let Some(open_alerts) = alerts.data() {
                for alert in open_alerts.iter().take(3) {
                    println!("open alert {}: {}", alert.id, alert.message);
                }
            }

            let connection = client.connection();
            if !connection.connected {
                println!(
                    "degraded connectivity ({} consecutive errors)",
                    connection.error_count
                );
            }
        }
    })
}

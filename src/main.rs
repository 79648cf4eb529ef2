use clap::Parser;
use std::panic::{self, PanicHookInfo};
use switchbot_listener::app::{self, Options, RealSource, RunError};
use switchbot_listener::device;
use switchbot_listener::sink::mqtt::MqttConfig;
use switchbot_listener::sink::{self, Sink, SinkError};
use tokio_util::sync::CancellationToken;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

/// Build the configured sink set, console first so fan-out order is stable.
fn build_sinks(options: &Options) -> Result<Vec<Box<dyn Sink>>, SinkError> {
    let mut sinks: Vec<Box<dyn Sink>> =
        vec![sink::console_sink(options.output, Box::new(std::io::stdout()))];

    if let Some(host) = &options.mqtt_host {
        let config = MqttConfig {
            host: host.clone(),
            port: options.mqtt_port,
            username: options.mqtt_username.clone(),
            password: options.mqtt_password.clone(),
            base_topic: options.mqtt_topic.clone(),
            retain: options.mqtt_retain,
        };
        sinks.push(sink::mqtt_sink(config)?);
    }

    if let Some(path) = &options.influx_file {
        sinks.push(sink::influx_sink(path));
    }

    Ok(sinks)
}

/// Load the registry, wire ctrl-c to a cancellation token and run the
/// capture loop against the real scanner.
async fn run(options: Options) -> Result<(), RunError> {
    let devices = device::load_registry(&options.devices)?;
    log::info!(
        "loaded {} devices from {}",
        devices.len(),
        options.devices.display()
    );

    let sinks = build_sinks(&options)?;

    let cancel = CancellationToken::new();
    let interrupted = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted.cancel();
        }
    });

    let mut err = std::io::stderr();
    app::run_with_io(&options, &devices, &RealSource, sinks, cancel, &mut err).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    env_logger::init();
    let options = Options::parse();

    match run(options).await {
        Ok(_) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}

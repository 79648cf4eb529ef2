//! `switchbot-relay`: re-publish a captured reading stream.
//!
//! Reads JSON lines from stdin and forwards each reading to MQTT (and
//! optionally an Influx line-protocol file). Typical use:
//!
//! ```text
//! switchbot-listener -a -o json | switchbot-relay --mqtt-host 127.0.0.1 --mqtt-retain --influx-file -
//! ```

use clap::Parser;
use std::panic::{self, PanicHookInfo};
use switchbot_listener::relay::{self, RelayError};
use switchbot_listener::sink::mqtt::MqttConfig;
use switchbot_listener::sink::{self, Sink, SinkError};

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

#[derive(Parser, Debug)]
#[command(author, about, version)]
struct Options {
    /// MQTT broker host.
    #[arg(long, env = "MQTT_HOST", default_value = "127.0.0.1")]
    mqtt_host: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    mqtt_port: u16,

    #[arg(long, env = "MQTT_USERNAME")]
    mqtt_username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD")]
    mqtt_password: Option<String>,

    /// Base topic for publishes.
    #[arg(long, env = "MQTT_TOPIC", default_value = "home/sensors")]
    mqtt_topic: String,

    /// Publish with the retain flag.
    #[arg(long)]
    mqtt_retain: bool,

    /// Also append Influx line protocol to this file ('-' for stdout).
    #[arg(long)]
    influx_file: Option<String>,
}

/// MQTT is the relay's reason to exist; Influx output is opt-in.
fn build_sinks(options: &Options) -> Result<Vec<Box<dyn Sink>>, SinkError> {
    let config = MqttConfig {
        host: options.mqtt_host.clone(),
        port: options.mqtt_port,
        username: options.mqtt_username.clone(),
        password: options.mqtt_password.clone(),
        base_topic: options.mqtt_topic.clone(),
        retain: options.mqtt_retain,
    };
    let mut sinks: Vec<Box<dyn Sink>> = vec![sink::mqtt_sink(config)?];

    if let Some(path) = &options.influx_file {
        sinks.push(sink::influx_sink(path));
    }

    Ok(sinks)
}

fn run(options: Options) -> Result<(), RelayError> {
    let sinks = build_sinks(&options)?;
    let stdin = std::io::stdin();
    let mut err = std::io::stderr();
    relay::run(stdin.lock(), sinks, &mut err)
}

fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    env_logger::init();
    let options = Options::parse();

    match run(options) {
        Ok(_) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}

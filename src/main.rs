use clap::{Parser, Subcommand};
use serde_json::json;
use sim7600_at::config::{Config, ConfigLoader};
use sim7600_at::{discovery, logging, AtCommand, AtEngine, LockRegistry};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "sim7600-at",
    version,
    about = "Send AT commands to a SIMCom SIM7600 modem.",
    long_about = "One-shot tool for talking to a SIM7600 over its AT serial port. Settings come from sim7600.toml and SIM7600_* environment variables; flags override both."
)]
struct Args {
    /// Configuration file (default: SIM7600_CONFIG, ./sim7600.toml, user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Serial port or alias
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Use RTS/CTS flow control (UART-wired modems)
    #[arg(long, global = true)]
    rtscts: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Run the power-key sequence before the command
    #[arg(long, global = true)]
    power_on: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one command and print the reply
    Send {
        /// Command line without line ending, e.g. AT+CSQ
        command: String,
        /// Final result code that means success
        #[arg(long, default_value = "OK")]
        expect: String,
        /// Override the configured timeout
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Check that the modem answers AT
    Verify,
    /// Print manufacturer, model, revision and IMEI
    Identify,
    /// Scan all serial ports for SIMCom modems
    Discover,
}

fn load_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud = baud;
    }
    if args.rtscts {
        config.serial.hardware_flow_control = true;
    }
    config.validate()?;
    Ok(config)
}

fn open_engine(config: &Config, power_on: bool) -> Result<AtEngine, Box<dyn std::error::Error>> {
    let registry = LockRegistry::from_config(&config.lock);
    let engine = AtEngine::from_config(config, &registry)?;
    if power_on {
        engine.power_on()?;
    } else {
        // Without --power-on a managed modem is assumed to be running already.
        engine.assume_powered(true);
    }
    Ok(engine)
}

fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    logging::init(&config.logging);

    match args.command {
        Command::Send {
            command,
            expect,
            timeout_ms,
        } => {
            let engine = open_engine(&config, args.power_on)?;
            let mut command = AtCommand::new(command).expect(expect);
            if let Some(ms) = timeout_ms {
                command = command.timeout(Duration::from_millis(ms));
            }
            let result = engine.send(command);
            engine.close();
            let response = result?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.text());
            }
            Ok(true)
        }
        Command::Verify => {
            let engine = open_engine(&config, args.power_on)?;
            let ok = engine.verify()?;
            engine.close();
            if args.json {
                println!("{}", json!({ "port": engine.port(), "ok": ok }));
            } else {
                println!("{}: {}", engine.port(), if ok { "OK" } else { "no answer" });
            }
            Ok(ok)
        }
        Command::Identify => {
            let engine = open_engine(&config, args.power_on)?;
            let result = engine.identify();
            engine.close();
            let identity = result?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&identity)?);
            } else {
                let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
                println!("Manufacturer: {}", show(&identity.manufacturer));
                println!("Model:        {}", show(&identity.model));
                println!("Revision:     {}", show(&identity.revision));
                println!("IMEI:         {}", show(&identity.imei));
            }
            Ok(true)
        }
        Command::Discover => {
            let registry = LockRegistry::from_config(&config.lock);
            let devices = discovery::discover(
                config.serial.baud,
                &registry,
                config.serial.timeout().min(Duration::from_secs(2)),
            )?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                println!("no SIMCom modems found");
            } else {
                for device in &devices {
                    println!(
                        "{}\t{}\t{}",
                        device.port_name,
                        device.identity.model.as_deref().unwrap_or("-"),
                        device.usb_id.as_deref().unwrap_or("-"),
                    );
                }
            }
            Ok(!devices.is_empty())
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

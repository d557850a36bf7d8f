mod cli;
mod demo;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use onion_spi::config::Config;
use onion_spi::verbosity::init_logger;
use onion_spi::{Registration, SpiDevice, Spidev};
use std::fs;
use std::path::Path;

use crate::cli::{Args, Command};
use crate::demo::{abort_on_ctrl_c, stdin_lines, Demo};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(args.verbosity());

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    let mut params = config.params();
    args.apply(&mut params);

    let mut spi = SpiDevice::with_bus(params, Spidev::new(config.registration.dev_root.clone()))
        .with_registrar(config.registrar());

    match args.command {
        Command::Read { address } => {
            let rx = spi
                .read_bytes(address, 1)
                .context(format!("SPI read from addr 0x{:02x} failed", address))?;
            info!("> SPI Read from addr 0x{:02x}: 0x{:02x}", address, rx[0]);
        }
        Command::Write { address, value } => {
            info!("> SPI Write to addr 0x{:02x}: 0x{:02x}", address, value);
            spi.write_bytes(address, &[value])
                .context(format!("SPI write to addr 0x{:02x} failed", address))?;
        }
        Command::Setup => {
            if let Err(e) = spi.register_device() {
                error!("> ERROR: could not register SPI sysfs device!");
                return Err(e).context("Device registration failed");
            }
            spi.setup_device().context("Device setup failed")?;
        }
        Command::Check => {
            let path = spi.params.device_path(spi.bus().dev_root());
            if spi.check_device() {
                println!("> Device {} exists", path);
            } else {
                println!("> Device {} does not exist", path);
            }
        }
        Command::Register => match spi
            .register_device()
            .context("Device registration failed")?
        {
            Registration::AlreadyPresent => info!("Device already registered"),
            Registration::Registered => info!("Device registered"),
        },
        Command::Demo { yes } => {
            let (bus, device) = args.demo_target(&config.spi);
            spi.set_device(bus, device);
            let mut demo = Demo::new(
                spi,
                stdin_lines(),
                abort_on_ctrl_c(),
                std::io::stdout(),
                yes,
            );
            if !demo.run().await? {
                info!("Demo stopped by operator");
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    info!("Loading configuration from: {}", path.display());
    let config_content = fs::read_to_string(path)
        .context(format!("Failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&config_content).context("Failed to parse configuration file")
}

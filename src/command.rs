use crate::error::{Result, SpiError};
use crate::params::SpiParams;
use log::{debug, info, warn};
use std::process::Command;

pub const DEFAULT_LOADER: &str = "insmod";
pub const DEFAULT_MODULE: &str = "spi-gpio-custom";

/// How a bit-banged bus gets registered with the kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registrar {
    pub loader: String,
    pub module: String,
}

impl Default for Registrar {
    fn default() -> Self {
        Self {
            loader: DEFAULT_LOADER.to_string(),
            module: DEFAULT_MODULE.to_string(),
        }
    }
}

impl Registrar {
    /// Arguments for the loader, e.g.
    /// `spi-gpio-custom bus0=1,6,18,1,0,100000,7`
    ///
    /// Field order is `<bus id>,<sck>,<mosi>,<miso>,<mode>,<max hz>,<cs>`.
    pub fn args(&self, params: &SpiParams) -> Vec<String> {
        vec![
            self.module.clone(),
            format!(
                "bus0={},{},{},{},{},{},{}",
                params.bus,
                params.gpio.sck,
                params.gpio.mosi,
                params.gpio.miso,
                params.mode.bits() & 0xff,
                params.speed_hz,
                params.gpio.cs
            ),
        ]
    }

    pub fn register(&self, params: &SpiParams) -> Result<()> {
        CommandExecutor::execute(&self.loader, &self.args(params))
    }
}

pub struct CommandExecutor;

impl CommandExecutor {
    pub fn execute(program: &str, args: &[String]) -> Result<()> {
        let command = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        info!("Executing command: {}", command);

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| SpiError::LoaderSpawnFailed {
                command: command.clone(),
                source: e,
            })?;

        if output.status.success() {
            if !output.stdout.is_empty() {
                let stdout = String::from_utf8_lossy(&output.stdout);
                debug!("Command output: {}", stdout);
            }
            info!("Command executed successfully");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                "Command execution failed with status: {:?}. Error: {}",
                output.status, stderr
            );
            Err(SpiError::LoaderFailed {
                command,
                status: output.status,
                stderr,
            })
        }
    }
}

use anyhow::Result;
use log::{info, LevelFilter};
use onion_spi::{ModeFlags, SpiBus, SpiDevice};
use std::fmt::Debug;
use std::io::{BufRead, Write};
use tokio::sync::{mpsc, watch};

pub const DEMO_BUS: u32 = 0;
pub const DEMO_DEVICE: u32 = 1;

/// Register addresses used by the read/write phases
const ID_REG: u8 = 0x37;
const CTRL_REG: u8 = 0x01;
const READ_BIT: u8 = 0x80;

const fn read_addr(reg: u8) -> u8 {
    (reg << 1) | READ_BIT
}

const fn write_addr(reg: u8) -> u8 {
    reg << 1
}

/// Lines typed by the operator.
///
/// Reads happen on a plain thread; a blocking read on the runtime's pool
/// cannot be cancelled and would keep the process alive after an abort.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Flips to `true` on the first Ctrl-C
pub fn abort_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(true);
        }
    });
    rx
}

/// Operator-gated smoke test of a device handle
pub struct Demo<B: SpiBus, W> {
    spi: SpiDevice<B>,
    input: mpsc::Receiver<String>,
    abort: watch::Receiver<bool>,
    out: W,
    assume_yes: bool,
}

impl<B, W> Demo<B, W>
where
    B: SpiBus,
    W: Write,
{
    pub fn new(
        spi: SpiDevice<B>,
        input: mpsc::Receiver<String>,
        abort: watch::Receiver<bool>,
        out: W,
        assume_yes: bool,
    ) -> Self {
        Demo {
            spi,
            input,
            abort,
            out,
            assume_yes,
        }
    }

    /// Runs every phase; returns false when the operator aborted at a prompt
    pub async fn run(&mut self) -> Result<bool> {
        writeln!(self.out, "Starting: onion-spi module testing...")?;

        if log::max_level() < LevelFilter::Debug {
            self.spi.set_verbosity(1);
        }
        self.print_settings()?;

        if !self.prompt("Ready to register the device?").await? {
            return Ok(false);
        }
        self.check()?;

        writeln!(self.out, "Registering the device...")?;
        let registered = self.spi.register_device();
        self.report("registerDevice", registered)?;

        writeln!(self.out, "Initializing the device parameters...")?;
        let applied = self.spi.setup_device();
        self.report("setupDevice", applied)?;

        writeln!(self.out)?;
        self.check()?;

        if !self.prompt("Ready to test reading and writing?").await? {
            return Ok(false);
        }
        self.read(read_addr(ID_REG))?;
        self.read(read_addr(CTRL_REG))?;

        let addr = write_addr(CTRL_REG);
        writeln!(self.out, "Writing to addr {:02x}", addr)?;
        let written = self.spi.write_bytes(addr, &[0x0d]);
        self.report("writeBytes", written)?;
        self.read(read_addr(CTRL_REG))?;

        if !self.prompt("Ready to test write() function?").await? {
            return Ok(false);
        }
        writeln!(self.out, "Writing 2 bytes")?;
        let written = self.spi.write(&[write_addr(CTRL_REG), 0x0c]);
        self.report("write", written)?;
        self.read(read_addr(CTRL_REG))?;

        if !self.prompt("Ready to change settings?").await? {
            return Ok(false);
        }
        self.spi.params.gpio.cs = 20;
        self.spi.params.mode |= ModeFlags::THREE_WIRE | ModeFlags::CS_HIGH;
        self.print_settings()?;

        writeln!(self.out, "Done")?;
        Ok(true)
    }

    #[cfg(test)]
    pub fn into_device(self) -> SpiDevice<B> {
        self.spi
    }

    fn print_settings(&mut self) -> Result<()> {
        writeln!(self.out, "{}", self.spi.params)?;
        Ok(())
    }

    fn check(&mut self) -> Result<()> {
        writeln!(self.out, "Checking if device exists...")?;
        let exists = self.spi.check_device();
        writeln!(self.out, "   Device exists: {}", exists)?;
        Ok(())
    }

    fn read(&mut self, addr: u8) -> Result<()> {
        writeln!(self.out, "Reading from addr {:02x}", addr)?;
        let read = self.spi.read_bytes(addr, 1);
        self.report("readBytes", read)
    }

    fn report<T: Debug>(&mut self, what: &str, result: onion_spi::Result<T>) -> Result<()> {
        match result {
            Ok(value) => writeln!(self.out, "   {} returned: {:?}", what, value)?,
            Err(e) => writeln!(self.out, "   {} failed: {}", what, e)?,
        }
        Ok(())
    }

    async fn prompt(&mut self, question: &str) -> Result<bool> {
        writeln!(self.out)?;
        write!(self.out, "{} ", question)?;
        self.out.flush()?;

        let aborted = *self.abort.borrow();
        if aborted {
            writeln!(self.out)?;
            info!("Received SIGINT, stopping");
            return Ok(false);
        }
        if self.assume_yes {
            writeln!(self.out)?;
            return Ok(true);
        }

        // a dropped abort sender disables that branch instead of firing it
        tokio::select! {
            line = self.input.recv() => {
                match line {
                    Some(_) => Ok(true),
                    None => {
                        info!("Input closed, stopping");
                        Ok(false)
                    }
                }
            }
            Ok(_) = self.abort.wait_for(|aborted| *aborted) => {
                writeln!(self.out)?;
                info!("Received SIGINT, stopping");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onion_spi::{AppliedSettings, SpiError, SpiParams};

    #[derive(Default)]
    struct RecordingBus {
        sent: Vec<Vec<u8>>,
    }

    impl SpiBus for RecordingBus {
        fn exists(&self, _params: &SpiParams) -> bool {
            true
        }

        fn configure(&mut self, params: &SpiParams) -> onion_spi::Result<AppliedSettings> {
            Ok(AppliedSettings {
                mode: params.mode,
                bits_per_word: 8,
                speed_hz: params.speed_hz,
            })
        }

        fn transfer(
            &mut self,
            _params: &SpiParams,
            tx: &[u8],
            rx: &mut [u8],
        ) -> onion_spi::Result<usize> {
            self.sent.push(tx.to_vec());
            rx.fill(0x42);
            Ok(tx.len())
        }
    }

    struct FailingBus;

    impl SpiBus for FailingBus {
        fn exists(&self, _params: &SpiParams) -> bool {
            true
        }

        fn configure(&mut self, _params: &SpiParams) -> onion_spi::Result<AppliedSettings> {
            Err(SpiError::InvalidTransfer("offline".into()))
        }

        fn transfer(
            &mut self,
            _params: &SpiParams,
            _tx: &[u8],
            _rx: &mut [u8],
        ) -> onion_spi::Result<usize> {
            Err(SpiError::InvalidTransfer("offline".into()))
        }
    }

    fn demo_device<B: SpiBus>(bus: B) -> SpiDevice<B> {
        SpiDevice::with_bus(SpiParams::new(DEMO_BUS, DEMO_DEVICE), bus)
    }

    /// Channel that yields `lines` and then reports end of input
    fn typed(lines: &[&str]) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            tx.try_send(line.to_string()).unwrap();
        }
        rx
    }

    /// Abort receiver whose sender is already gone
    fn never_aborted() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[tokio::test]
    async fn test_full_sequence() {
        let mut out = Vec::new();
        let mut demo = Demo::new(
            demo_device(RecordingBus::default()),
            typed(&["", "", "", ""]),
            never_aborted(),
            &mut out,
            false,
        );
        assert!(demo.run().await.unwrap());

        let spi = demo.into_device();
        assert_eq!(
            spi.bus().sent,
            vec![
                vec![0xee],
                vec![0x82],
                vec![0x02, 0x0d],
                vec![0x82],
                vec![0x02, 0x0c],
                vec![0x82],
            ]
        );
        assert_eq!(spi.params.gpio.cs, 20);
        assert!(spi.params.mode.contains(ModeFlags::THREE_WIRE | ModeFlags::CS_HIGH));

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Starting: onion-spi module testing...\nSPI Device Settings:"));
        assert!(text.contains("Reading from addr ee\n   readBytes returned: [66]\n"));
        assert!(text.contains("   registerDevice returned: AlreadyPresent\n"));
        assert!(text.contains("     cs-high:  1\n"));
        assert!(text.trim_end().ends_with("Done"));
    }

    #[tokio::test]
    async fn test_closed_input_stops_after_first_prompt() {
        let mut out = Vec::new();
        let mut demo = Demo::new(
            demo_device(RecordingBus::default()),
            typed(&[]),
            never_aborted(),
            &mut out,
            false,
        );
        assert!(!demo.run().await.unwrap());
        assert!(demo.into_device().bus().sent.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_reported_and_skipped() {
        let mut out = Vec::new();
        let mut demo = Demo::new(demo_device(FailingBus), typed(&[]), never_aborted(), &mut out, true);
        assert!(demo.run().await.unwrap());
        drop(demo);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("   setupDevice failed: invalid transfer: offline\n"));
        assert!(text.contains("   readBytes failed: invalid transfer: offline\n"));
        assert!(text.contains("Done"));
    }

    #[tokio::test]
    async fn test_ctrl_c_at_prompt_stops_while_input_is_open() {
        // keep the input sender alive so only the abort can end the wait
        let (_keyboard, input) = mpsc::channel::<String>(1);
        let (abort_tx, abort) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            abort_tx.send(true).unwrap();
        });

        let mut out = Vec::new();
        let mut demo = Demo::new(
            demo_device(RecordingBus::default()),
            input,
            abort,
            &mut out,
            false,
        );
        let finished = tokio::time::timeout(std::time::Duration::from_secs(5), demo.run())
            .await
            .expect("demo kept waiting after the abort");
        assert!(!finished.unwrap());
        assert!(demo.into_device().bus().sent.is_empty());

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Ready to register the device?"));
        assert!(!text.contains("Checking if device exists"));
    }

    #[tokio::test]
    async fn test_ctrl_c_before_prompt_beats_assume_yes() {
        let (abort_tx, abort) = watch::channel(false);
        abort_tx.send(true).unwrap();

        let mut out = Vec::new();
        let mut demo = Demo::new(demo_device(RecordingBus::default()), typed(&[]), abort, &mut out, true);
        assert!(!demo.run().await.unwrap());
        assert!(demo.into_device().bus().sent.is_empty());
    }
}

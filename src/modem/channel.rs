//! The serial boundary to the modem.
//!
//! The engine only needs two operations: write bytes, and read whatever has
//! already arrived without blocking. Waiting is done by the caller with async
//! sleeps, so a channel never parks the runtime thread.

use std::io;

/// Exclusive byte channel to the modem. Half-duplex use only: one transaction
/// owns it from command to terminal token.
pub trait ModemChannel: Send {
    /// Write all of `data` to the modem.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Copy already-received bytes into `buf`, returning how many. Returns
    /// `Ok(0)` when nothing is pending; must not block waiting for input.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

#[cfg(feature = "serial")]
pub use serial::SerialChannel;

#[cfg(feature = "serial")]
mod serial {
    use super::ModemChannel;
    use crate::modem::error::Result;
    use log::{debug, info};
    use serialport::SerialPort;
    use std::io::{self, Read, Write};
    use std::time::Duration;
    use tokio::time::sleep;

    /// Modem attached to a local UART / USB serial adapter.
    pub struct SerialChannel {
        port: Box<dyn SerialPort>,
    }

    impl SerialChannel {
        /// Open `port_name` at 8N1 and discard any boot chatter the modem has
        /// already emitted.
        pub async fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
            info!("Opening modem on {} at {} baud", port_name, baud_rate);
            let mut builder =
                serialport::new(port_name, baud_rate).timeout(Duration::from_millis(50));
            #[cfg(unix)]
            {
                builder = builder
                    .data_bits(serialport::DataBits::Eight)
                    .stop_bits(serialport::StopBits::One)
                    .parity(serialport::Parity::None)
                    .flow_control(serialport::FlowControl::None);
            }
            let mut port = builder.open()?;
            // Modem boot banner ("RDY", "+CFUN: 1", "Call Ready") may still be draining
            sleep(Duration::from_millis(250)).await;
            let mut purged = 0usize;
            let mut purge_buf = [0u8; 256];
            while port.bytes_to_read()? > 0 {
                match port.read(&mut purge_buf) {
                    Ok(0) => break,
                    Ok(n) => purged += n,
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                    Err(e) => return Err(e.into()),
                }
            }
            debug!("Serial port {} ready, purged {} stale bytes", port_name, purged);
            Ok(Self { port })
        }
    }

    impl ModemChannel for SerialChannel {
        fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            Write::write_all(&mut self.port, data)?;
            self.port.flush()
        }

        fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let pending = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
            if pending == 0 || buf.is_empty() {
                return Ok(0);
            }
            let want = pending.min(buf.len());
            match self.port.read(&mut buf[..want]) {
                Ok(n) => Ok(n),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
                // EINTR during shutdown signals is not a channel fault
                Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
                Err(e) => Err(e),
            }
        }
    }
}

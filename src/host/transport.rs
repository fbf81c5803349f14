use crossbeam_channel::Sender;
use log::{debug, info, warn};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, BufRead, BufReader, Write};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::Result;
use crate::protocol::{encode, ProtocolMessage};

/// Outbound half of the serial connection. Each message is written as one
/// complete line and flushed.
pub struct SerialLink<W: Write> {
    writer: W,
    lines_sent: u64,
}

impl<W: Write> SerialLink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines_sent: 0 }
    }

    pub fn send(&mut self, message: &ProtocolMessage) -> io::Result<()> {
        let line = encode(message);
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        self.lines_sent += 1;
        Ok(())
    }

    pub fn lines_sent(&self) -> u64 {
        self.lines_sent
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Read timeout of the serial port. The reader thread retries on timeout.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Open the board's serial port at `baud_rate`, 8N1 raw, and split it into a
/// writer and a buffered reader.
pub fn open_serial(path: &str, baud_rate: u32) -> Result<(Box<dyn SerialPort>, BufReader<Box<dyn SerialPort>>)> {
    let port = serialport::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(READ_TIMEOUT)
        .open()?;
    let reader = BufReader::new(port.try_clone()?);
    info!("Opened serial port {} at {} baud", path, baud_rate);
    Ok((port, reader))
}

/// Forward every line from `reader` to `lines` on a background thread.
///
/// Invalid UTF-8 is replaced rather than rejected. A read timeout keeps the
/// partial line and reads on. The thread exits at end of input, on any other
/// read error, or once the receiving side is gone.
pub fn spawn_line_reader<R>(mut reader: R, lines: Sender<String>) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new().name("device-reader".into()).spawn(move || {
        let mut buffer = Vec::new();
        loop {
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => {
                    forward_line(&buffer, &lines);
                    info!("Device connection closed");
                    break;
                }
                Ok(_) => {
                    let delivered = forward_line(&buffer, &lines);
                    buffer.clear();
                    if !delivered {
                        break;
                    }
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::TimedOut) => continue,
                Err(e) => {
                    warn!("Device read failed: {}", e);
                    break;
                }
            }
        }
    })
}

/// Send one trimmed line. False once the receiver is gone.
fn forward_line(buffer: &[u8], lines: &Sender<String>) -> bool {
    let line = String::from_utf8_lossy(buffer).trim().to_string();
    if line.is_empty() {
        return true;
    }
    debug!("device >> {}", line);
    lines.send(line).is_ok()
}

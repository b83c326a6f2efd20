use std::thread::JoinHandle;

use crossbeam_channel as cbc;

use super::Peripheral;

/// A helper struct for [`ChannelDevice::new`],
/// indicating the channel is closed and no more reads/writes will come from it.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stop;

/// A device that reads from one channel and writes to another.
///
/// A byte is pending (see [`Peripheral::poll`]) once the reader thread has produced it.
/// Written bytes are handed to the writer thread.
pub struct ChannelDevice {
    read_data:    cbc::Receiver<u8>,
    #[allow(unused)]
    read_handler: JoinHandle<()>,

    write_data:    Option<cbc::Sender<u8>>,
    write_handler: Option<JoinHandle<()>>
}
impl ChannelDevice {
    /// Creates a new channel device with the given reader and writer.
    ///
    /// The reader function is called every time the device can buffer another byte.
    /// It should block until a byte is ready, or return Stop
    /// if there are no more bytes to read.
    ///
    /// The writer function is called every time a byte is written to the device.
    ///
    /// This uses threads to read and write from input and output.
    /// The reader thread keeps polling for input even while the machine is stopped.
    pub fn new(
        mut reader: impl FnMut() -> Result<u8, Stop> + Send + 'static,
        mut writer: impl FnMut(u8) -> Result<(), Stop> + Send + 'static
    ) -> Self {
        let (read_tx, read_rx) = cbc::bounded(1);
        let (write_tx, write_rx) = cbc::unbounded();

        // Reader thread:
        let read_handler = std::thread::spawn(move || loop {
            let Ok(byte) = reader() else { return };
            let Ok(()) = read_tx.send(byte) else { return };
        });

        // Writer thread:
        let write_handler = std::thread::spawn(move || {
            for byte in write_rx {
                let Ok(()) = writer(byte) else { return };
            }
        });

        Self {
            read_data: read_rx,
            read_handler,
            write_data: Some(write_tx),
            write_handler: Some(write_handler)
        }
    }

    /// Creates a channel device with stdin being the read data and stdout being the write data.
    ///
    /// Note that due to how stdin works in terminals, data is only sent once a new line is typed.
    /// Additionally, this flushes stdout every time a byte is written.
    pub fn stdio() -> Self {
        use std::io::{self, BufRead, Write};

        Self::new(
            || {
                let mut stdin = io::stdin().lock();
                let &[byte, ..] = stdin.fill_buf().map_err(|_| Stop)? else {
                    return Err(Stop);
                };

                stdin.consume(1);
                Ok(byte)
            },
            |byte| {
                let mut stdout = io::stdout();
                stdout.write_all(&[byte]).map_err(|_| Stop)?;
                stdout.flush().map_err(|_| Stop)
            }
        )
    }
}
impl Peripheral for ChannelDevice {
    fn write(&mut self, byte: u8) {
        if let Some(tx) = &self.write_data {
            // a disconnected writer just drops the byte
            let _ = tx.send(byte);
        }
    }

    fn read(&mut self) -> u8 {
        // Disconnected means the reader stopped, which reads the same as no data.
        self.read_data.try_recv().unwrap_or(0)
    }

    fn poll(&mut self) -> bool {
        !self.read_data.is_empty()
    }
}
impl Drop for ChannelDevice {
    fn drop(&mut self) {
        // Disconnect the writer and wait for it to flush.
        // The reader can hang on its input, so it is not joined.
        std::mem::drop(self.write_data.take());
        if let Some(handle) = self.write_handler.take() {
            let _ = handle.join();
        }
    }
}
impl std::fmt::Debug for ChannelDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelDevice").finish_non_exhaustive()
    }
}

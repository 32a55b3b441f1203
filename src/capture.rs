//! Packet sources and sinks for replaying a chain over captured traffic.

use crate::types::{CaptureError, Packet};

/// Where replayed packets come from. Read eagerly, all at once.
pub trait PacketSource {
    /// # Errors
    ///
    /// Returns [`CaptureError`] if the packets cannot be read or decoded.
    fn read_all(&mut self) -> Result<Vec<Packet>, CaptureError>;
}

/// Where packets that survive a replay are written, one at a time.
pub trait PacketSink {
    /// # Errors
    ///
    /// Returns [`CaptureError`] if the packet cannot be stored.
    fn write_packet(&mut self, packet: Packet) -> Result<(), CaptureError>;
}

impl PacketSource for Vec<Packet> {
    fn read_all(&mut self) -> Result<Vec<Packet>, CaptureError> {
        Ok(self.clone())
    }
}

impl PacketSink for Vec<Packet> {
    fn write_packet(&mut self, packet: Packet) -> Result<(), CaptureError> {
        self.push(packet);
        Ok(())
    }
}

#[cfg(feature = "capture-json")]
pub use json::JsonLinesCapture;

#[cfg(feature = "capture-json")]
mod json {
    use std::fs::{File, OpenOptions};
    use std::io::{BufRead, BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};

    use tracing::debug;

    use super::{PacketSink, PacketSource};
    use crate::types::{CaptureError, Packet};

    /// A capture file holding one JSON-encoded packet per line.
    ///
    /// Writing appends to the file, so the same path can collect packets
    /// across several replays.
    #[derive(Debug, Clone)]
    pub struct JsonLinesCapture {
        path: PathBuf,
        appended: usize,
    }

    impl JsonLinesCapture {
        /// Use an existing capture file, or one that will be created on the
        /// first write.
        #[must_use]
        pub fn open(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
                appended: 0,
            }
        }

        /// Create an empty capture file, truncating any existing one.
        ///
        /// # Errors
        ///
        /// Returns [`CaptureError::Io`] if the file cannot be created.
        pub fn create(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
            File::create(path.as_ref())?;
            Ok(Self::open(path))
        }

        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        /// Append one packet to the file.
        ///
        /// # Errors
        ///
        /// Returns [`CaptureError`] on I/O or encoding failure.
        pub fn append(&mut self, packet: &Packet) -> Result<(), CaptureError> {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            let mut w = BufWriter::new(file);
            self.appended += 1;
            serde_json::to_writer(&mut w, packet).map_err(|source| CaptureError::Json {
                line: self.appended,
                source,
            })?;
            w.write_all(b"\n")?;
            w.flush()?;
            Ok(())
        }
    }

    impl PacketSource for JsonLinesCapture {
        fn read_all(&mut self) -> Result<Vec<Packet>, CaptureError> {
            let reader = BufReader::new(File::open(&self.path)?);
            let mut packets = Vec::new();
            for (i, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let packet = serde_json::from_str(&line)
                    .map_err(|source| CaptureError::Json { line: i + 1, source })?;
                packets.push(packet);
            }
            debug!(path = %self.path.display(), count = packets.len(), "read capture");
            Ok(packets)
        }
    }

    impl PacketSink for JsonLinesCapture {
        fn write_packet(&mut self, packet: Packet) -> Result<(), CaptureError> {
            self.append(&packet)
        }
    }

}

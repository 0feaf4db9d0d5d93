//! Archive reader.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::types::{ArchiveHeader, HEADER_SIZE, MAX_MESSAGE_BYTES};
use crate::engine::{Observation, RigScan};

/// Error type for archive playback.
#[derive(Debug)]
pub enum PlayerError {
    Io(std::io::Error),
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    Deserialize(String),
    InvalidFormat(String),
}

impl std::fmt::Display for PlayerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerError::Io(e) => write!(f, "I/O error: {}", e),
            PlayerError::Open { path, source } => {
                write!(f, "cannot open {}: {}", path.display(), source)
            }
            PlayerError::Deserialize(e) => write!(f, "Deserialization error: {}", e),
            PlayerError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
        }
    }
}

impl std::error::Error for PlayerError {}

impl From<std::io::Error> for PlayerError {
    fn from(e: std::io::Error) -> Self {
        PlayerError::Io(e)
    }
}

impl From<postcard::Error> for PlayerError {
    fn from(e: postcard::Error) -> Self {
        PlayerError::Deserialize(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;

/// Sequential reader yielding observations in file order.
///
/// # Example
///
/// ```ignore
/// let player = ArchivePlayer::open("run1.rlog")?;
/// log::info!("{} observations", player.message_count());
/// for observation in player {
///     let observation = observation?;
/// }
/// ```
pub struct ArchivePlayer {
    reader: BufReader<File>,
    header: ArchiveHeader,
    messages_read: u64,
}

impl ArchivePlayer {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| PlayerError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);

        let mut header_buffer = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_buffer).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                PlayerError::InvalidFormat(format!(
                    "{}: file shorter than archive header",
                    path.display()
                ))
            } else {
                PlayerError::Io(e)
            }
        })?;

        let header: ArchiveHeader = postcard::from_bytes(&header_buffer).map_err(|e| {
            PlayerError::InvalidFormat(format!(
                "{}: failed to parse header: {}",
                path.display(),
                e
            ))
        })?;
        if !header.is_valid() {
            return Err(PlayerError::InvalidFormat(format!(
                "{}: invalid archive magic bytes",
                path.display()
            )));
        }

        Ok(Self {
            reader,
            header,
            messages_read: 0,
        })
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Observation count recorded in the header.
    pub fn message_count(&self) -> u64 {
        self.header.message_count
    }

    pub fn messages_read(&self) -> u64 {
        self.messages_read
    }

    /// Next observation, `None` at end of file.
    pub fn next_observation(&mut self) -> Result<Option<Observation>> {
        let mut len_bytes = [0u8; 4];
        match self.reader.read_exact(&mut len_bytes) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_MESSAGE_BYTES {
            return Err(PlayerError::InvalidFormat(format!(
                "Message too large: {} bytes",
                len
            )));
        }

        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                PlayerError::InvalidFormat(format!(
                    "Truncated message {} ({} bytes expected)",
                    self.messages_read, len
                ))
            } else {
                PlayerError::Io(e)
            }
        })?;

        let observation: Observation = postcard::from_bytes(&payload)?;
        self.messages_read += 1;
        Ok(Some(observation))
    }

    /// Back to the first observation.
    pub fn rewind(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
        self.messages_read = 0;
        Ok(())
    }

    /// Iterate over rig scans only.
    pub fn range_scans(&mut self) -> impl Iterator<Item = Result<RigScan>> + '_ {
        std::iter::from_fn(move || loop {
            match self.next_observation() {
                Ok(Some(Observation::RangeScan(scan))) => return Some(Ok(scan)),
                Ok(Some(_)) => continue,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            }
        })
    }
}

impl Iterator for ArchivePlayer {
    type Item = Result<Observation>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_observation().transpose()
    }
}

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crate::error::{CommandError, LoadError};
use crate::machine::Machine;

/// somewhere ROM images can be fetched from, by name
pub trait RomSource: Send + 'static {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, io::Error>;
}

/// ROMs as files in a directory, e.g. roms/PONG2
pub struct RomDirectory {
    root: PathBuf,
}

impl RomDirectory {
    pub fn new(root: impl AsRef<Path>) -> Self {
        RomDirectory {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl RomSource for RomDirectory {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, io::Error> {
        // names, not paths
        if name.is_empty() || name.contains(&['/', '\\'][..]) || name == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' isn't a ROM name", name),
            ));
        }
        fs::read(self.root.join(name))
    }
}

/// ROMs held in memory; handy for tests and for embedding
#[derive(Default, Clone)]
pub struct InMemoryRoms {
    roms: HashMap<String, Vec<u8>>,
}

impl InMemoryRoms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.roms.insert(name.to_string(), bytes);
        self
    }
}

impl RomSource for InMemoryRoms {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, io::Error> {
        self.roms.get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no ROM called '{}'", name))
        })
    }
}

enum LoadState {
    Idle,
    Pending {
        name: String,
        fetched: Receiver<io::Result<Vec<u8>>>,
    },
    Finished,
}

/// fetches one ROM per session in the background and hands it to the machine
/// once it arrives. the fetch never blocks the caller; completion is noticed
/// by polling
pub struct RomLoader {
    state: LoadState,
}

impl RomLoader {
    pub fn new() -> Self {
        RomLoader {
            state: LoadState::Idle,
        }
    }

    /// kick off the fetch. only one load is allowed, whatever its outcome
    pub fn begin(&mut self, source: impl RomSource, name: &str) -> Result<(), CommandError> {
        if !matches!(self.state, LoadState::Idle) {
            return Err(CommandError::LoadAlreadyRequested);
        }
        log::info!("fetching ROM '{}'", name);
        let (tx, rx) = mpsc::channel();
        let n = name.to_string();
        thread::spawn(move || {
            // nobody listening any more is fine
            let _ = tx.send(source.fetch(&n));
        });
        self.state = LoadState::Pending {
            name: name.to_string(),
            fetched: rx,
        };
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, LoadState::Pending { .. })
    }

    /// if the fetch has finished, transfer the bytes into the machine and
    /// report the outcome. None while still pending (or if nothing is)
    pub fn poll(&mut self, machine: &mut impl Machine) -> Option<Result<(), LoadError>> {
        let fetched = match &self.state {
            LoadState::Pending { fetched, .. } => match fetched.try_recv() {
                Ok(result) => Some(result),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => None,
            },
            _ => return None,
        };
        Some(self.finish(fetched, machine))
    }

    /// like poll, but blocks until the fetch is done
    pub fn wait(&mut self, machine: &mut impl Machine) -> Option<Result<(), LoadError>> {
        let fetched = match &self.state {
            LoadState::Pending { fetched, .. } => fetched.recv().ok(),
            _ => return None,
        };
        Some(self.finish(fetched, machine))
    }

    fn finish(
        &mut self,
        fetched: Option<io::Result<Vec<u8>>>,
        machine: &mut impl Machine,
    ) -> Result<(), LoadError> {
        let name = match std::mem::replace(&mut self.state, LoadState::Finished) {
            LoadState::Pending { name, .. } => name,
            _ => unreachable!("finish is only reached from a pending load"),
        };
        let bytes = match fetched {
            None => return Err(LoadError::Abandoned { name }),
            Some(Err(source)) => return Err(LoadError::Fetch { name, source }),
            Some(Ok(bytes)) => bytes,
        };
        let len = bytes.len();
        machine
            .load_program(bytes)
            .map_err(|source| LoadError::Transfer {
                name: name.clone(),
                source,
            })?;
        log::info!("loaded ROM '{}' ({} bytes)", name, len);
        Ok(())
    }
}

impl Default for RomLoader {
    fn default() -> Self {
        Self::new()
    }
}

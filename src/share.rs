// Shared-file references: the boundary where whatever handed us the files
// (command line arguments, a pipe) is turned into a name and a byte stream.

use crate::error::ShareError;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Name used when a source has nothing better to offer.
pub const DEFAULT_DISPLAY_NAME: &str = "document";

/// Argument that means "read the file from standard input".
pub const STDIN_MARKER: &str = "-";

/// One file handed to us for upload.
pub trait ShareSource {
    /// File name to report to the server.
    fn display_name(&self) -> String;

    /// Open the bytes for reading. Called once, right before staging.
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;
}

/// A file on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ShareSource for LocalFile {
    fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string())
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// Bytes piped in on standard input.
#[derive(Debug, Clone)]
pub struct StdinShare {
    name: String,
}

impl StdinShare {
    pub fn new(name: Option<&str>) -> Self {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME);
        StdinShare {
            name: name.to_string(),
        }
    }
}

impl ShareSource for StdinShare {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(io::stdin().lock()))
    }
}

/// Turn command line arguments into sources. `-` reads standard input
/// under `stdin_name`; everything else is a path. Paths are not checked
/// here, an unreadable one fails the session when its turn comes.
///
/// Standard input drains on the first read, so `-` may appear only once.
pub fn resolve_sources(
    args: &[PathBuf],
    stdin_name: Option<&str>,
) -> Result<Vec<Box<dyn ShareSource>>, ShareError> {
    let count = args.iter().filter(|a| a.as_os_str() == STDIN_MARKER).count();
    if count > 1 {
        return Err(ShareError::StdinRepeated { count });
    }

    Ok(args
        .iter()
        .map(|arg| -> Box<dyn ShareSource> {
            if arg.as_os_str() == STDIN_MARKER {
                Box::new(StdinShare::new(stdin_name))
            } else {
                Box::new(LocalFile::new(arg))
            }
        })
        .collect())
}

/// Bytes already in memory. Only tests build these.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct MemoryShare {
    name: String,
    bytes: Vec<u8>,
}

#[cfg(test)]
impl MemoryShare {
    pub(crate) fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        MemoryShare {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[cfg(test)]
impl ShareSource for MemoryShare {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self.bytes.as_slice()))
    }
}

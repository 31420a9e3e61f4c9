// Private cache handling: staging shared bytes into temp files right
// before an upload and sweeping leftovers from sessions that crashed.

use crate::error::ShareError;
use log::{debug, trace};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Every staged upload starts with this; the janitor keys off it.
pub const TEMP_PREFIX: &str = "temp_";

/// Longest file name (in bytes) common filesystems accept.
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// A staged copy of one shared file. Deleted when dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    len: u64,
}

impl StagedFile {
    /// Copy everything `reader` yields into a new temp file in `cache_dir`.
    ///
    /// The drop guard exists before the file is created, so a copy that
    /// fails halfway does not leave a partial file behind.
    pub fn stage(
        cache_dir: &Path,
        index: usize,
        display_name: &str,
        reader: &mut dyn Read,
    ) -> Result<StagedFile, ShareError> {
        fs::create_dir_all(cache_dir).map_err(|e| {
            ShareError::io(format!("Could not create cache directory {}", cache_dir.display()), e)
        })?;

        let mut staged = StagedFile {
            path: cache_dir.join(temp_file_name(index, display_name)),
            len: 0,
        };
        let mut out = File::create(&staged.path)
            .map_err(|e| ShareError::io("Could not create temporary file", e))?;
        staged.len = io::copy(reader, &mut out)
            .map_err(|e| ShareError::io(format!("Could not read {}", display_name), e))?;
        out.sync_all()
            .map_err(|e| ShareError::io("Could not write temporary file", e))?;

        trace!("staged {} ({} bytes) at {}", display_name, staged.len, staged.path.display());
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => trace!("removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => debug!("could not remove {}: {}", self.path.display(), e),
        }
    }
}

/// `temp_<millis>_<index>_<name>` with path separators and control
/// characters in the name replaced. The name part is cut short, on a
/// character boundary, so the result fits in [`MAX_FILE_NAME_BYTES`].
fn temp_file_name(index: usize, display_name: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let safe: String = display_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let prefix = format!("{}{}_{}_", TEMP_PREFIX, millis, index);
    let mut end = safe.len().min(MAX_FILE_NAME_BYTES.saturating_sub(prefix.len()));
    while !safe.is_char_boundary(end) {
        end -= 1;
    }
    prefix + &safe[..end]
}

/// Delete every entry of `dir` whose name starts with [`TEMP_PREFIX`].
/// Individual failures and a missing directory are ignored. Returns how
/// many entries were removed.
pub fn sweep_stale_uploads(dir: &Path) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => trace!("skipping {}: {}", entry.path().display(), e),
        }
    }
    if removed > 0 {
        debug!("removed {} stale upload file(s) from {}", removed, dir.display());
    }
    removed
}

use std::fs::{File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use engine_logging::engine_debug;
use harvester_engine::{slot_filename, FileCursorStore};

/// Exclusive claim on one query's cursor slot for the lifetime of the value.
///
/// Two invocations for the same query would race on the cursor and could both
/// accept the same new name, so a second run fails fast instead. The claim is
/// an OS advisory lock on `cursor--{hash}.lock`: the kernel drops it when the
/// holding process exits for any reason, so a leftover lock file never blocks
/// a later run. The file itself is never removed.
#[derive(Debug)]
pub struct QueryLock {
    #[cfg_attr(not(test), allow(dead_code))]
    path: PathBuf,
    _file: File,
}

impl QueryLock {
    pub fn acquire(store: &FileCursorStore, query_key: &str) -> Result<Self> {
        store
            .prepare_dir()
            .with_context(|| format!("preparing {}", store.dir().display()))?;
        let path = store
            .dir()
            .join(slot_filename(query_key))
            .with_extension("lock");

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => bail!(
                "another run for this query is in progress (holds {})",
                path.display()
            ),
            Err(TryLockError::Error(err)) => {
                return Err(err).with_context(|| format!("locking {}", path.display()))
            }
        }

        file.set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()))
            .with_context(|| format!("writing {}", path.display()))?;
        engine_debug!("Acquired {:?}", path);
        Ok(Self { path, _file: file })
    }

    #[cfg(test)]
    fn path(&self) -> &std::path::Path {
        &self.path
    }
}

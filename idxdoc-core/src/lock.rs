use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;

/// Answers whether another process (the game client) currently holds a file.
pub trait LockProbe: Sync {
    fn is_lock_held(&self, path: &Path) -> bool;
}

impl<F> LockProbe for F
where
    F: Fn(&Path) -> bool + Sync,
{
    fn is_lock_held(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Tries to take a non-blocking exclusive lock and releases it right away.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fs2LockProbe;

impl LockProbe for Fs2LockProbe {
    fn is_lock_held(&self, path: &Path) -> bool {
        let f = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(f) => f,
            // Missing files are not locked; the write reports them.
            Err(e) if e.kind() == ErrorKind::NotFound => return false,
            Err(_) => return true,
        };
        match f.try_lock_exclusive() {
            Ok(()) => {
                let _ = f.unlock();
                false
            }
            Err(_) => true,
        }
    }
}

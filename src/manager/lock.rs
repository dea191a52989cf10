use anyhow::{Context, bail};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Claim on a control socket, held for as long as a manager serves it.
///
/// The claim is an flock on `<socket>.lock`; the file records the pid of the
/// serving manager so a refused second manager can say who it lost to.
pub struct SocketLock {
    file: File,
    socket: PathBuf,
}

impl SocketLock {
    pub fn for_socket(socket: &Path) -> anyhow::Result<Self> {
        let lock_path = socket.with_extension("lock");
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open {}", lock_path.display()))?;

        #[cfg(unix)]
        {
            use libc::{LOCK_EX, LOCK_NB, flock};
            // SAFETY: the descriptor belongs to `file`, which outlives the call.
            if unsafe { flock(file.as_raw_fd(), LOCK_EX | LOCK_NB) } != 0 {
                let mut owner = String::new();
                let _ = file.read_to_string(&mut owner);
                match owner.trim() {
                    "" => bail!("Touchpads on {} are already being served", socket.display()),
                    pid => bail!(
                        "Touchpads on {} are already being served by pid {}",
                        socket.display(),
                        pid
                    ),
                }
            }
        }

        file.set_len(0)?;
        file.rewind()?;
        writeln!(file, "{}", std::process::id())?;

        tracing::debug!("Claimed {} via {}", socket.display(), lock_path.display());
        Ok(Self {
            file,
            socket: socket.to_path_buf(),
        })
    }
}

impl Drop for SocketLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        tracing::debug!("Released claim on {}", self.socket.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_names_the_serving_pid() {
        let socket = std::env::temp_dir().join(format!("vtouchpad-{}.sock", ulid::Ulid::new()));
        let first = SocketLock::for_socket(&socket).unwrap();

        let err = SocketLock::for_socket(&socket).err().unwrap().to_string();
        assert!(err.contains(&socket.display().to_string()));
        assert!(err.ends_with(&format!("pid {}", std::process::id())));

        drop(first);
        assert!(SocketLock::for_socket(&socket).is_ok());
        let _ = std::fs::remove_file(socket.with_extension("lock"));
    }
}

//! pass backend - delegates encryption to the `pass` password manager
//!
//! Entries live under `<password-store>/<prefix>/`. `pass` appends `.gpg`
//! to entry names itself, so the leaf `data.gpg` is addressed as `data`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

use super::{ensure_relative, walk_files, BackendError, EncryptionBackend};

const GPG_EXTENSION: &str = "gpg";

pub struct PassBackend {
    /// Program to invoke
    program: String,
    /// Root of the password store (PASSWORD_STORE_DIR)
    store_dir: PathBuf,
    /// Subdirectory holding the credential tree
    prefix: String,
}

impl PassBackend {
    pub fn new(store_dir: &Path, prefix: &str) -> Self {
        Self {
            program: "pass".to_string(),
            store_dir: store_dir.to_path_buf(),
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    /// Use a different executable in place of `pass`
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    fn tree_dir(&self) -> PathBuf {
        self.store_dir.join(&self.prefix)
    }

    /// Name `pass` knows the entry by: prefix joined with the path, minus `.gpg`
    fn entry_name(&self, path: &Path) -> Result<String, BackendError> {
        ensure_relative(path)?;

        let mut name = Path::new(&self.prefix).join(path);
        if name.extension().is_some_and(|ext| ext == GPG_EXTENSION) {
            name.set_extension("");
        }

        name.to_str()
            .map(str::to_string)
            .ok_or_else(|| BackendError::InvalidPath(path.to_path_buf()))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env("PASSWORD_STORE_DIR", &self.store_dir);
        cmd
    }

    fn check(&self, output: Output) -> Result<Output, BackendError> {
        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(BackendError::Command {
            program: self.program.clone(),
            message: if stderr.trim().is_empty() {
                output.status.to_string()
            } else {
                stderr.trim().to_string()
            },
        })
    }
}

impl EncryptionBackend for PassBackend {
    fn write(&self, path: &Path, plaintext: &str) -> Result<(), BackendError> {
        let name = self.entry_name(path)?;
        debug!("pass insert {}", name);

        let mut child = self
            .command()
            .args(["insert", "--multiline", "--force", name.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // pass may exit before reading stdin; its own error explains why
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(plaintext.as_bytes()),
            None => Ok(()),
        };

        self.check(child.wait_with_output()?)?;
        written?;
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<String, BackendError> {
        let name = self.entry_name(path)?;
        if !self.tree_dir().join(path).is_file() {
            return Err(BackendError::NotFound(path.to_path_buf()));
        }

        debug!("pass show {}", name);
        let output = self.check(self.command().args(["show", name.as_str()]).output()?)?;

        String::from_utf8(output.stdout)
            .map_err(|_| BackendError::Decryption("Entry is not valid UTF-8".to_string()))
    }

    fn remove(&self, path: &Path) -> Result<(), BackendError> {
        let name = self.entry_name(path)?;
        if !self.tree_dir().join(path).is_file() {
            return Ok(());
        }

        debug!("pass rm {}", name);
        self.check(self.command().args(["rm", "--force", name.as_str()]).output()?)?;
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<PathBuf>, BackendError> {
        Ok(walk_files(&self.tree_dir())?
            .into_iter()
            .filter(|path| path.extension().is_some_and(|ext| ext == GPG_EXTENSION))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn temp_backend() -> (PassBackend, TempDir) {
        let temp = TempDir::new().unwrap();
        let backend = PassBackend::new(temp.path(), "docker-credential-helpers/");
        (backend, temp)
    }

    fn touch(temp: &TempDir, relative: &str) {
        let path = temp.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "encrypted").unwrap();
    }

    #[test]
    fn test_entry_name() {
        let (backend, _temp) = temp_backend();
        assert_eq!(
            backend.entry_name(Path::new("abc/data.gpg")).unwrap(),
            "docker-credential-helpers/abc/data"
        );
        assert!(backend.entry_name(Path::new("../abc/data.gpg")).is_err());
    }

    #[test]
    fn test_enumerate_only_gpg_files() {
        let (backend, temp) = temp_backend();
        assert!(backend.enumerate().unwrap().is_empty());

        touch(&temp, "docker-credential-helpers/abc/data.gpg");
        touch(&temp, "docker-credential-helpers/abc/.gpg-id");
        touch(&temp, "unrelated/data.gpg");

        assert_eq!(
            backend.enumerate().unwrap(),
            vec![PathBuf::from("abc/data.gpg")]
        );
    }

    #[test]
    fn test_missing_entries() {
        let (backend, _temp) = temp_backend();
        let backend = backend.with_program("false");

        assert!(matches!(
            backend.read(Path::new("abc/data.gpg")),
            Err(BackendError::NotFound(_))
        ));
        // Absent entries are removed without invoking the program
        backend.remove(Path::new("abc/data.gpg")).unwrap();
    }

    #[test]
    fn test_command_failure_is_reported() {
        let (backend, temp) = temp_backend();
        let backend = backend.with_program("false");

        assert!(matches!(
            backend.write(Path::new("abc/data.gpg"), "secret"),
            Err(BackendError::Command { .. })
        ));

        touch(&temp, "docker-credential-helpers/abc/data.gpg");
        assert!(matches!(
            backend.read(Path::new("abc/data.gpg")),
            Err(BackendError::Command { .. })
        ));
        assert!(matches!(
            backend.remove(Path::new("abc/data.gpg")),
            Err(BackendError::Command { .. })
        ));
    }

    #[test]
    fn test_early_exit_reports_program_failure() {
        let (backend, _temp) = temp_backend();
        let backend = backend.with_program("false");

        // Larger than a pipe buffer, so the write cannot finish before exit
        let secret = "x".repeat(1 << 20);
        let err = backend.write(Path::new("abc/data.gpg"), &secret).unwrap_err();
        match err {
            BackendError::Command { program, .. } => assert_eq!(program, "false"),
            other => panic!("expected command failure, got {:?}", other),
        }
    }

    #[test]
    fn test_show_output_is_returned() {
        let (backend, temp) = temp_backend();
        let backend = backend.with_program("true");

        touch(&temp, "docker-credential-helpers/abc/data.gpg");
        assert_eq!(backend.read(Path::new("abc/data.gpg")).unwrap(), "");
    }
}

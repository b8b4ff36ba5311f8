use envprovision::VercelCli;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Test helper standing in for the platform CLI
///
/// Writes a shell script into a temporary directory; every invocation appends
/// its arguments to `calls.log` before running the given body.
pub struct StubTool {
    _temp_dir: TempDir,
    pub dir: PathBuf,
    pub script: PathBuf,
}

impl StubTool {
    pub fn new(body: &str) -> Self {
        Self::with_body(|_| body.to_string())
    }

    /// Builds the script body from the stub's own directory, for stubs that
    /// record what they receive next to the script.
    pub fn with_body<F>(body: F) -> Self
    where
        F: FnOnce(&Path) -> String,
    {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        let script = dir.join("vercel-stub.sh");
        let log = dir.join("calls.log");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" >> '{}'\n{}\n",
                log.display(),
                body(&dir)
            ),
        )
        .unwrap();
        Self {
            _temp_dir: temp_dir,
            dir,
            script,
        }
    }

    /// A stub that consumes its input and exits 0.
    pub fn succeeding() -> Self {
        Self::new("cat > /dev/null\nexit 0")
    }

    /// A stub that consumes its input, prints `message` on stderr and exits 1.
    pub fn failing(message: &str) -> Self {
        Self::new(&format!("cat > /dev/null\necho '{}' >&2\nexit 1", message))
    }

    /// A stub that never exits on its own.
    pub fn hanging() -> Self {
        Self::new("exec sleep 30")
    }

    pub fn cli(&self, timeout: Duration) -> VercelCli {
        VercelCli::new("sh", timeout).with_prefix([self.script.display().to_string()])
    }

    /// The value for `--tool` / `ENVPROVISION_TOOL`.
    pub fn tool_command(&self) -> String {
        format!("sh {}", self.script.display())
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

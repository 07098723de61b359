//! External tool runner.
//!
//! Every build tool (`git`, `cmake`, `b2`, `curl`, ...) is launched through a
//! [`ToolEnv`]: the working directory, the extra search-path entries and the
//! variables it carries are applied to the child process only. The
//! process-wide environment and current directory are never touched, so a
//! scoped change ([`ToolEnv::scope`]) is undone simply by dropping the guard.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{program} not found on the search path")]
    NotFound { program: String },

    #[error("{program} exited with {}", describe_exit(.code))]
    Failed { program: String, code: Option<i32> },

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        source: io::Error,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref, clippy::ref_option)]
fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Working directory, search path and variables applied to external tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolEnv {
    cwd: Option<PathBuf>,
    /// Prepended to `PATH`, most recently added first.
    extra_path: Vec<PathBuf>,
    vars: BTreeMap<String, String>,
}

impl ToolEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory tools run in; `None` means the directory sdkbuild was started in.
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn set_cwd(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        tracing::debug!("cd {}", dir.display());
        self.cwd = Some(dir);
    }

    /// Put `dir` in front of the search path.
    pub fn prepend_path(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        tracing::debug!("add_path: {}", dir.display());
        self.extra_path.insert(0, dir);
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Variable as a tool would see it: our own first, then the process environment.
    pub fn var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    }

    /// The full `PATH` handed to child processes.
    pub fn search_path(&self) -> OsString {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let dirs = self
            .extra_path
            .iter()
            .cloned()
            .chain(std::env::split_paths(&inherited));
        // A directory containing the separator cannot be expressed; fall back
        // to the inherited value rather than dropping every entry.
        std::env::join_paths(dirs).unwrap_or(inherited)
    }

    /// Locate `program` on the search path. Paths containing a separator are
    /// resolved against the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if no executable matches.
    pub fn resolve(&self, program: &str) -> Result<PathBuf, ToolError> {
        let cwd = match &self.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|source| ToolError::Io {
                program: program.to_string(),
                source,
            })?,
        };
        which::which_in(program, Some(self.search_path()), cwd).map_err(|_| ToolError::NotFound {
            program: program.to_string(),
        })
    }

    pub fn command(&self, program: impl Into<String>) -> ToolCommand<'_> {
        ToolCommand {
            env: self,
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            cwd: None,
            stdin: None,
        }
    }

    /// Open a scope whose changes are discarded when the guard drops.
    pub fn scope(&mut self) -> EnvScope<'_> {
        let saved = self.clone();
        EnvScope { env: self, saved }
    }

    /// [`scope`](Self::scope) with the working directory already changed.
    pub fn in_dir(&mut self, dir: impl Into<PathBuf>) -> EnvScope<'_> {
        let mut scope = self.scope();
        scope.set_cwd(dir);
        scope
    }
}

/// RAII guard returned by [`ToolEnv::scope`].
#[derive(Debug)]
pub struct EnvScope<'a> {
    env: &'a mut ToolEnv,
    saved: ToolEnv,
}

impl Deref for EnvScope<'_> {
    type Target = ToolEnv;

    fn deref(&self) -> &ToolEnv {
        self.env
    }
}

impl DerefMut for EnvScope<'_> {
    fn deref_mut(&mut self) -> &mut ToolEnv {
        self.env
    }
}

impl Drop for EnvScope<'_> {
    fn drop(&mut self) {
        let leaving = self
            .env
            .cwd
            .as_ref()
            .filter(|dir| self.saved.cwd.as_ref() != Some(*dir));
        if let Some(dir) = leaving {
            tracing::debug!("popd {}", dir.display());
        }
        *self.env = std::mem::take(&mut self.saved);
    }
}

/// A single invocation being assembled.
#[derive(Debug)]
pub struct ToolCommand<'a> {
    env: &'a ToolEnv,
    program: String,
    args: Vec<OsString>,
    envs: Vec<(String, OsString)>,
    cwd: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
}

impl ToolCommand<'_> {
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl AsRef<OsStr>) -> Self {
        self.envs.push((key.into(), value.as_ref().to_os_string()));
        self
    }

    /// Run in `dir` instead of the environment's working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Feed `data` to the child's standard input.
    pub fn stdin_bytes(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    fn build(&self) -> Result<Command, ToolError> {
        let resolved = match &self.cwd {
            Some(dir) => {
                let mut env = self.env.clone();
                env.cwd = Some(dir.clone());
                env.resolve(&self.program)?
            }
            None => self.env.resolve(&self.program)?,
        };

        tracing::debug!("+ {}", self.display());

        let mut cmd = Command::new(resolved);
        cmd.args(&self.args).env("PATH", self.env.search_path());
        if let Some(dir) = self.cwd.as_ref().or(self.env.cwd.as_ref()) {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env.vars {
            cmd.env(key, value);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        Ok(cmd)
    }

    fn io_err(&self, source: io::Error) -> ToolError {
        if source.kind() == io::ErrorKind::NotFound {
            ToolError::NotFound {
                program: self.program.clone(),
            }
        } else {
            ToolError::Io {
                program: self.program.clone(),
                source,
            }
        }
    }

    fn check(&self, status: ExitStatus) -> Result<(), ToolError> {
        if status.success() {
            Ok(())
        } else {
            Err(ToolError::Failed {
                program: self.program.clone(),
                code: status.code(),
            })
        }
    }

    /// Run to completion with inherited stdout/stderr.
    ///
    /// # Errors
    ///
    /// [`ToolError::NotFound`] if the program cannot be located,
    /// [`ToolError::Failed`] on a non-zero exit.
    pub fn run(self) -> Result<(), ToolError> {
        let mut cmd = self.build()?;

        let status = match &self.stdin {
            None => cmd.status().map_err(|e| self.io_err(e))?,
            Some(data) => {
                let mut child = cmd
                    .stdin(Stdio::piped())
                    .spawn()
                    .map_err(|e| self.io_err(e))?;
                if let Some(mut pipe) = child.stdin.take() {
                    // The child may stop reading once it has what it needs.
                    let written = match pipe.write_all(data) {
                        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                        other => other,
                    };
                    written.map_err(|e| self.io_err(e))?;
                }
                child.wait().map_err(|e| self.io_err(e))?
            }
        };

        self.check(status)
    }

    /// Run to completion and return stdout, trimmed.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn capture(self) -> Result<String, ToolError> {
        let mut cmd = self.build()?;
        let output = cmd
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| self.io_err(e))?;
        self.check(output.status)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

//! Command builder and log streaming for tokenizer servers.
//!
//! This module handles building the tokenizer server command and
//! forwarding its stdout/stderr into `tracing`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::debug;

/// How to launch a tokenizer server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdOptions {
    program: String,
    /// Arguments passed after the program.
    pub args: Vec<String>,
    /// Working directory; inherits the caller's when `None`.
    pub dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
}

impl CmdOptions {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            env: Vec::new(),
        }
    }

    /// Run `java -jar <jar_name> <port> <backlog>` inside `dir`.
    ///
    /// JVM tokenizer servers take their listen port and accept backlog as
    /// positional arguments.
    pub fn java_jar(dir: impl AsRef<Path>, jar_name: &str, port: u16, backlog: u32) -> Self {
        Self::new("java")
            .with_args(["-jar", jar_name])
            .with_arg(port.to_string())
            .with_arg(backlog.to_string())
            .with_dir(dir.as_ref())
    }

    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the command: stdin piped for the stop keyword, stdout and stderr
    /// piped for log forwarding.
    ///
    /// `kill_on_drop` guarantees a child cannot outlive its exit observer, for
    /// example when the runtime shuts down mid-start.
    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl fmt::Display for CmdOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Forward the child's stdout and stderr to `tracing`, one event per line.
pub(crate) fn spawn_log_readers(child: &mut Child, port: u16) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "tokbridge::server_log", port = %port, stream = "stdout", "{line}");
            }
            debug!(port = %port, "stdout reader task exiting");
        });
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "tokbridge::server_log", port = %port, stream = "stderr", "{line}");
            }
            debug!(port = %port, "stderr reader task exiting");
        });
    }
}

//! External tool invocation with per-call timeouts.
//!
//! Every real transformation in the pipeline is delegated to an existing
//! command-line tool. The pipeline only ever talks to tools through the
//! [`ToolRunner`] trait, so stage logic can be exercised in tests with a
//! scripted runner and no binaries installed.
//!
//! [`ProcessRunner`] is the production implementation: it spawns the child
//! with a null stdin, captures stdout/stderr, and kills the child when the
//! timeout expires. Timeout and nonzero exit are both terminal for the
//! whole run; the mapping to [`ConvertError`] happens in [`run_checked`].

use crate::error::{ConvertError, ExitStatusReport, Step};
use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// The external programs the pipeline knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Office-suite renderer (`libreoffice --headless --convert-to`).
    LibreOffice,
    /// Raster/PDF converter (`gm convert`).
    GraphicsMagick,
    /// Page splitter (`pdftk burst`).
    Pdftk,
    /// Page rasteriser (`pdftocairo -png`).
    Pdftocairo,
    /// Text recognition (`tesseract … pdf`).
    Tesseract,
    /// Page merger (`pdfunite`).
    Pdfunite,
    /// PDF compressor (`ps2pdf`).
    Ps2pdf,
}

impl Tool {
    /// Default executable name looked up on `PATH`.
    pub fn program(self) -> &'static str {
        match self {
            Tool::LibreOffice => "libreoffice",
            Tool::GraphicsMagick => "gm",
            Tool::Pdftk => "pdftk",
            Tool::Pdftocairo => "pdftocairo",
            Tool::Tesseract => "tesseract",
            Tool::Pdfunite => "pdfunite",
            Tool::Ps2pdf => "ps2pdf",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tool::LibreOffice => "LibreOffice",
            Tool::GraphicsMagick => "GraphicsMagick",
            other => other.program(),
        };
        f.write_str(name)
    }
}

/// One request to run an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool: Tool,
    pub args: Vec<OsString>,
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(tool: Tool, timeout: Duration) -> Self {
        Self {
            tool,
            args: Vec::new(),
            timeout,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Arguments as lossy UTF-8, for logging and assertions.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

/// Captured result of a tool that ran to completion (successfully or not).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, or `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Default::default()
        }
    }

    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// What happened when a tool was run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Completed(ToolOutput),
    TimedOut,
}

/// Capability to run an external tool with a timeout.
///
/// `Err` means the process could not be started at all.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> std::io::Result<ToolOutcome>;
}

/// Runs tools as real child processes via `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    overrides: HashMap<Tool, PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `program` instead of the default executable for `tool`.
    pub fn with_program(mut self, tool: Tool, program: impl Into<PathBuf>) -> Self {
        self.overrides.insert(tool, program.into());
        self
    }

    fn program_for(&self, tool: Tool) -> PathBuf {
        self.overrides
            .get(&tool)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(tool.program()))
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &ToolInvocation) -> std::io::Result<ToolOutcome> {
        let program = self.program_for(invocation.tool);
        let child = Command::new(&program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(ToolOutcome::Completed(ToolOutput {
                    code: output.status.code(),
                    stdout: output.stdout,
                    stderr: output.stderr,
                }))
            }
            Err(_) => Ok(ToolOutcome::TimedOut),
        }
    }
}

/// Run `invocation` and turn anything but a clean exit into a [`ConvertError`].
pub async fn run_checked(
    runner: &dyn ToolRunner,
    step: Step,
    invocation: ToolInvocation,
) -> Result<ToolOutput, ConvertError> {
    let tool = invocation.tool;
    debug!("{} {:?} (timeout {:?})", tool.program(), invocation.args_lossy(), invocation.timeout);

    let start = Instant::now();
    let outcome = runner.run(&invocation).await.map_err(|e| {
        warn!("{tool} could not be started: {e}");
        ConvertError::ToolFailure {
            step,
            tool,
            status: ExitStatusReport::NotStarted(e.to_string()),
        }
    })?;

    match outcome {
        ToolOutcome::TimedOut => {
            warn!("{tool} timed out after {:?} while {step}", invocation.timeout);
            Err(ConvertError::ToolTimeout {
                step,
                tool,
                limit_secs: invocation.timeout.as_secs(),
            })
        }
        ToolOutcome::Completed(output) if output.is_success() => {
            debug!("{} finished in {}ms", tool.program(), start.elapsed().as_millis());
            Ok(output)
        }
        ToolOutcome::Completed(output) => {
            warn!(
                "{tool} failed while {step} (code {:?}): {}",
                output.code,
                stderr_tail(&output.stderr)
            );
            let status = match output.code {
                Some(code) => ExitStatusReport::Code(code),
                None => ExitStatusReport::Signal,
            };
            Err(ConvertError::ToolFailure { step, tool, status })
        }
    }
}

/// Last few lines of a tool's stderr, for log lines.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join(" | ")
}

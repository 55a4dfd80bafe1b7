//src/run_check.rs

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};

/// Return code reported for a stage that could not be started,
/// same as a shell's "command not found".
pub const SPAWN_FAILURE_CODE: i32 = 127;

/// One or more commands chained stdout -> stdin, like `a | b | c`.
pub struct Pipeline {
    stages: Vec<Command>,
}

/// What a successful run left behind.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub code: i32,
    /// Stdout of the last stage
    pub stdout: String,
    /// Stderr of every stage, in stage order
    pub stderr: String,
}

impl Pipeline {
    pub fn new(cmd: Command) -> Self {
        Self { stages: vec![cmd] }
    }

    pub fn pipe(mut self, cmd: Command) -> Self {
        self.stages.push(cmd);
        self
    }

    /// Shell-ish rendering for logs, errors and the report
    pub fn describe(&self) -> String {
        self.stages
            .iter()
            .map(describe_command)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl From<Command> for Pipeline {
    fn from(cmd: Command) -> Self {
        Pipeline::new(cmd)
    }
}

pub fn describe_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

enum Stage {
    Running(Child, JoinHandle<String>),
    Failed(String),
}

/// Run `pipeline` to completion and fail if any stage exits non-zero
/// (`set -o pipefail`). The reported code is the one of the rightmost
/// failing stage, as bash does.
pub fn run_check<P: Into<Pipeline>>(pipeline: P) -> Result<RunOutput> {
    let pipeline = pipeline.into();
    let description = pipeline.describe();
    log::info!("Running `{description}`");

    let n = pipeline.stages.len();
    let mut stages = Vec::with_capacity(n);
    let mut prev_stdout: Option<Stdio> = None;

    for (i, mut cmd) in pipeline.stages.into_iter().enumerate() {
        cmd.stdin(prev_stdout.take().unwrap_or_else(Stdio::null));
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        match cmd.spawn() {
            Ok(mut child) => {
                if i + 1 < n {
                    prev_stdout = child.stdout.take().map(Stdio::from);
                }
                let stderr = child.stderr.take();
                // Drain stderr concurrently so a chatty stage can't block on a full pipe
                let handle = thread::spawn(move || {
                    let mut buf = String::new();
                    if let Some(mut s) = stderr {
                        let _ = s.read_to_string(&mut buf);
                    }
                    buf
                });
                stages.push(Stage::Running(child, handle));
            }
            Err(e) => {
                stages.push(Stage::Failed(format!(
                    "{}: {e}\n",
                    cmd.get_program().to_string_lossy()
                )));
            }
        }
    }

    let mut stdout = String::new();
    if let Some(Stage::Running(child, _)) = stages.last_mut() {
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout)?;
        }
    }

    let mut stderr = String::new();
    let mut failed_code: Option<i32> = None;
    for stage in stages {
        let code = match stage {
            Stage::Running(mut child, handle) => {
                let status = child.wait()?;
                stderr.push_str(&handle.join().unwrap_or_default());
                exit_code(status)
            }
            Stage::Failed(msg) => {
                stderr.push_str(&msg);
                SPAWN_FAILURE_CODE
            }
        };
        if code != 0 {
            failed_code = Some(code);
        }
    }

    match failed_code {
        Some(code) => {
            log::error!("`{description}` exited with {code}");
            Err(Error::ExternalProcess {
                command: description,
                code,
                stderr,
            })
        }
        None => Ok(RunOutput {
            code: 0,
            stdout,
            stderr,
        }),
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    fn code_of(r: Result<RunOutput>) -> i32 {
        match r {
            Err(Error::ExternalProcess { code, .. }) => code,
            other => panic!("expected ExternalProcess, got {other:?}"),
        }
    }

    #[test]
    fn test_nonzero_exit() {
        assert_eq!(code_of(run_check(sh("echo oops >&2; exit 2"))), 2);

        match run_check(sh("echo oops >&2; exit 2")) {
            Err(e) => {
                let msg = e.to_string();
                assert!(msg.contains("`2`"));
                assert!(msg.contains("oops"));
            }
            Ok(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_missing_program() {
        assert_eq!(code_of(run_check(Command::new("surely-not-a-real-program"))), 127);

        let mut echo = Command::new("echo");
        echo.arg("hi");
        let p = Pipeline::new(echo).pipe(Command::new("surely-not-a-real-program"));
        assert_eq!(code_of(run_check(p)), 127);
    }

    #[test]
    fn test_pipefail() {
        // `cat` succeeds but the first stage failed
        let p = Pipeline::new(sh("exit 3")).pipe(Command::new("cat"));
        assert_eq!(code_of(run_check(p)), 3);
    }

    #[test]
    fn test_success_through_tee() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("tmp");

        let mut echo = Command::new("echo");
        echo.arg("hi");
        let mut tee = Command::new("tee");
        tee.arg(&tmp);
        let p = Pipeline::new(echo).pipe(tee);
        assert_eq!(p.describe(), format!("echo hi | tee {}", tmp.display()));

        let out = run_check(p).unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(out.stdout, "hi\n");
        assert_eq!(std::fs::read_to_string(&tmp).unwrap(), "hi\n");
    }
}

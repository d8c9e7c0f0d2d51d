//! Subprocess execution primitives with consistent error handling.
//!
//! `run_streamed` is the workhorse for long-running external tools: it
//! forwards the child's stdout and stderr line-by-line to two caller-supplied
//! sinks while the child runs. `run_buffered` captures both streams for short
//! commands whose output is only interesting on failure.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use serde::Serialize;

use crate::error::{Error, Result};

/// Run an executable with the given arguments, streaming its output.
///
/// - `args` are passed verbatim; nothing is shell-interpreted.
/// - `env` entries are layered on top of the inherited environment
///   (duplicates override the inherited value).
/// - `dir`, if given, becomes the child's working directory.
/// - Every line read from a stream is written to the matching sink as soon as
///   it is available, with a trailing newline.
///
/// Both pipes are drained to completion before the exit status is awaited.
/// Waiting first can deadlock: a child that fills a pipe buffer nobody reads
/// blocks forever.
pub fn run_streamed(
    exe: &str,
    args: &[String],
    env: &[(String, String)],
    dir: Option<&Path>,
    stdout_sink: &mut (dyn Write + Send),
    stderr_sink: &mut (dyn Write + Send),
) -> Result<()> {
    let mut cmd = Command::new(exe);
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
    for (key, value) in env {
        cmd.env(key, value);
    }
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::process_spawn_failed(exe, e.to_string()))?;

    let stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| Error::internal_unexpected("child stdout pipe missing"))?;
    let stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| Error::internal_unexpected("child stderr pipe missing"))?;

    // Each reader exclusively owns one stream/sink pair. The scope is the
    // join barrier: both drains finish before we look at the exit status,
    // and a failure on one stream never cancels the other.
    let (stdout_result, stderr_result) = thread::scope(|scope| {
        let stdout_handle = scope.spawn(move || drain_lines(stdout_pipe, stdout_sink));
        let stderr_result = drain_lines(stderr_pipe, stderr_sink);
        let stdout_result = match stdout_handle.join() {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::other("stdout drain thread panicked")),
        };
        (stdout_result, stderr_result)
    });

    merge_stream_errors(exe, stdout_result, stderr_result)?;

    let status = child
        .wait()
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("wait for {}", exe))))?;
    if !status.success() {
        return Err(Error::process_exited_nonzero(exe, status.code()));
    }
    Ok(())
}

fn drain_lines<R: Read>(pipe: R, sink: &mut (dyn Write + Send)) -> std::io::Result<()> {
    let reader = BufReader::new(pipe);
    for line in reader.lines() {
        writeln!(sink, "{}", line?)?;
    }
    Ok(())
}

fn merge_stream_errors(
    exe: &str,
    stdout_result: std::io::Result<()>,
    stderr_result: std::io::Result<()>,
) -> Result<()> {
    match (stdout_result, stderr_result) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(out), Err(err)) => Err(Error::process_stream_failed(
            exe,
            format!("scan stdout: {}, scan stderr: {}", out, err),
        )),
        (Err(out), Ok(())) => Err(Error::process_stream_failed(
            exe,
            format!("scan stdout: {}", out),
        )),
        (Ok(()), Err(err)) => Err(Error::process_stream_failed(
            exe,
            format!("scan stderr: {}", err),
        )),
    }
}

/// Captured output from a buffered command execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CapturedOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    pub success: bool,
}

impl CapturedOutput {
    /// Diagnostic text for error reporting: stderr, or stdout when stderr is
    /// empty.
    pub fn diagnostic_text(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            stderr.to_string()
        } else {
            self.stdout.trim().to_string()
        }
    }
}

/// Run an executable to completion, capturing both streams.
///
/// A nonzero exit is not an error here; callers inspect `success` and decide
/// how to surface `diagnostic_text`.
pub fn run_buffered(exe: &str, args: &[String]) -> Result<CapturedOutput> {
    let output = Command::new(exe)
        .args(args)
        .output()
        .map_err(|e| Error::process_spawn_failed(exe, e.to_string()))?;

    Ok(CapturedOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn run_sh(
        script: &str,
        env: &[(String, String)],
        dir: Option<&Path>,
    ) -> (Result<()>, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = run_streamed("sh", &args(&["-c", script]), env, dir, &mut out, &mut err);
        (
            result,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn streams_stdout_lines_in_order() {
        let (result, out, err) = run_sh("printf 'one\\ntwo\\n'", &[], None);
        result.unwrap();
        assert_eq!(out, "one\ntwo\n");
        assert!(err.is_empty());
    }

    #[test]
    fn streams_stderr_to_its_own_sink() {
        let (result, out, err) = run_sh("echo oops >&2", &[], None);
        result.unwrap();
        assert!(out.is_empty());
        assert_eq!(err, "oops\n");
    }

    #[test]
    fn drains_large_output_on_both_streams_without_deadlock() {
        let (result, out, err) = run_sh("seq 1 20000; seq 1 20000 >&2", &[], None);
        result.unwrap();
        let out_lines: Vec<&str> = out.lines().collect();
        let err_lines: Vec<&str> = err.lines().collect();
        assert_eq!(out_lines.len(), 20000);
        assert_eq!(err_lines.len(), 20000);
        assert_eq!(out_lines[0], "1");
        assert_eq!(out_lines[19999], "20000");
        assert_eq!(err_lines[19999], "20000");
    }

    #[test]
    fn interleaved_writes_keep_per_stream_order() {
        let script = "i=1; while [ $i -le 200 ]; do echo out$i; echo err$i >&2; i=$((i+1)); done";
        let (result, out, err) = run_sh(script, &[], None);
        result.unwrap();
        let expected_out: Vec<String> = (1..=200).map(|i| format!("out{}", i)).collect();
        let expected_err: Vec<String> = (1..=200).map(|i| format!("err{}", i)).collect();
        assert_eq!(out.lines().collect::<Vec<_>>(), expected_out);
        assert_eq!(err.lines().collect::<Vec<_>>(), expected_err);
    }

    #[test]
    fn nonzero_exit_surfaces_after_streams_are_delivered() {
        let (result, out, _err) = run_sh("echo done; exit 3", &[], None);
        let err = result.unwrap_err();
        assert_eq!(err.code, ErrorCode::ProcessExitedNonzero);
        assert_eq!(err.details["exitCode"], 3);
        assert_eq!(out, "done\n");
    }

    #[test]
    fn env_entries_layer_over_inherited_environment() {
        let env = vec![("IMAGEPACK_TEST_VALUE".to_string(), "layered".to_string())];
        let (result, out, _err) = run_sh("printf '%s\\n' \"$IMAGEPACK_TEST_VALUE\"", &env, None);
        result.unwrap();
        assert_eq!(out, "layered\n");
    }

    #[test]
    fn working_directory_is_applied() {
        let dir = TempDir::new().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        let (result, out, _err) = run_sh("pwd", &[], Some(dir.path()));
        result.unwrap();
        assert_eq!(out.trim_end(), canonical.to_string_lossy());
    }

    #[test]
    fn missing_executable_is_a_spawn_failure() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = run_streamed(
            "imagepack-no-such-binary",
            &[],
            &[],
            None,
            &mut out,
            &mut err,
        );
        assert_eq!(result.unwrap_err().code, ErrorCode::ProcessSpawnFailed);
    }

    #[test]
    fn run_buffered_captures_both_streams() {
        let output = run_buffered("sh", &args(&["-c", "echo hello; echo warn >&2"])).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "warn\n");
    }

    #[test]
    fn run_buffered_reports_failure_without_erroring() {
        let output = run_buffered("sh", &args(&["-c", "echo why >&2; exit 1"])).unwrap();
        assert!(!output.success);
        assert_eq!(output.diagnostic_text(), "why");
    }

    #[test]
    fn diagnostic_text_falls_back_to_stdout() {
        let output = CapturedOutput {
            stdout: "stdout content\n".to_string(),
            stderr: String::new(),
            success: false,
        };
        assert_eq!(output.diagnostic_text(), "stdout content");
    }
}

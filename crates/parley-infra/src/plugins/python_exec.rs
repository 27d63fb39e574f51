//! `python_exec`: run model-written Python code in a subprocess.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use serde_json::{Value, json};
use tokio::process::Command;

use parley_core::dispatch::local::LocalFunction;
use parley_types::function::{FunctionDescriptor, PYTHON_EXEC};

/// Runs `{interpreter} -c {code}` inside `workdir`.
///
/// Output files are expected under `workdir/tmp`, which is created before
/// each run.
pub struct PythonExec {
    interpreter: String,
    workdir: PathBuf,
    timeout: Duration,
}

impl Default for PythonExec {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            workdir: PathBuf::from("."),
            timeout: Duration::from_secs(120),
        }
    }
}

impl PythonExec {
    pub fn new(interpreter: impl Into<String>, workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            workdir: workdir.into(),
            timeout,
        }
    }
}

/// Result payload of a successful run.
fn success_payload(stdout: &str) -> Value {
    json!({
        "status": "success",
        "output": stdout.trim_end(),
    })
}

/// Result payload of a failed run.
///
/// `description` is split off by the dispatcher and handed back to the
/// model as a user turn, asking it to fix the code.
fn error_payload(stderr: &str) -> Value {
    let error_info = stderr.trim_end();
    let error = error_info
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("unknown error")
        .trim();
    json!({
        "status": "error",
        "error": error,
        "error_info": error_info,
        "description": format!(
            "The code failed with: {error}\n\nAnalyze the cause of the error step by step, then fix the code and run it again."
        ),
    })
}

impl LocalFunction for PythonExec {
    fn describe(&self) -> FunctionDescriptor {
        FunctionDescriptor::new(
            PYTHON_EXEC,
            "Execute Python code and return what it prints. Save images and files to ./tmp and print their paths.",
            json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "The Python code to execute."
                    }
                },
                "required": ["code"]
            }),
        )
    }

    async fn invoke(&self, arguments: Value) -> anyhow::Result<Value> {
        let code = arguments
            .get("code")
            .and_then(Value::as_str)
            .context("missing string argument 'code'")?;

        tokio::fs::create_dir_all(self.workdir.join("tmp"))
            .await
            .with_context(|| format!("failed to create {}/tmp", self.workdir.display()))?;

        let child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(code)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start {}", self.interpreter))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.context("failed to collect python output")?,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "python_exec timed out");
                return Ok(error_payload(&format!(
                    "TimeoutError: execution exceeded {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() {
            tracing::debug!(bytes = output.stdout.len(), "python_exec succeeded");
            Ok(success_payload(&stdout))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(status = %output.status, "python_exec failed");
            Ok(error_payload(&stderr))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_error_payload_fields() {
        let stderr = "Traceback (most recent call last):\n  File \"<string>\", line 1, in <module>\nZeroDivisionError: division by zero\n";
        let payload = error_payload(stderr);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error"], "ZeroDivisionError: division by zero");
        assert!(payload["error_info"].as_str().unwrap().starts_with("Traceback"));
        assert!(payload["description"].as_str().unwrap().contains("ZeroDivisionError"));
    }

    #[test]
    fn test_describe_requires_code() {
        let descriptor = PythonExec::default().describe();
        assert_eq!(descriptor.name, "python_exec");
        assert_eq!(descriptor.parameters["required"][0], "code");
    }

    #[tokio::test]
    async fn test_missing_code_argument() {
        let err = PythonExec::default()
            .invoke(json!({"source": "print(1)"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("code"));
    }

    #[tokio::test]
    async fn test_runs_python_code() {
        if !python_available() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let exec = PythonExec::new("python3", tmp.path(), Duration::from_secs(30));

        let result = exec.invoke(json!({"code": "print(6 * 7)"})).await.unwrap();
        assert_eq!(result, json!({"status": "success", "output": "42"}));
        assert!(tmp.path().join("tmp").is_dir());

        let result = exec.invoke(json!({"code": "1/0"})).await.unwrap();
        assert_eq!(result["status"], "error");
        assert_eq!(result["error"], "ZeroDivisionError: division by zero");
    }

    #[tokio::test]
    async fn test_timeout_reports_error() {
        if !python_available() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let exec = PythonExec::new("python3", tmp.path(), Duration::from_millis(200));

        let result = exec
            .invoke(json!({"code": "import time\ntime.sleep(5)"}))
            .await
            .unwrap();
        assert_eq!(result["status"], "error");
        assert!(result["error"].as_str().unwrap().starts_with("TimeoutError"));
    }
}

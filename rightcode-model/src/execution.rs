/// Outcome of running a note's code on an execution worker.
///
/// When `success` is false the captured output is diagnostic only; callers
/// should not present it as the program's authoritative output.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExecutionResult {
    /// Whether the worker ran the code to completion without error.
    pub success: bool,
    /// Captured standard output (`output` on the wire).
    #[cfg_attr(feature = "serde", serde(rename = "output", default))]
    pub stdout: Option<String>,
    /// Captured standard error or the worker's failure message (`errors`).
    #[cfg_attr(feature = "serde", serde(rename = "errors", default))]
    pub stderr: Option<String>,
    /// Pipeline stage the worker reached, e.g. `security_check` or `execution`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub stage: Option<String>,
    /// Process exit code, when the code got as far as running.
    #[cfg_attr(feature = "serde", serde(default))]
    pub exit_code: Option<i32>,
    /// Wall-clock seconds spent by the worker.
    #[cfg_attr(feature = "serde", serde(default))]
    pub execution_time: Option<f64>,
    /// Language tag echoed back by the worker.
    #[cfg_attr(feature = "serde", serde(default))]
    pub language: Option<String>,
    /// Name of the worker that ran the job.
    #[cfg_attr(feature = "serde", serde(default))]
    pub worker: Option<String>,
}

impl ExecutionResult {
    /// Text worth showing to the user: stdout on success, stderr otherwise.
    pub fn display_output(&self) -> Option<&str> {
        if self.success {
            self.stdout.as_deref()
        } else {
            self.stderr.as_deref().or(self.stdout.as_deref())
        }
    }
}

//! The contract a job plugin implements.

/// Result of one job execution.
pub type JobResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A job that can run inside an isolated context.
///
/// The sandbox creates one instance with [`Default`], calls
/// [`execute`](JobPlugin::execute) once, and drops it.
pub trait JobPlugin: Default + 'static {
    /// Runs the job. An `Err` or a panic marks the run as failed.
    fn execute(&mut self) -> JobResult;
}

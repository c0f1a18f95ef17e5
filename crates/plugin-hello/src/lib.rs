//! Example job plugin.
//!
//! Prints a greeting each time it fires. In the sandbox's environment,
//! `HELLO_JOB_MESSAGE` replaces the greeting and `HELLO_JOB_FAIL` makes
//! the job fail after printing it.

use anyhow::bail;
use chrono::Utc;
use jobhost_plugin_sdk::prelude::*;

/// Environment variable that turns the job into a failing one.
pub const FAIL_ENV: &str = "HELLO_JOB_FAIL";

/// Environment variable holding a line to print instead of the greeting.
pub const MESSAGE_ENV: &str = "HELLO_JOB_MESSAGE";

/// Greets from inside the sandbox.
#[derive(Debug, Default)]
pub struct HelloJob {
    runs: u32,
}

impl HelloJob {
    fn run(&mut self) -> anyhow::Result<()> {
        self.runs += 1;
        match std::env::var(MESSAGE_ENV) {
            Ok(message) => println!("{message}"),
            Err(_) => println!("Hello from plugin_hello at {} (run {})", Utc::now().to_rfc3339(), self.runs),
        }
        if let Some(reason) = std::env::var_os(FAIL_ENV) {
            bail!("asked to fail: {}", reason.to_string_lossy());
        }
        Ok(())
    }
}

impl JobPlugin for HelloJob {
    fn execute(&mut self) -> JobResult {
        self.run().map_err(Into::into)
    }
}

export_job_plugins!(HelloJob);

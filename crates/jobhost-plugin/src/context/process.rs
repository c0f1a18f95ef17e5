//! Process-per-invocation contexts.
//!
//! Each context is a fresh `jobhost-sandbox` child with its own shadow
//! directory. Nothing is shared between two contexts except the read-only
//! settings held by [`ProcessContextManager`].

use std::collections::BTreeMap;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use jobhost_core::config::PluginConfig;
use jobhost_core::error::AppResult;

use super::{ContextHandle, Instantiation, Invocation, IsolatedContext, IsolatedContextManager, SandboxError};
use crate::sandbox::protocol::{
    ExportedType, FrameError, SandboxRequest, SandboxResponse, read_frame, write_frame,
};
use crate::sandbox::search_path::SearchPath;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Spawns one sandbox process per context.
#[derive(Debug, Clone)]
pub struct ProcessContextManager {
    sandbox_executable: PathBuf,
    base_path: PathBuf,
    shadow_root: Option<PathBuf>,
    shutdown_grace: Duration,
    env: BTreeMap<String, String>,
}

impl ProcessContextManager {
    /// Builds a manager from the plugin host settings.
    pub fn from_config(config: &PluginConfig) -> AppResult<Self> {
        Ok(Self {
            sandbox_executable: config.resolved_sandbox_executable()?,
            base_path: config.resolved_base_path()?,
            shadow_root: config.shadow_copy.then(|| config.resolved_shadow_root()),
            shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
            env: config.environment.clone(),
        })
    }

    /// Builds a manager with explicit paths and shadow copying disabled.
    pub fn new(sandbox_executable: impl Into<PathBuf>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            sandbox_executable: sandbox_executable.into(),
            base_path: base_path.into(),
            shadow_root: None,
            shutdown_grace: Duration::from_millis(500),
            env: BTreeMap::new(),
        }
    }

    /// Enables shadow copying under `root`.
    pub fn with_shadow_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.shadow_root = Some(root.into());
        self
    }

    /// Sets how long a sandbox may take to exit before it is killed.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Sets an environment variable for every sandbox, on top of the
    /// host's own environment.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sandbox executable this manager spawns.
    pub fn sandbox_executable(&self) -> &Path {
        &self.sandbox_executable
    }

    fn spawn(&self, name: &str, search_path: &SearchPath, shadow_dir: Option<&Path>) -> Result<Child, SandboxError> {
        let mut command = Command::new(&self.sandbox_executable);
        command
            .arg("--context")
            .arg(name)
            .arg("--base")
            .arg(search_path.base());
        if !search_path.private().as_os_str().is_empty() {
            command.arg("--private").arg(search_path.private());
        }
        match shadow_dir {
            Some(dir) => command.arg("--shadow-dir").arg(dir),
            None => command.arg("--no-shadow-copy"),
        };
        command
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        command.spawn().map_err(|e| SandboxError::Provision {
            context: name.to_string(),
            reason: format!(
                "cannot start '{}': {e}",
                self.sandbox_executable.display()
            ),
        })
    }
}

impl IsolatedContextManager for ProcessContextManager {
    fn create(&self, plugin_dir: &Path, module_name: &str) -> Result<ContextHandle, SandboxError> {
        let name = format!("{}_{}", Uuid::new_v4(), module_name);
        let search_path = SearchPath::for_plugin(&self.base_path, plugin_dir);
        let shadow_dir = self.shadow_root.as_ref().map(|root| root.join(&name));

        let mut child = self.spawn(&name, &search_path, shadow_dir.as_deref())?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SandboxError::Provision {
                context: name,
                reason: "sandbox stdio was not captured".to_string(),
            });
        };

        let mut context = ProcessContext {
            pid: child.id(),
            name,
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            shadow_dir,
            shutdown_grace: self.shutdown_grace,
        };

        if let Err(e) = context.await_ready() {
            if let Err(teardown) = context.teardown() {
                warn!(context = %context.name, error = %teardown, "Teardown after failed provisioning failed");
            }
            return Err(e);
        }

        debug!(
            context = %context.name,
            pid = context.pid,
            base = %search_path.base().display(),
            private = %search_path.private().display(),
            "Isolated context created"
        );
        Ok(ContextHandle::new(Box::new(context)))
    }
}

/// A live sandbox process.
#[derive(Debug)]
pub struct ProcessContext {
    name: String,
    pid: u32,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    shadow_dir: Option<PathBuf>,
    shutdown_grace: Duration,
}

impl ProcessContext {
    /// OS process id of the sandbox.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Private shadow directory, if shadow copying is enabled.
    pub fn shadow_dir(&self) -> Option<&Path> {
        self.shadow_dir.as_deref()
    }

    fn await_ready(&mut self) -> Result<(), SandboxError> {
        match self.read_response()? {
            SandboxResponse::Ready { context, .. } if context == self.name => Ok(()),
            other => Err(self.unexpected(&other)),
        }
    }

    fn request(&mut self, request: &SandboxRequest) -> Result<SandboxResponse, SandboxError> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.terminated());
        };
        match write_frame(stdin, request) {
            Ok(()) => {}
            Err(FrameError::Io(_)) => return Err(self.terminated()),
            Err(e) => return Err(e.into()),
        }
        self.read_response()
    }

    fn read_response(&mut self) -> Result<SandboxResponse, SandboxError> {
        let name = &self.name;
        let frame = read_frame(&mut self.stdout, |line| {
            debug!(context = %name, line, "Plugin output");
        });
        match frame {
            Ok(Some(SandboxResponse::Failed { failure })) => Err(SandboxError::Remote(failure)),
            Ok(Some(response)) => Ok(response),
            Ok(None) | Err(FrameError::Io(_)) => Err(self.terminated()),
            Err(e) => Err(e.into()),
        }
    }

    fn terminated(&mut self) -> SandboxError {
        // The pipe closed first; give the process a moment to be reaped.
        let status = match self.wait_for_exit(self.shutdown_grace) {
            Ok(Some(status)) => status.to_string(),
            Ok(None) => "still running".to_string(),
            Err(e) => format!("status unavailable: {e}"),
        };
        SandboxError::Terminated {
            context: self.name.clone(),
            status,
        }
    }

    fn unexpected(&self, response: &SandboxResponse) -> SandboxError {
        SandboxError::Protocol {
            context: self.name.clone(),
            message: format!("unexpected response {response:?}"),
        }
    }

    fn wait_for_exit(&mut self, grace: Duration) -> std::io::Result<Option<ExitStatus>> {
        let deadline = Instant::now() + grace;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

impl IsolatedContext for ProcessContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn discover_entry_type(&mut self, module_path: &Path) -> Result<String, SandboxError> {
        match self.request(&SandboxRequest::Discover {
            module_path: module_path.to_path_buf(),
        })? {
            SandboxResponse::Discovered { type_name } => Ok(type_name),
            other => Err(self.unexpected(&other)),
        }
    }

    fn inspect(&mut self, module_path: &Path) -> Result<Vec<ExportedType>, SandboxError> {
        match self.request(&SandboxRequest::Inspect {
            module_path: module_path.to_path_buf(),
        })? {
            SandboxResponse::Inspected { types } => Ok(types),
            other => Err(self.unexpected(&other)),
        }
    }

    fn instantiate(&mut self, type_name: &str) -> Result<Instantiation, SandboxError> {
        match self.request(&SandboxRequest::Instantiate {
            type_name: type_name.to_string(),
        })? {
            SandboxResponse::Instantiated { .. } => Ok(Instantiation::Created),
            SandboxResponse::InstanceMissing { .. } => Ok(Instantiation::Missing),
            other => Err(self.unexpected(&other)),
        }
    }

    fn invoke(&mut self) -> Result<Invocation, SandboxError> {
        match self.request(&SandboxRequest::Execute)? {
            SandboxResponse::Executed => Ok(Invocation::Completed),
            SandboxResponse::Faulted { message } => Ok(Invocation::Faulted(message)),
            other => Err(self.unexpected(&other)),
        }
    }

    fn teardown(&mut self) -> Result<(), SandboxError> {
        if let Some(mut stdin) = self.stdin.take() {
            // The sandbox may already be gone; a failed write is fine.
            let _ = write_frame(&mut stdin, &SandboxRequest::Shutdown);
        }

        let polled = self.wait_for_exit(self.shutdown_grace);
        self.reap_and_clean(polled)
    }
}

impl ProcessContext {
    /// Kills the sandbox unless `polled` saw it exit, then removes the
    /// shadow directory. A failed poll counts as still running.
    fn reap_and_clean(&mut self, polled: std::io::Result<Option<ExitStatus>>) -> Result<(), SandboxError> {
        let exited = match polled {
            Ok(status) => status.is_some(),
            Err(e) => {
                warn!(context = %self.name, pid = self.pid, error = %e, "Cannot poll sandbox exit status");
                false
            }
        };

        // Every step runs; the first failure is reported once all are done.
        let mut first_error: Option<std::io::Error> = None;
        if !exited {
            warn!(context = %self.name, pid = self.pid, "Sandbox did not exit in time, killing it");
            if let Err(e) = self.child.kill() {
                // Already reaped or gone.
                debug!(context = %self.name, error = %e, "Kill failed");
            }
            if let Err(e) = self.child.wait() {
                first_error.get_or_insert(e);
            }
        }

        if let Some(dir) = &self.shadow_dir {
            if dir.exists() {
                if let Err(e) = std::fs::remove_dir_all(dir) {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => {
                debug!(context = %self.name, "Isolated context destroyed");
                Ok(())
            }
        }
    }
}

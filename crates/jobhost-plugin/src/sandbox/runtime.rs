//! Request loop that runs inside a sandbox process.
//!
//! One runtime serves exactly one isolated context: it loads at most one
//! module, holds at most one instance, and releases both before exiting.

use std::io::{BufRead, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use super::protocol::{
    FrameError, RemoteFailure, SandboxRequest, SandboxResponse, read_frame, write_frame,
};
use super::search_path::SearchPath;
use super::shadow::ShadowCopy;
use crate::discovery::{TypeDiscoveryHelper, load_module};
use crate::ffi::module::{PluginInstance, PluginModule};

/// Startup parameters of a sandbox.
#[derive(Debug, Clone)]
pub struct SandboxSettings {
    /// Unique context name.
    pub context: String,
    /// Code-search path.
    pub search_path: SearchPath,
    /// Module staging policy.
    pub shadow: ShadowCopy,
}

/// State of one isolated context.
#[derive(Debug)]
pub struct SandboxRuntime {
    settings: SandboxSettings,
    // Field order matters: the instance drops before the module that made it.
    instance: Option<PluginInstance>,
    module: Option<PluginModule>,
}

impl SandboxRuntime {
    /// Creates an empty context.
    pub fn new(settings: SandboxSettings) -> Self {
        Self {
            settings,
            instance: None,
            module: None,
        }
    }

    /// Serves requests until `shutdown` or end of input.
    pub fn serve<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> Result<(), FrameError> {
        write_frame(
            &mut output,
            &SandboxResponse::Ready {
                context: self.settings.context.clone(),
                pid: std::process::id(),
            },
        )?;
        info!(context = %self.settings.context, "Sandbox ready");

        loop {
            let request = match read_frame::<_, SandboxRequest, _>(&mut input, |line| {
                warn!(line, "Ignoring non-frame input");
            }) {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!(context = %self.settings.context, "Host closed the request stream");
                    break;
                }
                Err(FrameError::Malformed(e)) => {
                    write_frame(
                        &mut output,
                        &SandboxResponse::Failed {
                            failure: RemoteFailure::BadRequest {
                                message: e.to_string(),
                            },
                        },
                    )?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if request == SandboxRequest::Shutdown {
                self.release();
                write_frame(&mut output, &SandboxResponse::Closed)?;
                break;
            }

            let response = self.handle(request);
            write_frame(&mut output, &response)?;
        }

        self.release();
        Ok(())
    }

    /// Handles one request.
    pub fn handle(&mut self, request: SandboxRequest) -> SandboxResponse {
        let result = match request {
            SandboxRequest::Discover { module_path } => self.discover(&module_path),
            SandboxRequest::Inspect { module_path } => self.inspect(&module_path),
            SandboxRequest::Instantiate { type_name } => self.instantiate(&type_name),
            SandboxRequest::Execute => self.execute(),
            SandboxRequest::Shutdown => {
                self.release();
                Ok(SandboxResponse::Closed)
            }
        };
        result.unwrap_or_else(|failure| SandboxResponse::Failed { failure })
    }

    fn discover(&mut self, module_path: &Path) -> Result<SandboxResponse, RemoteFailure> {
        let (staged, display) = self.stage(module_path)?;
        // SAFETY: this process is the isolated context.
        let helper = unsafe { TypeDiscoveryHelper::new(&staged, &display) }?;
        let type_name = helper.plugin_type_name().to_string();
        self.module = Some(helper.into_module());
        Ok(SandboxResponse::Discovered { type_name })
    }

    fn inspect(&mut self, module_path: &Path) -> Result<SandboxResponse, RemoteFailure> {
        let (staged, display) = self.stage(module_path)?;
        // SAFETY: this process is the isolated context.
        let module = unsafe { load_module(&staged, &display) }?;
        let types = module.exported_types();
        self.module = Some(module);
        Ok(SandboxResponse::Inspected { types })
    }

    fn instantiate(&mut self, type_name: &str) -> Result<SandboxResponse, RemoteFailure> {
        let module = self.module.as_ref().ok_or(RemoteFailure::NotLoaded)?;
        if self.instance.is_some() {
            return Err(RemoteFailure::BadRequest {
                message: "an instance already exists in this context".to_string(),
            });
        }
        match module.instantiate(type_name) {
            Some(instance) => {
                self.instance = Some(instance);
                Ok(SandboxResponse::Instantiated {
                    type_name: type_name.to_string(),
                })
            }
            None => Ok(SandboxResponse::InstanceMissing {
                type_name: type_name.to_string(),
            }),
        }
    }

    fn execute(&mut self) -> Result<SandboxResponse, RemoteFailure> {
        let instance = self.instance.as_mut().ok_or(RemoteFailure::NotInstantiated)?;
        info!(type_name = instance.type_name(), "Executing plugin");
        Ok(match instance.execute() {
            Ok(()) => SandboxResponse::Executed,
            Err(message) => SandboxResponse::Faulted { message },
        })
    }

    /// Resolves and stages a module; a context holds only one.
    fn stage(&self, module_path: &Path) -> Result<(std::path::PathBuf, String), RemoteFailure> {
        let display = module_path.display().to_string();
        if self.module.is_some() {
            return Err(RemoteFailure::BadRequest {
                message: "a module is already loaded in this context".to_string(),
            });
        }
        let resolved = self
            .settings
            .search_path
            .resolve(module_path)
            .ok_or_else(|| RemoteFailure::ModuleLoad {
                module: display.clone(),
                reason: "not found on the context search path".to_string(),
            })?;
        let staged = self
            .settings
            .shadow
            .stage(&resolved)
            .map_err(|e| RemoteFailure::ModuleLoad {
                module: display.clone(),
                reason: format!("shadow copy failed: {e}"),
            })?;
        Ok((staged, display))
    }

    /// Drops the instance, then the module.
    fn release(&mut self) {
        if let Some(instance) = self.instance.take() {
            debug!(type_name = instance.type_name(), "Releasing plugin instance");
        }
        if let Some(module) = self.module.take() {
            debug!(path = %module.path().display(), "Unloading plugin module");
        }
    }
}

//! Plugin execution host.
//!
//! [`PluginRunner::execute`] is what a plugin-kind job calls when its
//! trigger fires. It owns the whole invocation: validate the descriptor,
//! provision a context, discover, instantiate, invoke, report, tear down.
//!
//! Nothing a plugin does can make `execute` fail. The only errors that
//! escape are faults of the isolation machinery itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use jobhost_core::error::{AppError, AppResult};
use jobhost_core::events::EventBus;
use jobhost_core::types::{JobDataMap, PLUGIN_PATH_KEY};

use crate::context::{ContextHandle, Instantiation, Invocation, IsolatedContextManager, SandboxError};
use crate::reporter::{ExecutionOutcome, ResultReporter};

/// Runs plugin modules in isolated contexts.
#[derive(Debug, Clone)]
pub struct PluginRunner {
    contexts: Arc<dyn IsolatedContextManager>,
    reporter: ResultReporter,
}

impl PluginRunner {
    /// Creates a runner that provisions contexts from `contexts` and
    /// publishes outcomes on `bus`.
    pub fn new(contexts: Arc<dyn IsolatedContextManager>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            contexts,
            reporter: ResultReporter::new(bus),
        }
    }

    /// Executes the plugin named by the descriptor's `pluginPath`.
    ///
    /// Blocks until the plugin has finished and its context is gone.
    pub fn execute(&self, data: &JobDataMap) -> AppResult<()> {
        let Some(plugin_path) = data.plugin_path() else {
            error!(key = PLUGIN_PATH_KEY, "Job descriptor has no plugin path");
            return Ok(());
        };
        let path = Path::new(plugin_path);
        if !path.is_file() {
            error!(plugin_path, "plugin file '{plugin_path}' does not exist");
            return Ok(());
        }

        // The sandbox loads exactly the file checked above, whatever its
        // search path holds.
        let module_path = std::path::absolute(path)?;
        let module_name = module_name(&module_path);
        let plugin_dir = plugin_directory(&module_path)?;

        let mut handle = self.contexts.create(&plugin_dir, &module_name).map_err(|e| {
            error!(plugin_path, error = %e, "Failed to create isolated context");
            AppError::from(e)
        })?;

        let outcome = run_in_context(&mut handle, &module_path);
        if let Ok(Some(outcome)) = &outcome {
            self.reporter.report(outcome.clone());
        }

        handle.destroy().map_err(|e| {
            error!(context = %handle.name(), error = %e, "Failed to destroy isolated context");
            AppError::from(e)
        })?;

        match outcome {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(plugin_path, error = %e, "Isolated context failed during type discovery");
                Err(AppError::sandbox(e.to_string()))
            }
        }
    }
}

/// Drives one context from discovery to invocation.
///
/// `Ok(None)` means no entry type could be resolved and nothing ran.
fn run_in_context(handle: &mut ContextHandle, path: &Path) -> Result<Option<ExecutionOutcome>, SandboxError> {
    let name = handle.name().to_string();
    let Some(context) = handle.context() else {
        return Err(SandboxError::Protocol {
            context: name,
            message: "context was destroyed before use".to_string(),
        });
    };

    let type_name = match context.discover_entry_type(path) {
        Ok(type_name) => type_name,
        Err(SandboxError::Remote(failure)) if failure.is_discovery_failure() => {
            error!(plugin_path = %path.display(), error = %failure, "Failed to resolve plugin entry type");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let success = match context.instantiate(&type_name) {
        Ok(Instantiation::Created) => match context.invoke() {
            Ok(Invocation::Completed) => {
                info!(plugin_type_name = %type_name, context = %name, "Plugin executed successfully");
                true
            }
            Ok(Invocation::Faulted(cause)) => {
                error!(plugin_type_name = %type_name, cause = %cause, "Exception thrown in plugin execution");
                false
            }
            Err(e) => {
                error!(plugin_type_name = %type_name, error = %e, "Plugin execution crashed its context");
                false
            }
        },
        Ok(Instantiation::Missing) => {
            error!(plugin_type_name = %type_name, "Plugin instance of type '{type_name}' is null");
            false
        }
        Err(e) => {
            error!(plugin_type_name = %type_name, error = %e, "Plugin instantiation crashed its context");
            false
        }
    };

    Ok(Some(ExecutionOutcome::now(success, type_name)))
}

/// File name with the extension stripped.
pub fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Absolute directory containing the module.
pub fn plugin_directory(path: &Path) -> AppResult<PathBuf> {
    let absolute = std::path::absolute(path)?;
    match absolute.parent() {
        Some(dir) => Ok(dir.to_path_buf()),
        None => {
            warn!(plugin_path = %path.display(), "Plugin path has no parent directory");
            Ok(absolute)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::IsolatedContext;
    use crate::sandbox::protocol::{ExportedType, RemoteFailure};
    use chrono::Utc;
    use jobhost_core::events::CompletionEvent;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Debug, Clone)]
    enum Script {
        Succeed,
        Fault(&'static str),
        NoInstance,
        CrashOnInvoke,
        Discovery(RemoteFailure),
        HelperUnavailable,
    }

    #[derive(Debug, Default)]
    struct Counters {
        created: AtomicUsize,
        destroyed: AtomicUsize,
        discovered_from: Mutex<Vec<PathBuf>>,
    }

    #[derive(Debug)]
    struct FakeContext {
        name: String,
        module: String,
        script: Script,
        counters: Arc<Counters>,
        discovered: Option<String>,
    }

    impl IsolatedContext for FakeContext {
        fn name(&self) -> &str {
            &self.name
        }

        fn discover_entry_type(&mut self, module_path: &Path) -> Result<String, SandboxError> {
            self.counters.discovered_from.lock().unwrap().push(module_path.to_path_buf());
            match &self.script {
                Script::Discovery(failure) => Err(SandboxError::Remote(failure.clone())),
                Script::HelperUnavailable => Err(SandboxError::Terminated {
                    context: self.name.clone(),
                    status: "exit status: 101".to_string(),
                }),
                _ => {
                    let type_name = format!("{}::Job", self.module);
                    self.discovered = Some(type_name.clone());
                    Ok(type_name)
                }
            }
        }

        fn inspect(&mut self, _: &Path) -> Result<Vec<ExportedType>, SandboxError> {
            Ok(Vec::new())
        }

        fn instantiate(&mut self, type_name: &str) -> Result<Instantiation, SandboxError> {
            assert_eq!(self.discovered.as_deref(), Some(type_name));
            Ok(match self.script {
                Script::NoInstance => Instantiation::Missing,
                _ => Instantiation::Created,
            })
        }

        fn invoke(&mut self) -> Result<Invocation, SandboxError> {
            match &self.script {
                Script::Fault(cause) => Ok(Invocation::Faulted(cause.to_string())),
                Script::CrashOnInvoke => Err(SandboxError::Terminated {
                    context: self.name.clone(),
                    status: "signal: 11".to_string(),
                }),
                _ => Ok(Invocation::Completed),
            }
        }

        fn teardown(&mut self) -> Result<(), SandboxError> {
            self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct FakeManager {
        scripts: HashMap<String, Script>,
        counters: Arc<Counters>,
    }

    impl FakeManager {
        fn with(mut self, module: &str, script: Script) -> Self {
            self.scripts.insert(module.to_string(), script);
            self
        }
    }

    impl IsolatedContextManager for FakeManager {
        fn create(&self, _: &Path, module_name: &str) -> Result<ContextHandle, SandboxError> {
            self.counters.created.fetch_add(1, Ordering::SeqCst);
            Ok(ContextHandle::new(Box::new(FakeContext {
                name: format!("{}_{module_name}", uuid::Uuid::new_v4()),
                module: module_name.to_string(),
                script: self.scripts.get(module_name).cloned().unwrap_or(Script::Succeed),
                counters: self.counters.clone(),
                discovered: None,
            })))
        }
    }

    #[derive(Debug, Default)]
    struct RecordingBus {
        events: Mutex<Vec<CompletionEvent>>,
    }

    impl EventBus for RecordingBus {
        fn publish(&self, event: CompletionEvent) -> Result<(), AppError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for ErrorCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _: tracing_subscriber::layer::Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct Harness {
        runner: PluginRunner,
        counters: Arc<Counters>,
        bus: Arc<RecordingBus>,
        dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(manager: FakeManager) -> Self {
            let counters = manager.counters.clone();
            let bus = Arc::new(RecordingBus::default());
            Self {
                runner: PluginRunner::new(Arc::new(manager), bus.clone()),
                counters,
                bus,
                dir: tempfile::tempdir().expect("tempdir"),
            }
        }

        /// Creates a plugin file and returns a descriptor pointing at it.
        fn plugin(&self, file_name: &str) -> JobDataMap {
            let path = self.dir.path().join(file_name);
            std::fs::write(&path, b"module").unwrap();
            JobDataMap::new().with(PLUGIN_PATH_KEY, path.to_string_lossy().into_owned())
        }

        fn events(&self) -> Vec<CompletionEvent> {
            self.bus.events.lock().unwrap().clone()
        }

        fn created(&self) -> usize {
            self.counters.created.load(Ordering::SeqCst)
        }

        fn destroyed(&self) -> usize {
            self.counters.destroyed.load(Ordering::SeqCst)
        }
    }

    fn count_errors<T>(f: impl FnOnce() -> T) -> (T, usize) {
        let counter = ErrorCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, counter.0.load(Ordering::SeqCst))
    }

    #[test]
    fn test_module_name_strips_extension() {
        assert_eq!(module_name(Path::new("/opt/plugins/libreport.so")), "libreport");
        assert_eq!(module_name(Path::new("report.dll")), "report");
        assert_eq!(module_name(Path::new("noext")), "noext");
    }

    #[test]
    fn test_missing_plugin_file() {
        let harness = Harness::new(FakeManager::default());
        let data = JobDataMap::new().with(
            PLUGIN_PATH_KEY,
            harness.dir.path().join("libgone.so").to_string_lossy().into_owned(),
        );

        let (result, errors) = count_errors(|| harness.runner.execute(&data));

        assert!(result.is_ok());
        assert_eq!(errors, 1);
        assert_eq!(harness.created(), 0);
        assert!(harness.events().is_empty());
    }

    #[test]
    fn test_descriptor_without_plugin_path() {
        let harness = Harness::new(FakeManager::default());
        let (result, errors) = count_errors(|| harness.runner.execute(&JobDataMap::new().with("other", 1)));
        assert!(result.is_ok());
        assert_eq!(errors, 1);
        assert_eq!(harness.created(), 0);
    }

    #[test]
    fn test_relative_path_reaches_sandbox_absolute() {
        let harness = Harness::new(FakeManager::default());
        // Unit tests run from the package root.
        let data = JobDataMap::new().with(PLUGIN_PATH_KEY, "Cargo.toml");

        harness.runner.execute(&data).unwrap();

        let discovered = harness.counters.discovered_from.lock().unwrap().clone();
        assert_eq!(discovered, vec![std::path::absolute("Cargo.toml").unwrap()]);
        assert!(discovered[0].is_absolute());
        assert_eq!(harness.events()[0].job_type, "Cargo::Job");
    }

    #[test]
    fn test_successful_execution() {
        let harness = Harness::new(FakeManager::default());
        let data = harness.plugin("libreport.so");
        let before = Utc::now();

        harness.runner.execute(&data).unwrap();

        let events = harness.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].success);
        assert_eq!(events[0].job_type, "libreport::Job");
        assert!(events[0].timestamp >= before && events[0].timestamp <= Utc::now());
        assert_eq!((harness.created(), harness.destroyed()), (1, 1));
    }

    #[test]
    fn test_fault_is_contained() {
        let harness = Harness::new(FakeManager::default().with("libfails", Script::Fault("disk full")));
        let data = harness.plugin("libfails.so");

        let (result, errors) = count_errors(|| harness.runner.execute(&data));

        assert!(result.is_ok());
        assert_eq!(errors, 1);
        let events = harness.events();
        assert_eq!(events.len(), 1);
        assert!(!events[0].success);
        assert_eq!(events[0].job_type, "libfails::Job");
        assert_eq!((harness.created(), harness.destroyed()), (1, 1));
    }

    #[test]
    fn test_crash_during_invoke_is_a_failed_outcome() {
        let harness = Harness::new(FakeManager::default().with("libcrash", Script::CrashOnInvoke));
        harness.runner.execute(&harness.plugin("libcrash.so")).unwrap();

        let events = harness.events();
        assert_eq!(events.len(), 1);
        assert!(!events[0].success);
        assert_eq!(harness.destroyed(), 1);
    }

    #[test]
    fn test_missing_instance() {
        let harness = Harness::new(FakeManager::default().with("libnull", Script::NoInstance));
        let data = harness.plugin("libnull.so");

        let (result, errors) = count_errors(|| harness.runner.execute(&data));

        assert!(result.is_ok());
        assert_eq!(errors, 1);
        let events = harness.events();
        assert_eq!(events.len(), 1);
        assert!(!events[0].success);
        assert_eq!((harness.created(), harness.destroyed()), (1, 1));
    }

    #[test]
    fn test_discovery_failure_publishes_nothing() {
        let harness = Harness::new(
            FakeManager::default()
                .with(
                    "libnone",
                    Script::Discovery(RemoteFailure::NoEntryType {
                        module: "libnone.so".to_string(),
                    }),
                )
                .with(
                    "libtwo",
                    Script::Discovery(RemoteFailure::AmbiguousEntryType {
                        module: "libtwo.so".to_string(),
                        candidates: vec!["a::A".to_string(), "a::B".to_string()],
                    }),
                ),
        );

        harness.runner.execute(&harness.plugin("libnone.so")).unwrap();
        harness.runner.execute(&harness.plugin("libtwo.so")).unwrap();

        assert!(harness.events().is_empty());
        assert_eq!((harness.created(), harness.destroyed()), (2, 2));
    }

    #[test]
    fn test_helper_unavailable_propagates_after_teardown() {
        let harness = Harness::new(FakeManager::default().with("libboom", Script::HelperUnavailable));

        let err = harness.runner.execute(&harness.plugin("libboom.so")).unwrap_err();

        assert!(err.is_sandbox_fault());
        assert!(harness.events().is_empty());
        assert_eq!((harness.created(), harness.destroyed()), (1, 1));
    }

    #[test]
    fn test_concurrent_invocations_are_independent() {
        let harness = Harness::new(FakeManager::default().with("libfails", Script::Fault("boom")));
        let good = harness.plugin("libgood.so");
        let bad = harness.plugin("libfails.so");

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| harness.runner.execute(&good).unwrap());
                scope.spawn(|| harness.runner.execute(&bad).unwrap());
            }
        });

        let events = harness.events();
        assert_eq!(events.len(), 16);
        for event in &events {
            match event.job_type.as_str() {
                "libgood::Job" => assert!(event.success),
                "libfails::Job" => assert!(!event.success),
                other => panic!("unexpected type {other}"),
            }
        }
        assert_eq!((harness.created(), harness.destroyed()), (16, 16));
    }
}

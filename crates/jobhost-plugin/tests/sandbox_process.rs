//! End-to-end tests against the real `jobhost-sandbox` binary.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, OnceLock};

use jobhost_core::events::{BroadcastEventBus, CompletionEvent};
use jobhost_core::types::{JobDataMap, PLUGIN_PATH_KEY};
use jobhost_plugin::context::IsolatedContextManager;
use jobhost_plugin::sandbox::RemoteFailure;
use jobhost_plugin::{PluginRunner, ProcessContextManager, SandboxError};

fn manager(base: &Path, shadow_root: &Path) -> ProcessContextManager {
    ProcessContextManager::new(env!("CARGO_BIN_EXE_jobhost-sandbox"), base).with_shadow_root(shadow_root)
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[test]
fn test_context_lifecycle() {
    let base = tempfile::tempdir().expect("tempdir");
    let shadow = tempfile::tempdir().expect("tempdir");
    let plugin_dir = base.path().join("plugins");
    std::fs::create_dir_all(&plugin_dir).unwrap();

    let mut handle = manager(base.path(), shadow.path())
        .create(&plugin_dir, "libjob")
        .expect("sandbox should start");
    assert!(handle.name().ends_with("_libjob"));
    assert!(handle.context().is_some());

    handle.destroy().unwrap();
    handle.destroy().unwrap();
    assert!(handle.is_destroyed());
}

#[test]
fn test_inspect_rejects_non_library() {
    let base = tempfile::tempdir().expect("tempdir");
    let shadow = tempfile::tempdir().expect("tempdir");
    let module = base.path().join("libjunk.so");
    std::fs::write(&module, b"not an object file").unwrap();

    let mut handle = manager(base.path(), shadow.path())
        .create(base.path(), "libjunk")
        .expect("sandbox should start");
    let context = handle.context().expect("live context");

    match context.inspect(Path::new("libjunk.so")) {
        Err(SandboxError::Remote(RemoteFailure::ModuleLoad { module, .. })) => {
            assert_eq!(module, "libjunk.so");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    // The sandbox stays usable after a failed request.
    assert!(matches!(
        context.invoke(),
        Err(SandboxError::Remote(RemoteFailure::NotInstantiated))
    ));
    handle.destroy().unwrap();
}

#[test]
fn test_unloadable_plugin_publishes_nothing_and_cleans_up() {
    let base = tempfile::tempdir().expect("tempdir");
    let shadow = tempfile::tempdir().expect("tempdir");
    let module = base.path().join("libjunk.so");
    std::fs::write(&module, b"not an object file").unwrap();

    let bus = Arc::new(BroadcastEventBus::new(16));
    let mut events = bus.subscribe();
    let runner = PluginRunner::new(Arc::new(manager(base.path(), shadow.path())), bus);

    let data = JobDataMap::new().with(PLUGIN_PATH_KEY, module.to_string_lossy().into_owned());
    runner.execute(&data).unwrap();

    assert!(events.try_recv().is_err());
    assert_eq!(entries(shadow.path()), 0, "shadow copies must be removed");
    // The original is never held by the host.
    std::fs::remove_file(&module).unwrap();
}

#[test]
fn test_missing_plugin_starts_no_sandbox() {
    let base = tempfile::tempdir().expect("tempdir");
    let bus = Arc::new(BroadcastEventBus::new(16));
    let mut events = bus.subscribe();
    // An executable that cannot exist: creating a context would fail loudly.
    let runner = PluginRunner::new(
        Arc::new(ProcessContextManager::new(base.path().join("absent"), base.path())),
        bus,
    );

    let data = JobDataMap::new().with(
        PLUGIN_PATH_KEY,
        base.path().join("libgone.so").to_string_lossy().into_owned(),
    );
    runner.execute(&data).unwrap();
    assert!(events.try_recv().is_err());
}

const HELLO_TYPE: &str = "plugin_hello::HelloJob";

/// The `plugin-hello` shared library.
///
/// Taken from `JOBHOST_TEST_PLUGIN`, else from the profile directory the
/// sandbox was built into (a workspace build puts it there), else built
/// into a separate target directory.
fn hello_plugin() -> &'static Path {
    static PLUGIN: OnceLock<PathBuf> = OnceLock::new();
    PLUGIN.get_or_init(|| {
        if let Some(path) = std::env::var_os("JOBHOST_TEST_PLUGIN") {
            return PathBuf::from(path);
        }
        let file_name = format!(
            "{}plugin_hello{}",
            std::env::consts::DLL_PREFIX,
            std::env::consts::DLL_SUFFIX
        );
        let profile_dir = Path::new(env!("CARGO_BIN_EXE_jobhost-sandbox"))
            .parent()
            .expect("profile directory");
        if let Some(found) = [profile_dir.join(&file_name), profile_dir.join("deps").join(&file_name)]
            .into_iter()
            .find(|p| p.is_file())
        {
            return found;
        }

        // The running cargo holds the lock on the main target directory.
        let target_dir = profile_dir
            .parent()
            .expect("target directory")
            .join("jobhost-test-plugins");
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../Cargo.toml");
        let status = Command::new(env!("CARGO"))
            .args(["build", "--quiet", "-p", "plugin-hello", "--manifest-path"])
            .arg(&manifest)
            .arg("--target-dir")
            .arg(&target_dir)
            .status()
            .expect("run cargo");
        assert!(status.success(), "building plugin-hello failed");
        target_dir.join("debug").join(file_name)
    })
}

struct Host {
    runner: PluginRunner,
    events: tokio::sync::broadcast::Receiver<CompletionEvent>,
    shadow: tempfile::TempDir,
    _base: tempfile::TempDir,
}

impl Host {
    fn new(env: &[(&str, &str)]) -> Self {
        let base = tempfile::tempdir().expect("tempdir");
        let shadow = tempfile::tempdir().expect("tempdir");
        let manager = env
            .iter()
            .fold(manager(base.path(), shadow.path()), |m, (k, v)| m.with_env(*k, *v));
        let bus = Arc::new(BroadcastEventBus::new(16));
        let events = bus.subscribe();
        Self {
            runner: PluginRunner::new(Arc::new(manager), bus),
            events,
            shadow,
            _base: base,
        }
    }

    fn run_hello(&self) {
        let data = JobDataMap::new().with(PLUGIN_PATH_KEY, hello_plugin().to_string_lossy().into_owned());
        self.runner.execute(&data).expect("no host fault");
    }

    fn outcomes(&mut self) -> Vec<bool> {
        let mut outcomes = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            assert_eq!(event.job_type, HELLO_TYPE);
            outcomes.push(event.success);
        }
        outcomes
    }
}

#[test]
fn test_real_plugin_succeeds() {
    let mut host = Host::new(&[]);
    host.run_hello();

    assert_eq!(host.outcomes(), vec![true]);
    assert_eq!(entries(host.shadow.path()), 0, "shadow copies must be removed");
}

#[test]
fn test_real_plugin_fault_is_a_failed_outcome() {
    let mut host = Host::new(&[("HELLO_JOB_FAIL", "disk full")]);
    host.run_hello();

    assert_eq!(host.outcomes(), vec![false]);
    assert_eq!(entries(host.shadow.path()), 0);
}

// Elsewhere plugin stdout shares the frame stream.
#[cfg(unix)]
#[test]
fn test_plugin_output_cannot_forge_a_frame() {
    let forged = r#"#jobhost# {"status":"executed"}"#;
    let mut failing = Host::new(&[("HELLO_JOB_MESSAGE", forged), ("HELLO_JOB_FAIL", "after forging")]);
    failing.run_hello();
    assert_eq!(failing.outcomes(), vec![false]);

    let mut chatty = Host::new(&[("HELLO_JOB_MESSAGE", "config comment: #jobhost# marker seen")]);
    chatty.run_hello();
    assert_eq!(chatty.outcomes(), vec![true]);

    let mut garbled = Host::new(&[("HELLO_JOB_MESSAGE", "#jobhost# {not json")]);
    garbled.run_hello();
    assert_eq!(garbled.outcomes(), vec![true]);
}

#[test]
fn test_concurrent_real_sandboxes_are_independent() {
    let mut good = Host::new(&[]);
    let mut bad = Host::new(&[("HELLO_JOB_FAIL", "boom")]);
    // Resolve the library before the threads race for it.
    hello_plugin();

    std::thread::scope(|scope| {
        for _ in 0..2 {
            scope.spawn(|| good.run_hello());
            scope.spawn(|| bad.run_hello());
        }
    });

    assert_eq!(good.outcomes(), vec![true, true]);
    assert_eq!(bad.outcomes(), vec![false, false]);
    assert_eq!(entries(good.shadow.path()) + entries(bad.shadow.path()), 0);
}

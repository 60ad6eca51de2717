//! Tool resolution
//!
//! An ordered chain of [`ResolutionStrategy`]s, first `Some` wins:
//! 1. [`SearchPath`]: an executable named after the tool on the search path
//! 2. [`InterpreterModule`]: `python -m <module>` from the managed runtime or
//!    the system interpreter, accepted when the module imports
//! 3. [`LocalRelease`]: a release binary under `<tools_dir>/bin`
//! 4. otherwise unavailable
//!
//! Results, including unavailability, are cached per tool until
//! [`ToolResolver::invalidate`].

use super::{ResolvedInvocation, ToolId};
use async_trait::async_trait;
use osint_common::config::AppConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(600);

/// One way of locating a tool
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, tool: ToolId) -> Option<ResolvedInvocation>;
}

/// Caching front for the strategy chain
pub struct ToolResolver {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    cache: Mutex<HashMap<ToolId, ResolvedInvocation>>,
}

impl ToolResolver {
    pub fn new(strategies: Vec<Box<dyn ResolutionStrategy>>) -> Self {
        Self {
            strategies,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Default chain for the configured directories
    pub fn from_config(config: &AppConfig) -> Self {
        let tools_dir = config.tools_dir();
        let search_path = SearchPath::from_env(&config.tools.extra_search_paths);
        let interpreter = InterpreterModule::new(
            tools_dir.join("venv"),
            config.tools.bootstrap_runtime,
        );
        let release = LocalRelease::new(tools_dir.join("bin"));

        Self::new(vec![
            Box::new(search_path),
            Box::new(interpreter),
            Box::new(release),
        ])
    }

    /// Resolve a tool; never fails, `available = false` means skip it
    pub async fn resolve(&self, tool: ToolId) -> ResolvedInvocation {
        if let Some(cached) = self.cached(tool) {
            return cached;
        }

        let mut resolved = ResolvedInvocation::unavailable();
        for strategy in &self.strategies {
            if let Some(invocation) = strategy.resolve(tool).await {
                debug!(
                    tool = %tool,
                    strategy = strategy.name(),
                    executable = %invocation.executable.display(),
                    "Tool resolved"
                );
                resolved = invocation;
                break;
            }
        }

        if !resolved.available {
            debug!(tool = %tool, "Tool unavailable");
        }

        self.cache().insert(tool, resolved.clone());
        resolved
    }

    /// Forget every cached resolution
    pub fn invalidate(&self) {
        self.cache().clear();
    }

    fn cached(&self, tool: ToolId) -> Option<ResolvedInvocation> {
        self.cache().get(&tool).cloned()
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<ToolId, ResolvedInvocation>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Executable lookup over a list of directories
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// `PATH`, then `extra`, then the usual user-local bin directories
    pub fn from_env(extra: &[PathBuf]) -> Self {
        let mut entries: Vec<PathBuf> = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();
        entries.extend(extra.iter().cloned());
        if let Some(home) = dirs::home_dir() {
            entries.push(home.join(".local").join("bin"));
        }
        entries.push(PathBuf::from("/usr/local/bin"));
        entries.dedup();
        Self { dirs: entries }
    }

    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .flat_map(|dir| executable_names(name).into_iter().map(move |n| dir.join(n)))
            .find(|candidate| is_executable(candidate))
    }
}

#[async_trait]
impl ResolutionStrategy for SearchPath {
    fn name(&self) -> &'static str {
        "search_path"
    }

    async fn resolve(&self, tool: ToolId) -> Option<ResolvedInvocation> {
        self.find(tool.name()).map(ResolvedInvocation::direct)
    }
}

/// `python -m <module>` through the managed runtime or a system interpreter
pub struct InterpreterModule {
    venv_dir: PathBuf,
    system_interpreters: Vec<PathBuf>,
    bootstrap: bool,
    bootstrap_lock: tokio::sync::Mutex<()>,
}

impl InterpreterModule {
    pub fn new(venv_dir: PathBuf, bootstrap: bool) -> Self {
        Self {
            venv_dir,
            system_interpreters: vec![PathBuf::from("python3"), PathBuf::from("python")],
            bootstrap,
            bootstrap_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_system_interpreters(mut self, interpreters: Vec<PathBuf>) -> Self {
        self.system_interpreters = interpreters;
        self
    }

    fn venv_python(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_dir.join("Scripts").join("python.exe")
        } else {
            self.venv_dir.join("bin").join("python")
        }
    }

    /// Create the managed runtime and install the tool's package into it
    async fn bootstrap_runtime(&self, tool: ToolId) {
        let Some(package) = tool.pip_package() else {
            return;
        };
        let _guard = self.bootstrap_lock.lock().await;
        let python = self.venv_python();

        if !python.exists() {
            info!(venv = %self.venv_dir.display(), "Creating managed python runtime");
            if let Some(parent) = self.venv_dir.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    warn!(error = %e, "Failed to create tools directory");
                    return;
                }
            }
            let created = run_quietly(
                Command::new("python3").arg("-m").arg("venv").arg(&self.venv_dir),
                BOOTSTRAP_TIMEOUT,
            )
            .await;
            if !created {
                warn!(venv = %self.venv_dir.display(), "Failed to create managed python runtime");
                return;
            }
        }

        // Another request may have installed it while we waited on the lock
        for module in tool.python_modules() {
            if module_importable(&python, module).await {
                return;
            }
        }

        info!(tool = %tool, package, "Installing tool into managed runtime");
        let installed = run_quietly(
            Command::new(&python)
                .args(["-m", "pip", "install", "--quiet", package]),
            BOOTSTRAP_TIMEOUT,
        )
        .await;
        if !installed {
            warn!(tool = %tool, package, "Failed to install tool into managed runtime");
        }
    }
}

#[async_trait]
impl ResolutionStrategy for InterpreterModule {
    fn name(&self) -> &'static str {
        "interpreter_module"
    }

    async fn resolve(&self, tool: ToolId) -> Option<ResolvedInvocation> {
        if tool.python_modules().is_empty() {
            return None;
        }

        if self.bootstrap {
            self.bootstrap_runtime(tool).await;
        }

        let venv_python = self.venv_python();
        let mut candidates = Vec::new();
        if venv_python.exists() {
            candidates.push(venv_python);
        }
        candidates.extend(self.system_interpreters.iter().cloned());

        for python in candidates {
            for module in tool.python_modules() {
                if module_importable(&python, module).await {
                    return Some(ResolvedInvocation::python_module(python, module));
                }
            }
        }
        None
    }
}

/// Standalone release binary fetched into the tools directory
pub struct LocalRelease {
    bin_dir: PathBuf,
}

impl LocalRelease {
    pub fn new(bin_dir: PathBuf) -> Self {
        Self { bin_dir }
    }
}

#[async_trait]
impl ResolutionStrategy for LocalRelease {
    fn name(&self) -> &'static str {
        "local_release"
    }

    async fn resolve(&self, tool: ToolId) -> Option<ResolvedInvocation> {
        if !tool.has_local_release() {
            return None;
        }
        executable_names(tool.name())
            .into_iter()
            .map(|n| self.bin_dir.join(n))
            .find(|candidate| is_executable(candidate))
            .map(ResolvedInvocation::direct)
    }
}

/// `<python> -c "import <module>"` exits 0
async fn module_importable(python: &Path, module: &str) -> bool {
    run_quietly(
        Command::new(python).arg("-c").arg(format!("import {}", module)),
        PROBE_TIMEOUT,
    )
    .await
}

async fn run_quietly(command: &mut Command, limit: Duration) -> bool {
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(limit, status).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(_)) => false,
        Err(_) => {
            debug!(limit = ?limit, "Probe command timed out");
            false
        }
    }
}

fn executable_names(name: &str) -> Vec<String> {
    if cfg!(windows) {
        vec![format!("{}.exe", name), name.to_string()]
    } else {
        vec![name.to_string()]
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

//! In-memory sandbox service for tests.
//!
//! Records every remote call in order and lets tests inject faults at each
//! step of the lifecycle without a network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use super::{RemoteSandbox, RunOutput, SandboxError, SandboxService, TemplateInfo};

type CallLog = Arc<Mutex<Vec<String>>>;

/// Kind of error an injected fault produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    NotFound,
    Timeout,
    Api,
}

impl Fault {
    fn error(self, resource: &str) -> SandboxError {
        match self {
            Self::NotFound => SandboxError::not_found(resource),
            Self::Timeout => SandboxError::timeout(Duration::from_secs(1)),
            Self::Api => SandboxError::api(503, format!("{resource} unavailable")),
        }
    }
}

/// One fake sandbox: a file map plus scripted command results.
pub(crate) struct MemorySandbox {
    name: String,
    calls: CallLog,
    files: Mutex<HashMap<String, Vec<u8>>>,
    commands: HashMap<String, RunOutput>,
    probe_exit_code: i64,
    run_fault: Option<Fault>,
    read_fault: Option<String>,
}

impl MemorySandbox {
    /// Creates a standalone sandbox with its own call log.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Arc::default(),
            files: Mutex::default(),
            commands: HashMap::new(),
            probe_exit_code: 0,
            run_fault: None,
            read_fault: None,
        }
    }

    /// Scripts the output of an exact command line.
    pub fn with_command(mut self, command: &str, output: RunOutput) -> Self {
        self.commands.insert(command.to_string(), output);
        self
    }

    /// Makes every `run` fail.
    pub fn with_run_fault(mut self, fault: Fault) -> Self {
        self.run_fault = Some(fault);
        self
    }

    /// Makes reads of `path` fail.
    pub fn with_read_fault(mut self, path: &str) -> Self {
        self.read_fault = Some(path.to_string());
        self
    }

    /// Seeds a file.
    pub fn put_file(&self, path: &str, content: &[u8]) {
        self.files.lock().insert(path.to_string(), content.to_vec());
    }

    /// Returns a file's current content.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    /// Answers commands that have no scripted output.
    fn fallback(&self, command: &str) -> RunOutput {
        if command == "echo ready" {
            return RunOutput {
                stdout: "ready\n".to_string(),
                stderr: String::new(),
                exit_code: self.probe_exit_code,
            };
        }

        let words = shell_words::split(command).unwrap_or_default();
        if let [test, flag, path] = words.as_slice() {
            if test == "test" && flag == "-e" {
                let exists = self.files.lock().contains_key(path.as_str());
                return RunOutput {
                    exit_code: i64::from(!exists),
                    ..RunOutput::default()
                };
            }
        }

        RunOutput {
            stdout: String::new(),
            stderr: format!("sh: {command}: command not found"),
            exit_code: 127,
        }
    }
}

#[async_trait]
impl RemoteSandbox for MemorySandbox {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, command: &str, timeout: Duration) -> Result<RunOutput, SandboxError> {
        self.record(format!("run {} {} {}", self.name, command, timeout.as_secs()));
        if let Some(fault) = self.run_fault {
            return Err(fault.error(&format!("sandbox {}", self.name)));
        }

        Ok(self
            .commands
            .get(command)
            .cloned()
            .unwrap_or_else(|| self.fallback(command)))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, SandboxError> {
        self.record(format!("read {} {}", self.name, path));
        if self.read_fault.as_deref() == Some(path) {
            return Err(Fault::Api.error(&format!("file {path}")));
        }

        self.file(path)
            .ok_or_else(|| SandboxError::not_found(format!("file {path}")))
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<(), SandboxError> {
        self.record(format!("write {} {}", self.name, path));
        self.put_file(path, content);
        Ok(())
    }
}

#[derive(Default)]
struct Registry {
    templates: HashSet<String>,
    sandboxes: HashMap<String, Arc<MemorySandbox>>,
    created: usize,
}

/// Fake sandbox service handing out [`MemorySandbox`]es named `sb-1`, `sb-2`, ...
#[derive(Default)]
pub(crate) struct MemorySandboxService {
    calls: CallLog,
    registry: Mutex<Registry>,
    commands: HashMap<String, RunOutput>,
    probe_exit_code: i64,
    lookup_fault: Option<Fault>,
    create_template_fault: Option<Fault>,
    create_sandbox_fault: Option<Fault>,
    delete_fault: Option<Fault>,
}

impl MemorySandboxService {
    /// Creates a service with no templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an existing template.
    pub fn with_template(self, name: &str) -> Self {
        self.registry.lock().templates.insert(name.to_string());
        self
    }

    /// Scripts a command result for every sandbox created afterwards.
    pub fn with_command(mut self, command: &str, output: RunOutput) -> Self {
        self.commands.insert(command.to_string(), output);
        self
    }

    /// Sets the exit code of the `echo ready` probe.
    pub fn with_probe_exit_code(mut self, exit_code: i64) -> Self {
        self.probe_exit_code = exit_code;
        self
    }

    /// Makes `get_template` fail regardless of registered templates.
    pub fn with_lookup_fault(mut self, fault: Fault) -> Self {
        self.lookup_fault = Some(fault);
        self
    }

    /// Makes `create_template` fail.
    pub fn with_create_template_fault(mut self, fault: Fault) -> Self {
        self.create_template_fault = Some(fault);
        self
    }

    /// Makes `create_sandbox` fail.
    pub fn with_create_sandbox_fault(mut self, fault: Fault) -> Self {
        self.create_sandbox_fault = Some(fault);
        self
    }

    /// Makes `delete_sandbox` fail.
    pub fn with_delete_fault(mut self, fault: Fault) -> Self {
        self.delete_fault = Some(fault);
        self
    }

    /// Returns every call made so far, including calls on sandboxes.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of calls starting with `prefix`.
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Names of sandboxes that exist and have not been deleted.
    pub fn live_sandboxes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.lock().sandboxes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns a live sandbox by name.
    pub fn sandbox(&self, name: &str) -> Option<Arc<MemorySandbox>> {
        self.registry.lock().sandboxes.get(name).cloned()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl SandboxService for MemorySandboxService {
    async fn get_template(&self, name: &str) -> Result<TemplateInfo, SandboxError> {
        self.record(format!("get_template {name}"));
        if let Some(fault) = self.lookup_fault {
            return Err(fault.error(&format!("template {name}")));
        }

        if self.registry.lock().templates.contains(name) {
            Ok(TemplateInfo {
                name: name.to_string(),
                image: None,
            })
        } else {
            Err(SandboxError::not_found(format!("template {name}")))
        }
    }

    async fn create_template(&self, name: &str, image: &str) -> Result<(), SandboxError> {
        self.record(format!("create_template {name} {image}"));
        if let Some(fault) = self.create_template_fault {
            return Err(fault.error(&format!("template {name}")));
        }

        self.registry.lock().templates.insert(name.to_string());
        Ok(())
    }

    async fn create_sandbox(
        &self,
        template: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn RemoteSandbox>, SandboxError> {
        self.record(format!("create_sandbox {template} {}", timeout.as_secs()));
        if let Some(fault) = self.create_sandbox_fault {
            return Err(fault.error(&format!("template {template}")));
        }

        let mut registry = self.registry.lock();
        if !registry.templates.contains(template) {
            return Err(SandboxError::not_found(format!("template {template}")));
        }

        registry.created += 1;
        let name = format!("sb-{}", registry.created);
        let sandbox = Arc::new(MemorySandbox {
            name: name.clone(),
            calls: Arc::clone(&self.calls),
            files: Mutex::default(),
            commands: self.commands.clone(),
            probe_exit_code: self.probe_exit_code,
            run_fault: None,
            read_fault: None,
        });
        registry.sandboxes.insert(name, Arc::clone(&sandbox));

        Ok(sandbox)
    }

    async fn get_sandbox(&self, name: &str) -> Result<Arc<dyn RemoteSandbox>, SandboxError> {
        self.record(format!("get_sandbox {name}"));
        self.sandbox(name)
            .map(|sandbox| sandbox as Arc<dyn RemoteSandbox>)
            .ok_or_else(|| SandboxError::not_found(format!("sandbox {name}")))
    }

    async fn delete_sandbox(&self, name: &str) -> Result<(), SandboxError> {
        self.record(format!("delete_sandbox {name}"));
        if let Some(fault) = self.delete_fault {
            return Err(fault.error(&format!("sandbox {name}")));
        }

        self.registry
            .lock()
            .sandboxes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SandboxError::not_found(format!("sandbox {name}")))
    }
}

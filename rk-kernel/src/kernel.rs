//! The kernel handle and its configuration surface

use crate::compile::Compile;
use crate::deferred::DeferredQueue;
use crate::error::{KernelError, KernelResult};
use crate::event_loop::EventLoop;
use crate::loader::ModuleCache;
use crate::module::{Definition, Module, ModuleState};
use crate::path::{self, directory_of};
use crate::registry::DefinitionRegistry;
use crate::require::Require;
use crate::scheduler::FetchScheduler;
use rk_config::{KernelConfig, DEFAULT_BUNDLE_TIMEOUT_MS, DEFAULT_REQUEST_MAXIMUM};
use rk_transport::Transport;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

/// Runtime settings. Request maximum lives in the scheduler.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub root_uri: Option<String>,
    pub library_uri: Option<String>,
    pub lookup_component: Option<String>,
    pub global_key_path: Option<String>,
    pub bundle_timeout: Duration,
    pub host_loaded: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root_uri: None,
            library_uri: None,
            lookup_component: None,
            global_key_path: None,
            bundle_timeout: Duration::from_millis(DEFAULT_BUNDLE_TIMEOUT_MS),
            host_loaded: false,
        }
    }
}

/// Shared kernel state. Each component has its own cell so a factory can
/// re-enter the kernel while another component is idle.
pub(crate) struct Context {
    pub settings: RefCell<Settings>,
    pub registry: RefCell<DefinitionRegistry>,
    pub cache: RefCell<ModuleCache>,
    pub scheduler: RefCell<FetchScheduler>,
    pub deferred: RefCell<DeferredQueue>,
    pub events: EventLoop,
    pub transport: Arc<dyn Transport>,
    pub compiler: Rc<dyn Compile>,
}

/// Snapshot of kernel counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelStats {
    /// Definitions registered, tombstones included
    pub defined: usize,
    /// Modules constructed
    pub loaded: usize,
    /// Retrievals dispatched and not yet settled
    pub in_flight: usize,
    /// Highest `in_flight` ever observed
    pub peak_in_flight: usize,
    /// Retrievals waiting for a slot
    pub pending_fetches: usize,
    /// Bundle timers still armed
    pub pending_timers: usize,
    /// Continuations waiting in the deferred queue
    pub deferred: usize,
}

/// A module loading kernel.
///
/// Cloning yields another handle to the same kernel. The kernel is
/// single-threaded; retrievals run on worker threads and are handed back
/// through [`Kernel::turn`] and [`Kernel::run_until_idle`].
///
/// # Example
/// ```
/// use rk_kernel::{Definition, Kernel, JsonCompiler, Value};
/// use rk_transport::MemoryTransport;
///
/// let kernel = Kernel::new(MemoryTransport::new(), JsonCompiler);
/// kernel
///     .define("greeting.js", Definition::factory(|_, exports, _| {
///         exports.set("text", "hello");
///         Ok(())
///     }))
///     .unwrap();
///
/// let exports = kernel.require().require("greeting").unwrap();
/// assert_eq!(exports.get("text"), Some(Value::from("hello")));
/// ```
#[derive(Clone)]
pub struct Kernel {
    pub(crate) ctx: Rc<Context>,
}

impl Kernel {
    /// Create a kernel with default settings and no URIs.
    pub fn new<T, C>(transport: T, compiler: C) -> Self
    where
        T: Transport + 'static,
        C: Compile + 'static,
    {
        Self {
            ctx: Rc::new(Context {
                settings: RefCell::new(Settings::default()),
                registry: RefCell::new(DefinitionRegistry::new()),
                cache: RefCell::new(ModuleCache::new()),
                scheduler: RefCell::new(FetchScheduler::new(DEFAULT_REQUEST_MAXIMUM)),
                deferred: RefCell::new(DeferredQueue::new()),
                events: EventLoop::new(),
                transport: Arc::new(transport),
                compiler: Rc::new(compiler),
            }),
        }
    }

    /// Create a kernel and apply `config` through the public setters.
    pub fn with_config<T, C>(config: &KernelConfig, transport: T, compiler: C) -> KernelResult<Self>
    where
        T: Transport + 'static,
        C: Compile + 'static,
    {
        let kernel = Self::new(transport, compiler);
        if let Some(uri) = &config.root_uri {
            kernel.set_root_uri(uri)?;
        }
        if let Some(uri) = &config.library_uri {
            kernel.set_library_uri(uri);
        }
        kernel.set_library_lookup_component(config.library_lookup_component.as_deref())?;
        kernel.set_request_maximum(config.request_maximum)?;
        kernel.set_global_key_path(config.global_key_path.as_deref());
        kernel.set_bundle_timeout(Duration::from_millis(config.bundle_timeout_ms));
        Ok(kernel)
    }

    /// Require function bound to the root, `/`.
    pub fn require(&self) -> Require {
        Require::new(self.clone(), "/")
    }

    /// Require function bound to the directory of `path`, as a module at
    /// that path would see it.
    pub fn require_from(&self, path: &str) -> Require {
        Require::new(self.clone(), directory_of(path))
    }

    /// Base URI for root paths. A trailing `/` is dropped.
    pub fn set_root_uri(&self, uri: &str) -> KernelResult<()> {
        if uri.is_empty() {
            return Err(KernelError::argument("Invalid root URI."));
        }
        let uri = uri.strip_suffix('/').unwrap_or(uri);
        self.ctx.settings.borrow_mut().root_uri = Some(uri.to_string());
        Ok(())
    }

    /// Base URI for library paths. A trailing `/` is ensured.
    pub fn set_library_uri(&self, uri: &str) {
        let uri = if uri.ends_with('/') {
            uri.to_string()
        } else {
            format!("{}/", uri)
        };
        self.ctx.settings.borrow_mut().library_uri = Some(uri);
    }

    /// Directory name searched in every ancestor for library paths.
    /// `None` or an empty name disables the search.
    pub fn set_library_lookup_component(&self, component: Option<&str>) -> KernelResult<()> {
        let component = match component {
            Some(c) if c.contains('/') => {
                return Err(KernelError::argument(format!(
                    "Invalid path component: \"{}\".",
                    c
                )))
            }
            Some(c) if !c.is_empty() => Some(c.to_string()),
            _ => None,
        };
        self.ctx.settings.borrow_mut().lookup_component = component;
        Ok(())
    }

    /// Enable bundle mode: retrievals carry a `callback=<key>.define`
    /// parameter and responses may define several modules.
    pub fn set_global_key_path(&self, key_path: Option<&str>) {
        self.ctx.settings.borrow_mut().global_key_path =
            key_path.filter(|k| !k.is_empty()).map(str::to_string);
    }

    /// How long a bundle retrieval on the alternate channel may take
    /// before its path is treated as missing.
    pub fn set_bundle_timeout(&self, timeout: Duration) {
        self.ctx.settings.borrow_mut().bundle_timeout = timeout;
    }

    /// Whether the host has finished loading. Together with a key path
    /// this selects the alternate bundle channel.
    pub fn set_host_loaded(&self, loaded: bool) {
        self.ctx.settings.borrow_mut().host_loaded = loaded;
    }

    pub fn root_uri(&self) -> Option<String> {
        self.ctx.settings.borrow().root_uri.clone()
    }

    pub fn library_uri(&self) -> Option<String> {
        self.ctx.settings.borrow().library_uri.clone()
    }

    pub fn library_lookup_component(&self) -> Option<String> {
        self.ctx.settings.borrow().lookup_component.clone()
    }

    pub fn request_maximum(&self) -> usize {
        self.ctx.scheduler.borrow().maximum()
    }

    pub fn is_defined(&self, path: &str) -> bool {
        self.ctx.registry.borrow().is_defined(path)
    }

    pub fn state(&self, path: &str) -> ModuleState {
        let cache = self.ctx.cache.borrow();
        if cache.contains(path) {
            return ModuleState::Loaded;
        }
        if cache.is_loading(path) {
            return ModuleState::Loading;
        }
        match self.ctx.registry.borrow().get(path) {
            None => ModuleState::Undefined,
            Some(Definition::Missing) => ModuleState::Missing,
            Some(Definition::Factory(_)) => ModuleState::Defined,
        }
    }

    /// The constructed module at `path`, if any.
    pub fn module(&self, path: &str) -> Option<Rc<Module>> {
        self.ctx.cache.borrow().get(path)
    }

    /// The first module ever constructed.
    pub fn main(&self) -> Option<Rc<Module>> {
        self.ctx.cache.borrow().main()
    }

    pub fn stats(&self) -> KernelStats {
        let scheduler = self.ctx.scheduler.borrow();
        KernelStats {
            defined: self.ctx.registry.borrow().len(),
            loaded: self.ctx.cache.borrow().len(),
            in_flight: scheduler.in_flight(),
            peak_in_flight: scheduler.peak(),
            pending_fetches: scheduler.pending(),
            pending_timers: self.ctx.events.pending_timers(),
            deferred: self.ctx.deferred.borrow().len(),
        }
    }

    pub(crate) fn candidate_paths(&self, path: &str, base: &str) -> Vec<String> {
        let lookup = self.ctx.settings.borrow().lookup_component.clone();
        path::candidate_paths(path, base, lookup.as_deref())
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("settings", &*self.ctx.settings.borrow())
            .field("stats", &self.stats())
            .finish()
    }
}

//! rk CLI - Command line interface
//!
//! Loads modules from a root and a library directory with the JSON module
//! compiler and prints their exports.

use clap::Parser;
use rk_config::{LogLevel, RkConfig};
use rk_kernel::{JsonCompiler, Kernel, KernelError, Value};
use rk_transport::{FileTransport, LoggedTransport};
use std::cell::RefCell;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

mod config;
mod logging;

use crate::config::{directory_uri, read_config, LogConfig};
use crate::logging::LogFormat;

#[derive(Parser)]
#[command(
    name = "rk",
    about = "Load modules with the rk kernel and print their exports",
    version
)]
struct Cli {
    /// Configuration file (default: ./kernel.json when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory serving root paths (`/a.js`)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Directory serving library paths (`a.js`)
    #[arg(long, value_name = "DIR")]
    library: Option<PathBuf>,

    /// Directory name searched in every ancestor, e.g. node_modules
    #[arg(long, value_name = "NAME")]
    lookup: Option<String>,

    /// Maximum number of concurrent retrievals
    #[arg(long, value_name = "N")]
    max_requests: Option<usize>,

    /// Require asynchronously instead of synchronously
    #[arg(long = "async")]
    asynchronous: bool,

    /// Log level: silent, error, warn, info, debug, trace
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Module paths to require
    #[arg(value_name = "MODULE", required = true)]
    modules: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };
    logging::init(&LogConfig::from_logging(&config.logging), cli.log_format);

    let kernel = match Kernel::with_config(
        &config.kernel,
        LoggedTransport::new(FileTransport::new()),
        JsonCompiler,
    ) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let result = if cli.asynchronous {
        require_async(&kernel, &cli.modules)
    } else {
        require_sync(&kernel, &cli.modules)
    };

    match result.and_then(|exports| render(&cli.modules, &exports)) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            tracing::error!(target: "rk::cli", kind = e.kind(), "{}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Apply command line overrides on top of the configuration file.
fn build_config(cli: &Cli) -> Result<RkConfig, String> {
    let mut config = read_config(cli.config.as_deref())?;
    if let Some(dir) = &cli.root {
        config.kernel.root_uri = Some(directory_uri(dir)?);
    }
    if let Some(dir) = &cli.library {
        config.kernel.library_uri = Some(directory_uri(dir)?);
    }
    if let Some(lookup) = &cli.lookup {
        config.kernel.library_lookup_component = Some(lookup.clone());
    }
    if let Some(n) = cli.max_requests {
        config.kernel.request_maximum = n;
    }
    if let Some(level) = &cli.log_level {
        config.logging.global =
            LogLevel::parse(level).ok_or_else(|| format!("unknown log level '{}'", level))?;
    }
    Ok(config)
}

fn require_sync(kernel: &Kernel, modules: &[String]) -> Result<Vec<Value>, KernelError> {
    let r = kernel.require();
    let mut exports = Vec::with_capacity(modules.len());
    for path in modules {
        exports.push(r.require(path)?);
    }
    // Run whatever the modules deferred.
    kernel.run_until_idle()?;
    Ok(exports)
}

fn require_async(kernel: &Kernel, modules: &[String]) -> Result<Vec<Value>, KernelError> {
    let slot: Rc<RefCell<Option<Vec<Option<Value>>>>> = Rc::new(RefCell::new(None));
    let sink = slot.clone();
    kernel.require().require_all(modules, move |values| {
        *sink.borrow_mut() = Some(values);
        Ok(())
    })?;
    kernel.run_until_idle()?;

    let values = slot.borrow_mut().take().unwrap_or_default();
    modules
        .iter()
        .zip(values)
        .map(|(path, value)| value.ok_or_else(|| KernelError::ModuleNotFound(path.clone())))
        .collect()
}

/// One module prints its exports; several print an object keyed by path.
fn render(modules: &[String], exports: &[Value]) -> Result<String, KernelError> {
    let json = match exports {
        [single] => single.to_json(),
        _ => serde_json::Value::Object(
            modules
                .iter()
                .zip(exports)
                .map(|(path, value)| (path.clone(), value.to_json()))
                .collect(),
        ),
    };
    serde_json::to_string_pretty(&json).map_err(|e| KernelError::fault(e.to_string()))
}

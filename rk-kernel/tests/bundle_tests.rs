//! Bundle mode and the alternate delivery channel

mod common;

use common::{library_uri, Slot};
use pretty_assertions::assert_eq;
use rk_kernel::{JsonCompiler, Kernel, KernelError, ModuleState, Value};
use rk_transport::MemoryTransport;
use std::time::{Duration, Instant};

fn bundle_kernel(transport: &MemoryTransport) -> Kernel {
    let kernel = Kernel::new(transport.clone(), JsonCompiler);
    kernel.set_root_uri(common::ROOT_URI).unwrap();
    kernel.set_library_uri(common::LIBRARY_URI);
    kernel.set_global_key_path(Some("rk"));
    kernel
}

#[test]
fn test_bundle_defines_several_modules() {
    let transport = MemoryTransport::with_sources([(
        library_uri("app.js"),
        r#"{"app.js": {"name": "app"}, "helper.js": {"name": "helper"}, "gone.js": null}"#,
    )]);
    let kernel = bundle_kernel(&transport);

    let app = kernel.require().require("app").unwrap();
    assert_eq!(app.get("name"), Some(Value::from("app")));
    assert_eq!(
        transport.requested(),
        vec![format!("{}?callback=rk.define", library_uri("app.js"))]
    );

    assert!(kernel.is_defined("helper.js"));
    assert_eq!(kernel.state("gone.js"), ModuleState::Missing);

    // Already delivered by the bundle, so no further retrieval.
    let helper = kernel.require().require("helper").unwrap();
    assert_eq!(helper.get("name"), Some(Value::from("helper")));
    assert_eq!(transport.requested().len(), 1);
}

#[test]
fn test_bundle_without_requested_module() {
    let transport = MemoryTransport::with_sources([(
        library_uri("lonely.js"),
        r#"{"other.js": {}}"#,
    )]);
    let kernel = bundle_kernel(&transport);

    let err = kernel.require().require("lonely.js").unwrap_err();
    assert_eq!(err, KernelError::ModuleNotFound("lonely.js".to_string()));
    assert_eq!(kernel.state("lonely.js"), ModuleState::Missing);
    assert!(kernel.is_defined("other.js"));
}

#[test]
fn test_async_bundle() {
    let transport = MemoryTransport::with_sources([(
        library_uri("lazy.js"),
        r#"{"lazy.js": {"@require": {"dep": "./dep"}}, "dep.js": {"v": 1}}"#,
    )]);
    let kernel = bundle_kernel(&transport);
    let slot = Slot::new();

    kernel.require().require_async("lazy.js", slot.sink()).unwrap();
    kernel.run_until_idle().unwrap();

    let lazy = slot.take().flatten().unwrap();
    assert_eq!(
        lazy.get("dep").and_then(|d| d.get("v")),
        Some(Value::Number(1.0))
    );
    assert_eq!(transport.requested().len(), 1);
}

#[test]
fn test_alternate_channel_times_out() {
    let transport = MemoryTransport::new();
    let kernel = bundle_kernel(&transport);
    kernel.set_host_loaded(true);
    kernel.set_bundle_timeout(Duration::from_millis(50));
    let slot = Slot::new();

    let started = Instant::now();
    kernel.require().require_async("gone.js", slot.sink()).unwrap();
    assert_eq!(kernel.stats().pending_timers, 1);
    kernel.run_until_idle().unwrap();

    assert_eq!(slot.take(), Some(None));
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(kernel.state("gone.js"), ModuleState::Missing);
    assert_eq!(kernel.stats().pending_timers, 0);
}

#[test]
fn test_alternate_channel_delivery_cancels_timer() {
    let transport = MemoryTransport::with_sources([(
        library_uri("quick.js"),
        r#"{"quick.js": {"ok": true}}"#,
    )]);
    let kernel = bundle_kernel(&transport);
    kernel.set_host_loaded(true);
    // Long enough that waiting for it would stall the test.
    kernel.set_bundle_timeout(Duration::from_secs(600));
    let slot = Slot::new();

    kernel.require().require_async("quick.js", slot.sink()).unwrap();
    kernel.run_until_idle().unwrap();

    let quick = slot.take().flatten().unwrap();
    assert_eq!(quick.get("ok"), Some(Value::Bool(true)));
    assert_eq!(kernel.stats().pending_timers, 0);
}

#[test]
fn test_compile_failure_is_a_tombstone() {
    let transport = MemoryTransport::with_sources([(library_uri("broken.js"), "{ not json")]);
    let kernel = Kernel::new(transport.clone(), JsonCompiler);
    kernel.set_library_uri(common::LIBRARY_URI);

    let err = kernel.require().require("broken.js").unwrap_err();
    assert_eq!(err, KernelError::ModuleNotFound("broken.js".to_string()));
    assert_eq!(kernel.state("broken.js"), ModuleState::Missing);
}

//! Turning retrieved source text into definitions
//!
//! The kernel does not interpret module source itself. A `Compile`
//! implementation is supplied at construction; `JsonCompiler` is the one
//! shipped with the crate.

use crate::error::CompileError;
use crate::module::Definition;
use crate::value::Value;
use serde_json::{Map, Value as Json};

/// Source-to-definition conversion.
pub trait Compile {
    /// Compile the source of a single module.
    fn compile(&self, path: &str, source: &str) -> Result<Definition, CompileError>;

    /// Compile a bundle response for `path`. A bundle may define any
    /// number of modules, `path` included or not.
    fn compile_bundle(
        &self,
        path: &str,
        _source: &str,
    ) -> Result<Vec<(String, Definition)>, CompileError> {
        Err(CompileError::new(path, "bundles are not supported"))
    }
}

impl<F> Compile for F
where
    F: Fn(&str, &str) -> Result<Definition, CompileError>,
{
    fn compile(&self, path: &str, source: &str) -> Result<Definition, CompileError> {
        self(path, source)
    }
}

/// Key holding the dependencies of a JSON module.
pub const REQUIRE_KEY: &str = "@require";

/// Compiles JSON documents into modules.
///
/// An object becomes the module's exports, field by field. The optional
/// `"@require"` object maps export names to module paths; each is required
/// synchronously, relative to the module, when the module is constructed.
/// Any other JSON value replaces the exports outright.
///
/// ```json
/// { "name": "app", "@require": { "util": "./util" } }
/// ```
///
/// A bundle is an object mapping module paths to module documents, with
/// `null` marking a path that does not exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCompiler;

impl JsonCompiler {
    fn parse(path: &str, source: &str) -> Result<Json, CompileError> {
        serde_json::from_str(source).map_err(|e| CompileError::new(path, e.to_string()))
    }

    fn definition(path: &str, json: Json) -> Result<Definition, CompileError> {
        let map = match json {
            Json::Object(map) => map,
            other => {
                return Ok(Definition::factory(move |_, _, module| {
                    module.set_exports(Value::from(other.clone()));
                    Ok(())
                }))
            }
        };

        let (fields, requires) = split_requires(path, map)?;
        Ok(Definition::factory(move |require, exports, _| {
            for (key, value) in &fields {
                exports.set(key.as_str(), Value::from(value.clone()));
            }
            for (key, target) in &requires {
                exports.set(key.as_str(), require.require(target)?);
            }
            Ok(())
        }))
    }
}

type Fields = Vec<(String, Json)>;
type Requires = Vec<(String, String)>;

fn split_requires(path: &str, map: Map<String, Json>) -> Result<(Fields, Requires), CompileError> {
    let mut fields = Vec::with_capacity(map.len());
    let mut requires = Vec::new();
    for (key, value) in map {
        if key != REQUIRE_KEY {
            fields.push((key, value));
            continue;
        }
        let Json::Object(targets) = value else {
            return Err(CompileError::new(path, "\"@require\" must be an object"));
        };
        for (name, target) in targets {
            match target {
                Json::String(target) => requires.push((name, target)),
                _ => {
                    return Err(CompileError::new(
                        path,
                        format!("dependency \"{}\" must be a path string", name),
                    ))
                }
            }
        }
    }
    Ok((fields, requires))
}

impl Compile for JsonCompiler {
    fn compile(&self, path: &str, source: &str) -> Result<Definition, CompileError> {
        Self::definition(path, Self::parse(path, source)?)
    }

    fn compile_bundle(
        &self,
        path: &str,
        source: &str,
    ) -> Result<Vec<(String, Definition)>, CompileError> {
        let Json::Object(entries) = Self::parse(path, source)? else {
            return Err(CompileError::new(path, "a bundle must be an object"));
        };
        entries
            .into_iter()
            .map(|(module_path, json)| -> Result<(String, Definition), CompileError> {
                let definition = match json {
                    Json::Null => Definition::Missing,
                    json => Self::definition(&module_path, json)?,
                };
                Ok((module_path, definition))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;
    use rk_transport::MemoryTransport;

    fn kernel() -> Kernel {
        Kernel::new(MemoryTransport::new(), JsonCompiler)
    }

    #[test]
    fn test_object_fields_become_exports() {
        let k = kernel();
        let def = JsonCompiler.compile("a.js", r#"{"name": "a", "n": 1}"#).unwrap();
        k.define("a.js", def).unwrap();
        let exports = k.require().require("a.js").unwrap();
        assert_eq!(exports.get("name"), Some(Value::from("a")));
        assert_eq!(exports.get("n"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_non_object_replaces_exports() {
        let k = kernel();
        k.define("list.js", JsonCompiler.compile("list.js", "[1, 2]").unwrap())
            .unwrap();
        let exports = k.require().require("list.js").unwrap();
        assert_eq!(
            exports,
            Value::List(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn test_require_key_resolves_relative_to_module() {
        let k = kernel();
        let main = r#"{"@require": {"util": "./util"}}"#;
        let util = r#"{"kind": "util"}"#;
        k.define_many([
            ("/app/main.js", JsonCompiler.compile("/app/main.js", main).unwrap()),
            ("/app/util.js", JsonCompiler.compile("/app/util.js", util).unwrap()),
        ])
        .unwrap();

        let exports = k.require().require("/app/main").unwrap();
        let util = k.require().require("/app/util").unwrap();
        assert_eq!(exports.get("util"), Some(util));
        assert!(!exports.as_object().unwrap().contains(REQUIRE_KEY));
    }

    #[test]
    fn test_malformed_sources() {
        assert!(JsonCompiler.compile("a.js", "{").is_err());
        assert!(JsonCompiler
            .compile("a.js", r#"{"@require": ["x"]}"#)
            .is_err());
        assert!(JsonCompiler
            .compile("a.js", r#"{"@require": {"x": 1}}"#)
            .is_err());
        assert!(JsonCompiler.compile_bundle("b.js", "[]").is_err());
    }

    #[test]
    fn test_bundle_entries() {
        let entries = JsonCompiler
            .compile_bundle("a.js", r#"{"a.js": {"v": 1}, "b.js": null}"#)
            .unwrap();
        assert_eq!(entries.len(), 2);
        let (path, def) = &entries[0];
        assert_eq!(path, "a.js");
        assert!(!def.is_missing());
        let (path, def) = &entries[1];
        assert_eq!(path, "b.js");
        assert!(def.is_missing());
    }

    #[test]
    fn test_closure_compiler_has_no_bundles() {
        let compiler =
            |_: &str, _: &str| -> Result<Definition, CompileError> { Ok(Definition::Missing) };
        assert!(compiler.compile("a.js", "").unwrap().is_missing());
        assert!(compiler.compile_bundle("a.js", "{}").is_err());
    }
}

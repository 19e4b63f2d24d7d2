//! Module path algebra
//!
//! Paths starting with `/` are root paths, everything else is a library
//! path. These functions are pure and do not consult any kernel state.

/// Extension every module file carries.
pub const MODULE_EXTENSION: &str = ".js";

/// File name tried for directory paths.
pub const INDEX_FILE: &str = "index.js";

/// Whether `path` lives under the root.
pub fn is_root(path: &str) -> bool {
    path.starts_with('/')
}

/// Collapse `.` and `..` segments.
///
/// Leading and trailing empty segments survive, so absolute and directory
/// forms are preserved. `..` cancels the previous segment, even a kept
/// `..`; with nothing before it but the root marker it is kept, which means
/// `/../x` stays as written.
///
/// ```
/// use rk_kernel::path::normalize;
///
/// assert_eq!(normalize("/a/./b/../c"), "/a/c");
/// assert_eq!(normalize("a/../../b"), "../b");
/// assert_eq!(normalize("/index/index/../"), "/index/");
/// ```
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;
    let mut kept: Vec<&str> = Vec::with_capacity(segments.len());

    for (i, segment) in segments.into_iter().enumerate() {
        match segment {
            "" => {
                if i == 0 || i == last {
                    kept.push(segment);
                }
            }
            "." => {}
            // Only a lone leading root marker survives a `..`.
            ".." => match kept.as_slice() {
                [] | [""] => kept.push(segment),
                _ => {
                    kept.pop();
                }
            },
            _ => kept.push(segment),
        }
    }

    if kept == [""] {
        return String::from("/");
    }
    kept.join("/")
}

/// Anchor `./` and `../` paths at `base`; leave other paths alone.
pub fn qualify(path: &str, base: &str) -> String {
    if !(path.starts_with("./") || path.starts_with("../")) {
        return path.to_string();
    }
    if base.is_empty() || base.ends_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Directory part of a module path, including the trailing `/`.
///
/// Library modules at the top level have an empty directory.
pub fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "",
    }
}

/// Ordered candidate paths for a require of `path` issued from `base`.
///
/// With a lookup component configured, a library path is searched in the
/// lookup directory of `base` and of each ancestor, nearest first, and
/// finally as a plain library path. A `base` that already sits inside a
/// lookup directory does not get a second one nested under it.
///
/// ```
/// use rk_kernel::path::candidate_paths;
///
/// assert_eq!(
///     candidate_paths("thing", "/x/deps/y/dir/", Some("deps")),
///     vec![
///         "/x/deps/y/dir/deps/thing",
///         "/x/deps/y/deps/thing",
///         "/x/deps/thing",
///         "thing",
///     ]
/// );
/// ```
pub fn candidate_paths(path: &str, base: &str, lookup: Option<&str>) -> Vec<String> {
    let path = normalize(&qualify(path, base));
    let component = match lookup {
        Some(component) if !component.is_empty() && !is_root(&path) => component,
        _ => return vec![path],
    };

    let relative = format!("./{}/{}", component, path);
    let mut components: Vec<&str> = base.split('/').collect();
    let mut candidates: Vec<String> = Vec::new();

    while components.len() > 1 {
        if components.last() == Some(&component) {
            components.pop();
        }
        let ancestor = format!("{}/", components.join("/"));
        let candidate = normalize(&qualify(&relative, &ancestor));
        if candidates.last() != Some(&candidate) {
            candidates.push(candidate);
        }
        components.pop();
    }

    candidates.push(path);
    candidates
}

/// Concrete paths tried for one candidate, in order.
///
/// `x.js` is tried as is, `x/` as `x/index.js`, and anything else as
/// `x.js`, then `x/index.js`, then `x`.
pub fn suffixed_candidates(path: &str) -> Vec<String> {
    if path.ends_with(MODULE_EXTENSION) {
        vec![path.to_string()]
    } else if path.ends_with('/') {
        vec![format!("{}{}", path, INDEX_FILE)]
    } else {
        vec![
            format!("{}{}", path, MODULE_EXTENSION),
            format!("{}/{}", path, INDEX_FILE),
            path.to_string(),
        ]
    }
}

//! Route derivation from page file paths.
//!
//! Turns a path relative to the pages directory into a canonical route:
//!
//! ```text
//! index.tsx                 -> /
//! blog/index.tsx            -> /blog
//! blog/[pagination].tsx     -> /blog/:pagination?
//! about.de.md (default en)  -> /de/about
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;

use isle_config::PagesConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::paths::{
    extension, has_dynamic_segment, is_component_extension, normalize_slashes,
    replace_param_brackets, split_extension, split_language_suffix, strip_extension, strip_index,
    to_route_path,
};

/// `/` is captured so empty optional parameters can drop it.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(/?):([^/?:]+)(\?)?").unwrap());

/// Options for [`derive_route`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteOptions {
    /// Language whose pages get no route prefix.
    pub default_language: Option<String>,
    /// Configured language ids, in order.
    pub languages: Vec<String>,
    /// Convert `[name]` segments of component pages into `:name` placeholders.
    pub replace_params: bool,
}

impl RouteOptions {
    /// Options from the pages configuration, with parameter replacement on.
    #[must_use]
    pub fn from_config(config: &PagesConfig) -> Self {
        Self {
            default_language: config.default_language.clone(),
            languages: config.languages.iter().map(|l| l.id.clone()).collect(),
            replace_params: true,
        }
    }
}

/// A sibling page in another language.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    /// Language id.
    pub language: String,
    /// Sibling path relative to the pages directory.
    pub path: String,
    /// Route of the sibling.
    pub route: String,
}

/// Result of [`derive_route`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteInfo {
    /// Canonical route.
    pub route: String,
    /// Whether the file path has a `[param]` segment.
    pub is_dynamic: bool,
    /// Sibling language variants in configured order. Empty unless the file
    /// itself carries a language suffix.
    pub translations: Vec<Translation>,
}

/// Derive the route of a page from its path relative to the pages directory.
#[must_use]
pub fn derive_route(relative_path: &str, options: &RouteOptions) -> RouteInfo {
    let path = normalize_slashes(relative_path);
    let path = path.trim_start_matches('/');

    RouteInfo {
        route: route_for(path, options),
        is_dynamic: has_dynamic_segment(path),
        translations: translations_for(path, options),
    }
}

fn route_for(path: &str, options: &RouteOptions) -> String {
    let is_component = extension(path)
        .is_some_and(|ext| is_component_extension(&ext.to_ascii_lowercase()));

    let replaced = if options.replace_params && is_component {
        replace_param_brackets(path)
    } else {
        path.to_owned()
    };
    let lowered = replaced.to_lowercase();
    let stem = strip_extension(&lowered);

    let languages: Vec<&str> = options.languages.iter().map(String::as_str).collect();
    let (stem, prefix) = match split_language_suffix(stem, &languages) {
        Some((base, language)) => {
            let is_default = options
                .default_language
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(language));
            (base, (!is_default).then_some(language))
        }
        None => (stem, None),
    };

    let stem = strip_index(stem);
    match prefix {
        Some(language) => to_route_path(&format!("{language}/{stem}")),
        None => to_route_path(stem),
    }
}

fn translations_for(path: &str, options: &RouteOptions) -> Vec<Translation> {
    let (without_ext, ext) = split_extension(path);
    let languages: Vec<&str> = options.languages.iter().map(String::as_str).collect();
    let Some((base, _)) = split_language_suffix(without_ext, &languages) else {
        return Vec::new();
    };

    options
        .languages
        .iter()
        .map(|language| {
            let sibling = match ext {
                Some(ext) => format!("{base}.{language}.{ext}"),
                None => format!("{base}.{language}"),
            };
            Translation {
                language: language.clone(),
                route: route_for(&sibling, options),
                path: sibling,
            }
        })
        .collect()
}

/// A route placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteParam {
    /// Parameter name.
    pub name: String,
    /// Declared with `?`.
    pub optional: bool,
}

/// Placeholders of a route template in order of first occurrence.
#[must_use]
pub fn route_params(template: &str) -> Vec<RouteParam> {
    let mut params: Vec<RouteParam> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = &caps[2];
        if params.iter().any(|p| p.name == name) {
            continue;
        }
        params.push(RouteParam {
            name: name.to_owned(),
            optional: caps.get(3).is_some(),
        });
    }
    params
}

/// Substitute `params` into a route template.
///
/// Every `:key` and `:key?` is replaced by `params[key]`. An empty or absent
/// optional parameter is removed together with its leading slash.
///
/// # Errors
///
/// Returns the names of required placeholders without a value.
pub fn substitute_params(
    template: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, Vec<String>> {
    let mut missing = Vec::new();
    let url = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| {
        let slash = &caps[1];
        let name = &caps[2];
        let optional = caps.get(3).is_some();
        match params.get(name).map(String::as_str) {
            Some(value) if !value.is_empty() => format!("{slash}{value}"),
            _ if optional => String::new(),
            _ => {
                missing.push(name.to_owned());
                caps[0].to_owned()
            }
        }
    });

    if !missing.is_empty() {
        return Err(missing);
    }
    Ok(if url.is_empty() {
        "/".to_owned()
    } else {
        url.into_owned()
    })
}

/// Match a concrete URL against a route template.
///
/// Returns the captured parameters; absent optional parameters map to an
/// empty string.
#[must_use]
pub fn match_route(template: &str, url: &str) -> Option<BTreeMap<String, String>> {
    let mut pattern = String::from("^");
    let mut names = Vec::new();
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0)?;
        pattern.push_str(&regex::escape(&template[last..whole.start()]));
        let slash = regex::escape(&caps[1]);
        if caps.get(3).is_some() {
            pattern.push_str(&format!("(?:{slash}([^/]+))?"));
        } else {
            pattern.push_str(&format!("{slash}([^/]+)"));
        }
        names.push(caps[2].to_owned());
        last = whole.end();
    }
    pattern.push_str(&regex::escape(&template[last..]));
    pattern.push_str("/?$");

    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(url)?;

    Some(
        names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let value = caps.get(i + 1).map_or("", |m| m.as_str()).to_owned();
                (name, value)
            })
            .collect(),
    )
}

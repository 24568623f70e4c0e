//! # Structural Specification Diff
//!
//! Compares two OpenAPI 3.x / Swagger 2.0 documents and files every change
//! it understands into the breaking, non-breaking or unclassified bucket.
//!
//! ## Coverage
//!
//! | Area | Compared |
//! |------|----------|
//! | `info` | `version` |
//! | servers | `servers[].url`, or `schemes` + `host` + `basePath` |
//! | `paths` | path items, operations, parameters, request body, response codes |
//! | schemas | `components.schemas` or `definitions`: type, properties, required, deprecated |
//!
//! Anything else that changes (descriptions, examples, extensions) produces
//! no entry. The content digest already told the caller *something* changed;
//! an empty result means nothing structurally interesting did.
//!
//! ## Failure
//!
//! [`try_compare`] fails only when a document, or a section it walks, has
//! the wrong JSON shape. [`compare`] swallows that failure into `None` so one
//! odd document never stops a scan.
//!
//! Entries are emitted in the current document's order, followed by removals
//! in the previous document's order, so results are deterministic.

use crate::models::{Action, Bucket, DiffComputationError, DiffEntry, DiffResult, Side};
use serde_json::{Map, Value};
use tracing::warn;

/// HTTP methods that may appear as operations in a path item.
const METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Compares two documents, returning `None` when the diff cannot be computed.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
///
/// let previous = json!({"paths": {"/x": {}, "/y": {}}});
/// let current = json!({"paths": {"/y": {}}});
///
/// let diff = specwatch_diff::compare(&previous, &current).unwrap();
/// assert!(diff.breaking_differences_found);
/// assert_eq!(diff.breaking_differences[0].code, "path.remove");
///
/// assert!(specwatch_diff::compare(&json!([1, 2]), &current).is_none());
/// ```
pub fn compare(previous: &Value, current: &Value) -> Option<DiffResult> {
    match try_compare(previous, current) {
        Ok(diff) => Some(diff),
        Err(err) => {
            warn!(error = %err, "Specification diff failed, treating as unavailable");
            None
        }
    }
}

/// Compares two documents.
///
/// # Errors
///
/// Returns [`DiffComputationError`] when either document is not a JSON
/// object, or when `paths`, `components`, `components.schemas` or
/// `definitions` is present but not an object.
pub fn try_compare(previous: &Value, current: &Value) -> Result<DiffResult, DiffComputationError> {
    let old = SpecView::parse(previous, Side::Previous)?;
    let new = SpecView::parse(current, Side::Current)?;

    let mut diff = DiffResult::default();
    compare_info(&old, &new, &mut diff);
    compare_servers(&old, &new, &mut diff);
    compare_paths(&old, &new, &mut diff);
    compare_components(&old, &new, &mut diff);
    Ok(diff)
}

/// The parts of a document the comparison walks.
struct SpecView<'a> {
    info_version: Option<&'a str>,
    servers: Vec<String>,
    paths: Option<&'a Map<String, Value>>,
    schemas: Option<&'a Map<String, Value>>,
}

impl<'a> SpecView<'a> {
    fn parse(document: &'a Value, side: Side) -> Result<Self, DiffComputationError> {
        let root = document
            .as_object()
            .ok_or(DiffComputationError::NotAnObject { side })?;

        let paths = section(root.get("paths"), side, "paths")?;
        let schemas = match section(root.get("components"), side, "components")? {
            Some(components) => section(components.get("schemas"), side, "components.schemas")?,
            None => section(root.get("definitions"), side, "definitions")?,
        };

        Ok(Self {
            info_version: root
                .get("info")
                .and_then(|info| info.get("version"))
                .and_then(Value::as_str),
            servers: server_urls(root),
            paths,
            schemas,
        })
    }
}

fn section<'a>(
    value: Option<&'a Value>,
    side: Side,
    name: &'static str,
) -> Result<Option<&'a Map<String, Value>>, DiffComputationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(DiffComputationError::MalformedSection { side, section: name }),
    }
}

fn server_urls(root: &Map<String, Value>) -> Vec<String> {
    if let Some(servers) = root.get("servers").and_then(Value::as_array) {
        return servers
            .iter()
            .filter_map(|server| server.get("url").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
    }

    let Some(host) = root.get("host").and_then(Value::as_str) else {
        return Vec::new();
    };
    let base_path = root.get("basePath").and_then(Value::as_str).unwrap_or("");
    let schemes: Vec<&str> = root
        .get("schemes")
        .and_then(Value::as_array)
        .map(|schemes| schemes.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if schemes.is_empty() {
        return vec![format!("{host}{base_path}")];
    }
    schemes
        .iter()
        .map(|scheme| format!("{scheme}://{host}{base_path}"))
        .collect()
}

fn entries(map: Option<&Map<String, Value>>) -> impl Iterator<Item = (&String, &Value)> {
    map.into_iter().flat_map(|m| m.iter())
}

fn lookup<'a>(map: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a Value> {
    map.and_then(|m| m.get(key))
}

fn flag(value: &Value, name: &str) -> bool {
    value.get(name).and_then(Value::as_bool).unwrap_or(false)
}

// =============================================================================
// Info and servers
// =============================================================================

fn compare_info(old: &SpecView<'_>, new: &SpecView<'_>, diff: &mut DiffResult) {
    if old.info_version == new.info_version {
        return;
    }
    diff.push(
        Bucket::Unclassified,
        DiffEntry::new(Action::Modify, "info.version.modify", "info.version", "info.version")
            .with_detail(format!(
                "'{}' -> '{}'",
                old.info_version.unwrap_or("none"),
                new.info_version.unwrap_or("none")
            )),
    );
}

fn compare_servers(old: &SpecView<'_>, new: &SpecView<'_>, diff: &mut DiffResult) {
    for url in new.servers.iter().filter(|url| !old.servers.contains(url)) {
        diff.push(
            Bucket::Unclassified,
            DiffEntry::new(Action::Add, "server.add", "server", url.as_str()),
        );
    }
    for url in old.servers.iter().filter(|url| !new.servers.contains(url)) {
        diff.push(
            Bucket::Unclassified,
            DiffEntry::new(Action::Remove, "server.remove", "server", url.as_str()),
        );
    }
}

// =============================================================================
// Paths and operations
// =============================================================================

fn compare_paths(old: &SpecView<'_>, new: &SpecView<'_>, diff: &mut DiffResult) {
    for (path, item) in entries(new.paths) {
        match lookup(old.paths, path) {
            Some(old_item) => compare_path_item(path, old_item, item, diff),
            None => diff.push(
                Bucket::NonBreaking,
                DiffEntry::new(Action::Add, "path.add", "path", path.as_str()),
            ),
        }
    }

    for (path, _) in entries(old.paths) {
        if lookup(new.paths, path).is_none() {
            diff.push(
                Bucket::Breaking,
                DiffEntry::new(Action::Remove, "path.remove", "path", path.as_str()),
            );
        }
    }
}

fn compare_path_item(path: &str, old_item: &Value, new_item: &Value, diff: &mut DiffResult) {
    if old_item == new_item {
        return;
    }

    for method in METHODS {
        let location = format!("{} {}", method.to_uppercase(), path);
        match (old_item.get(method), new_item.get(method)) {
            (Some(old_op), Some(new_op)) => {
                let old_params = collect_parameters(old_item, old_op);
                let new_params = collect_parameters(new_item, new_op);
                compare_operation(&location, old_op, new_op, diff);
                compare_parameters(&location, &old_params, &new_params, diff);
            }
            (None, Some(_)) => diff.push(
                Bucket::NonBreaking,
                DiffEntry::new(Action::Add, "method.add", "method", location),
            ),
            (Some(_), None) => diff.push(
                Bucket::Breaking,
                DiffEntry::new(Action::Remove, "method.remove", "method", location),
            ),
            (None, None) => {}
        }
    }
}

fn compare_operation(location: &str, old_op: &Value, new_op: &Value, diff: &mut DiffResult) {
    if !flag(old_op, "deprecated") && flag(new_op, "deprecated") {
        diff.push(
            Bucket::NonBreaking,
            DiffEntry::new(Action::Modify, "method.deprecated", "method", location),
        );
    }

    match (old_op.get("requestBody"), new_op.get("requestBody")) {
        (None, Some(body)) => {
            let bucket = if flag(body, "required") {
                Bucket::Breaking
            } else {
                Bucket::NonBreaking
            };
            diff.push(
                bucket,
                DiffEntry::new(Action::Add, "request.body.add", "request.body", location),
            );
        }
        (Some(_), None) => diff.push(
            Bucket::Unclassified,
            DiffEntry::new(Action::Remove, "request.body.remove", "request.body", location),
        ),
        _ => {}
    }

    let old_responses = old_op.get("responses").and_then(Value::as_object);
    let new_responses = new_op.get("responses").and_then(Value::as_object);
    for (status, _) in entries(new_responses) {
        if lookup(old_responses, status).is_none() {
            diff.push(
                Bucket::NonBreaking,
                DiffEntry::new(
                    Action::Add,
                    "response.status.add",
                    "response",
                    format!("{location} -> {status}"),
                ),
            );
        }
    }
    for (status, _) in entries(old_responses) {
        if lookup(new_responses, status).is_none() {
            diff.push(
                Bucket::Breaking,
                DiffEntry::new(
                    Action::Remove,
                    "response.status.remove",
                    "response",
                    format!("{location} -> {status}"),
                ),
            );
        }
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Merges path-level and operation-level parameters keyed by `in:name`.
///
/// Operation parameters override path parameters with the same key.
fn collect_parameters<'a>(path_item: &'a Value, operation: &'a Value) -> Vec<(String, &'a Value)> {
    let mut merged: Vec<(String, &Value)> = Vec::new();
    let declared = [path_item.get("parameters"), operation.get("parameters")];

    for param in declared
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .flatten()
    {
        let key = parameter_key(param);
        match merged.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = param,
            None => merged.push((key, param)),
        }
    }
    merged
}

fn parameter_key(param: &Value) -> String {
    if let Some(reference) = param.get("$ref").and_then(Value::as_str) {
        return format!("ref:{reference}");
    }
    let location = param.get("in").and_then(Value::as_str).unwrap_or("unknown");
    let name = param.get("name").and_then(Value::as_str).unwrap_or("");
    format!("{location}:{name}")
}

fn parameter_required(param: &Value) -> bool {
    flag(param, "required") || param.get("in").and_then(Value::as_str) == Some("path")
}

/// OpenAPI 3 keeps the type under `schema`, Swagger 2 inline.
fn parameter_type(param: &Value) -> Option<&str> {
    param
        .get("schema")
        .and_then(|schema| schema.get("type"))
        .or_else(|| param.get("type"))
        .and_then(Value::as_str)
}

fn find_parameter<'a>(params: &[(String, &'a Value)], key: &str) -> Option<&'a Value> {
    params
        .iter()
        .find(|(existing, _)| existing == key)
        .map(|(_, param)| *param)
}

fn compare_parameters(
    location: &str,
    old_params: &[(String, &Value)],
    new_params: &[(String, &Value)],
    diff: &mut DiffResult,
) {
    for (key, new_param) in new_params {
        let param_location = format!("{location} [{key}]");
        let Some(old_param) = find_parameter(old_params, key) else {
            let (bucket, code) = if parameter_required(new_param) {
                (Bucket::Breaking, "parameter.required.add")
            } else {
                (Bucket::NonBreaking, "parameter.add")
            };
            diff.push(bucket, DiffEntry::new(Action::Add, code, "parameter", param_location));
            continue;
        };

        if !parameter_required(old_param) && parameter_required(new_param) {
            diff.push(
                Bucket::Breaking,
                DiffEntry::new(
                    Action::Modify,
                    "parameter.required.modify",
                    "parameter",
                    param_location.as_str(),
                ),
            );
        }

        if let (Some(old_type), Some(new_type)) = (parameter_type(old_param), parameter_type(new_param)) {
            if old_type != new_type {
                diff.push(
                    Bucket::Breaking,
                    DiffEntry::new(
                        Action::Modify,
                        "parameter.type.modify",
                        "parameter",
                        param_location.as_str(),
                    )
                    .with_detail(format!("'{old_type}' -> '{new_type}'")),
                );
            }
        }

        if !flag(old_param, "deprecated") && flag(new_param, "deprecated") {
            diff.push(
                Bucket::NonBreaking,
                DiffEntry::new(Action::Modify, "parameter.deprecated", "parameter", param_location),
            );
        }
    }

    for (key, _) in old_params {
        if find_parameter(new_params, key).is_none() {
            diff.push(
                Bucket::Breaking,
                DiffEntry::new(
                    Action::Remove,
                    "parameter.remove",
                    "parameter",
                    format!("{location} [{key}]"),
                ),
            );
        }
    }
}

// =============================================================================
// Schemas
// =============================================================================

fn compare_components(old: &SpecView<'_>, new: &SpecView<'_>, diff: &mut DiffResult) {
    for (name, schema) in entries(new.schemas) {
        match lookup(old.schemas, name) {
            Some(old_schema) => compare_schema(name, old_schema, schema, diff),
            None => diff.push(
                Bucket::NonBreaking,
                DiffEntry::new(Action::Add, "schema.add", "schema", name.as_str()),
            ),
        }
    }

    for (name, _) in entries(old.schemas) {
        if lookup(new.schemas, name).is_none() {
            diff.push(
                Bucket::Breaking,
                DiffEntry::new(Action::Remove, "schema.remove", "schema", name.as_str()),
            );
        }
    }
}

fn compare_schema(name: &str, old: &Value, new: &Value, diff: &mut DiffResult) {
    if old == new {
        return;
    }

    let old_type = get_schema_type(old);
    let new_type = get_schema_type(new);
    if old_type != new_type {
        diff.push(
            Bucket::Breaking,
            DiffEntry::new(Action::Modify, "schema.type.modify", "schema", name)
                .with_detail(format!("'{old_type}' -> '{new_type}'")),
        );
        // A retyped schema is a different schema; member-level entries would be noise.
        return;
    }

    if !flag(old, "deprecated") && flag(new, "deprecated") {
        diff.push(
            Bucket::NonBreaking,
            DiffEntry::new(Action::Modify, "schema.deprecated", "schema", name),
        );
    }

    let old_props = get_properties(old);
    let new_props = get_properties(new);
    let old_required = get_required(old);
    let new_required = get_required(new);

    for (key, new_prop) in entries(new_props) {
        let location = format!("{name}.{key}");
        match lookup(old_props, key) {
            None => {
                let bucket = if new_required.contains(&key.as_str()) {
                    Bucket::Breaking
                } else {
                    Bucket::NonBreaking
                };
                diff.push(
                    bucket,
                    DiffEntry::new(Action::Add, "schema.property.add", "schema.property", location),
                );
            }
            Some(old_prop) => {
                let old_prop_type = get_schema_type(old_prop);
                let new_prop_type = get_schema_type(new_prop);
                if old_prop_type != new_prop_type {
                    diff.push(
                        Bucket::Breaking,
                        DiffEntry::new(
                            Action::Modify,
                            "schema.property.type.modify",
                            "schema.property",
                            location,
                        )
                        .with_detail(format!("'{old_prop_type}' -> '{new_prop_type}'")),
                    );
                }
            }
        }
    }

    for (key, _) in entries(old_props) {
        if lookup(new_props, key).is_none() {
            diff.push(
                Bucket::Breaking,
                DiffEntry::new(
                    Action::Remove,
                    "schema.property.remove",
                    "schema.property",
                    format!("{name}.{key}"),
                ),
            );
        }
    }

    for key in &new_required {
        if !old_required.contains(key) && lookup(old_props, key).is_some() {
            diff.push(
                Bucket::Breaking,
                DiffEntry::new(
                    Action::Modify,
                    "schema.required.add",
                    "schema.property",
                    format!("{name}.{key}"),
                ),
            );
        }
    }
}

/// Extracts the type from a JSON Schema value.
fn get_schema_type(schema: &Value) -> &str {
    schema.get("type").and_then(Value::as_str).unwrap_or("unknown")
}

/// Extracts properties from a JSON Schema object.
fn get_properties(schema: &Value) -> Option<&Map<String, Value>> {
    schema.get("properties").and_then(Value::as_object)
}

/// Extracts required property names from a JSON Schema object.
fn get_required(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tag declarations, default taggings and tag resolution.
//!
//! A [`TagSpec`] is the ordered list of tags to attach to every query. Each
//! declaration is either a bare key or a key with its own [`Handler`]:
//!
//! ```text
//! application          bare key: registry handler, else context["application"]
//! region => "us-east"  static value
//! tenant => fn()       handler called without arguments
//! user   => fn(ctx)    handler called with the execution context
//! ```
//!
//! [`resolve`] turns a tag spec into [`ResolvedTag`]s for one execution context.
//! Tags whose value is null are dropped, which is how optional tags disappear
//! from the comment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::error::QueryLogsError;

/// Value of a tag. `Value::Null` means "no value" and suppresses the tag.
pub type TagValue = Value;

/// Return type of dynamic tag handlers.
pub type HandlerResult = anyhow::Result<TagValue>;

type NoArgFn = dyn Fn() -> HandlerResult + Send + Sync;
type ContextFn = dyn Fn(&ExecutionContext) -> HandlerResult + Send + Sync;

/// Produces the value of a tag.
#[derive(Clone)]
pub enum Handler {
    /// Literal value.
    Static(TagValue),
    /// Computed without looking at the execution context.
    NoArg(Arc<NoArgFn>),
    /// Computed from the execution context.
    Context(Arc<ContextFn>),
}

impl Handler {
    pub fn value(value: impl Into<TagValue>) -> Self {
        Handler::Static(value.into())
    }

    pub fn no_arg<F>(f: F) -> Self
    where
        F: Fn() -> HandlerResult + Send + Sync + 'static,
    {
        Handler::NoArg(Arc::new(f))
    }

    pub fn context<F>(f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> HandlerResult + Send + Sync + 'static,
    {
        Handler::Context(Arc::new(f))
    }

    /// Handler reading another key of the execution context.
    pub fn from_context_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Handler::context(move |ctx| Ok(ctx.get(&key).cloned().unwrap_or_default()))
    }

    fn call(&self, context: &ExecutionContext) -> HandlerResult {
        match self {
            Handler::Static(value) => Ok(value.clone()),
            Handler::NoArg(f) => f(),
            Handler::Context(f) => f(context),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Handler::NoArg(_) => f.write_str("NoArg(..)"),
            Handler::Context(_) => f.write_str("Context(..)"),
        }
    }
}

/// One entry of a [`TagSpec`].
#[derive(Debug, Clone)]
pub enum TagDeclaration {
    /// Resolved through the registry, then the execution context.
    Key(String),
    /// Resolved through its own handler.
    Mapped { key: String, handler: Handler },
}

impl TagDeclaration {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            TagDeclaration::Key(key) | TagDeclaration::Mapped { key, .. } => key,
        }
    }
}

impl From<&str> for TagDeclaration {
    fn from(key: &str) -> Self {
        TagDeclaration::Key(key.to_string())
    }
}

impl From<String> for TagDeclaration {
    fn from(key: String) -> Self {
        TagDeclaration::Key(key)
    }
}

/// Ordered list of tag declarations. Output order follows declaration order.
///
/// Clones share the declarations until one of them is modified.
#[derive(Debug, Clone, Default)]
pub struct TagSpec {
    declarations: Arc<Vec<TagDeclaration>>,
}

impl TagSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.push(TagDeclaration::Key(key.into()));
        self
    }

    #[must_use]
    pub fn with_value(self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.with_handler(key, Handler::value(value))
    }

    #[must_use]
    pub fn with_handler(mut self, key: impl Into<String>, handler: Handler) -> Self {
        self.push(TagDeclaration::Mapped {
            key: key.into(),
            handler,
        });
        self
    }

    pub fn push(&mut self, declaration: impl Into<TagDeclaration>) {
        Arc::make_mut(&mut self.declarations).push(declaration.into());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TagDeclaration> {
        self.declarations.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.declarations.iter().map(TagDeclaration::key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl<D: Into<TagDeclaration>> FromIterator<D> for TagSpec {
    fn from_iter<I: IntoIterator<Item = D>>(iter: I) -> Self {
        Self {
            declarations: Arc::new(iter.into_iter().map(Into::into).collect()),
        }
    }
}

impl<'a> IntoIterator for &'a TagSpec {
    type Item = &'a TagDeclaration;
    type IntoIter = std::slice::Iter<'a, TagDeclaration>;

    fn into_iter(self) -> Self::IntoIter {
        self.declarations.iter()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDeclaration {
    Key(String),
    Static(Map<String, Value>),
}

/// Deserializes a tag spec from a list of bare keys and `{key: value}` objects.
///
/// ```json
/// ["application", {"region": "us-east-1"}, "job"]
/// ```
///
/// Objects only carry static values. Keys of a multi-entry object are added in
/// the order the map yields them, so use one object per key when order matters.
impl<'de> Deserialize<'de> for TagSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<RawDeclaration>::deserialize(deserializer)?;
        let mut spec = TagSpec::new();
        for declaration in raw {
            match declaration {
                RawDeclaration::Key(key) => spec.push(key),
                RawDeclaration::Static(map) => {
                    for (key, value) in map {
                        spec = spec.with_value(key, value);
                    }
                }
            }
        }
        Ok(spec)
    }
}

/// Default handlers for bare keys, shared by every tag spec.
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    handlers: HashMap<String, Handler>,
}

impl TagRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in taggings (`pid`).
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let pid = Handler::no_arg(|| Ok(Value::from(std::process::id())));
        registry.register("pid", pid);
        registry
    }

    /// Registers `handler` as the default for `key`, replacing any previous one.
    pub fn register(&mut self, key: impl Into<String>, handler: Handler) -> Option<Handler> {
        self.handlers.insert(key.into(), handler)
    }

    pub fn unregister(&mut self, key: &str) -> Option<Handler> {
        self.handlers.remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Handler> {
        self.handlers.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }
}

/// A tag with a non-null value, ready to be formatted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTag {
    pub key: String,
    pub value: TagValue,
}

impl ResolvedTag {
    pub fn new(key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The value as it appears in a comment: strings without JSON quotes,
    /// everything else in its JSON form.
    #[must_use]
    pub fn value_string(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Resolves every declaration of `spec` against `context`.
///
/// Bare keys use the registry handler when one exists and fall back to reading
/// the context. Declared handlers win over both. Null values are skipped.
/// Handler failures are returned as [`QueryLogsError::Handler`].
pub fn resolve(
    spec: &TagSpec,
    context: &ExecutionContext,
    registry: &TagRegistry,
) -> Result<Vec<ResolvedTag>, QueryLogsError> {
    let mut resolved = Vec::with_capacity(spec.len());

    for declaration in spec {
        let key = declaration.key();
        let handler = match declaration {
            TagDeclaration::Mapped { handler, .. } => Some(handler),
            TagDeclaration::Key(key) => registry.get(key),
        };

        let value = match handler {
            Some(handler) => handler
                .call(context)
                .map_err(|source| QueryLogsError::Handler {
                    key: key.to_string(),
                    source,
                })?,
            None => context.get(key).cloned().unwrap_or(Value::Null),
        };

        if !value.is_null() {
            resolved.push(ResolvedTag::new(key, value));
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn keys(tags: &[ResolvedTag]) -> Vec<&str> {
        tags.iter().map(|tag| tag.key.as_str()).collect()
    }

    fn context(pairs: &[(&str, &str)]) -> ExecutionContext {
        pairs.iter().copied().collect()
    }

    fn resolve_without_context(spec: &TagSpec) -> Result<Vec<ResolvedTag>, QueryLogsError> {
        resolve(spec, &ExecutionContext::new(), &TagRegistry::new())
    }

    #[test]
    fn test_bare_key_reads_context() {
        let spec = TagSpec::new().with_key("controller").with_key("action");
        let context = context(&[("controller", "users"), ("action", "index")]);

        let tags = resolve(&spec, &context, &TagRegistry::new()).unwrap();
        assert_eq!(
            tags,
            vec![
                ResolvedTag::new("controller", "users"),
                ResolvedTag::new("action", "index"),
            ]
        );
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let spec = TagSpec::new()
            .with_value("zeta", "z")
            .with_value("alpha", "a")
            .with_value("mid", "m");

        let tags = resolve_without_context(&spec).unwrap();
        assert_eq!(keys(&tags), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_missing_and_null_values_are_omitted() {
        let spec = TagSpec::new()
            .with_key("application")
            .with_key("controller")
            .with_handler("action", Handler::no_arg(|| Ok(Value::Null)))
            .with_value("job", Value::Null);
        let context = context(&[("application", "MyApp")]);

        let tags = resolve(&spec, &context, &TagRegistry::new()).unwrap();
        assert_eq!(keys(&tags), vec!["application"]);
    }

    #[test]
    fn test_registry_handler_wins_over_context() {
        let mut registry = TagRegistry::new();
        registry.register("controller", Handler::value("from-registry"));
        let context = context(&[("controller", "from-context")]);

        let spec = TagSpec::new().with_key("controller");
        let tags = resolve(&spec, &context, &registry).unwrap();
        assert_eq!(tags, vec![ResolvedTag::new("controller", "from-registry")]);
    }

    #[test]
    fn test_declared_handler_wins_over_registry_and_context() {
        let mut registry = TagRegistry::new();
        registry.register("controller", Handler::value("from-registry"));
        let context = context(&[("controller", "from-context")]);

        let spec = TagSpec::new().with_value("controller", "declared");
        let tags = resolve(&spec, &context, &registry).unwrap();
        assert_eq!(tags, vec![ResolvedTag::new("controller", "declared")]);
    }

    #[test]
    fn test_unregister_falls_back_to_context() {
        let mut registry = TagRegistry::new();
        registry.register("controller", Handler::value("from-registry"));
        let context = context(&[("controller", "from-context")]);
        let spec = TagSpec::new().with_key("controller");

        let removed = registry.unregister("controller");
        assert!(matches!(removed, Some(Handler::Static(ref value)) if value == "from-registry"));
        assert!(!registry.contains("controller"));
        assert!(registry.unregister("controller").is_none());

        let tags = resolve(&spec, &context, &registry).unwrap();
        assert_eq!(tags, vec![ResolvedTag::new("controller", "from-context")]);
    }

    #[test]
    fn test_register_replaces_previous_handler() {
        let mut registry = TagRegistry::new();
        assert!(registry.register("region", Handler::value("eu")).is_none());

        let previous = registry.register("region", Handler::value("us"));
        assert!(matches!(previous, Some(Handler::Static(ref value)) if value == "eu"));
        assert!(matches!(registry.get("region"), Some(Handler::Static(value)) if value == "us"));
    }

    #[test]
    fn test_handler_kinds() {
        let with_context = Handler::context(|context| {
            let job = context.get("job").and_then(Value::as_str);
            Ok(job.map_or(Value::Null, |job| json!(format!("job-{job}"))))
        });
        let spec = TagSpec::new()
            .with_handler("static", Handler::value(7))
            .with_handler("no_arg", Handler::no_arg(|| Ok(json!("computed"))))
            .with_handler("with_context", with_context)
            .with_handler("alias", Handler::from_context_key("job"));
        let context = context(&[("job", "Worker")]);

        let tags = resolve(&spec, &context, &TagRegistry::new()).unwrap();
        assert_eq!(
            tags,
            vec![
                ResolvedTag::new("static", 7),
                ResolvedTag::new("no_arg", "computed"),
                ResolvedTag::new("with_context", "job-Worker"),
                ResolvedTag::new("alias", "Worker"),
            ]
        );
    }

    #[test]
    fn test_handler_error_propagates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let after = Handler::no_arg(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(json!("x"))
        });
        let spec = TagSpec::new()
            .with_handler("broken", Handler::no_arg(|| Err(anyhow::anyhow!("boom"))))
            .with_handler("after", after);

        let err = resolve_without_context(&spec).unwrap_err();
        match err {
            QueryLogsError::Handler { key, source } => {
                assert_eq!(key, "broken");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_registry_has_pid() {
        let registry = TagRegistry::with_defaults();
        assert!(registry.contains("pid"));

        let spec = TagSpec::new().with_key("pid");
        let tags = resolve(&spec, &ExecutionContext::new(), &registry).unwrap();
        assert_eq!(tags, vec![ResolvedTag::new("pid", std::process::id())]);
    }

    #[test]
    fn test_cloned_spec_shares_declarations_until_modified() {
        let spec = TagSpec::new().with_key("application").with_key("job");
        let shared = spec.clone();
        assert!(Arc::ptr_eq(&spec.declarations, &shared.declarations));

        let extended = shared.with_key("region");
        assert!(!Arc::ptr_eq(&spec.declarations, &extended.declarations));
        assert_eq!(spec.keys().collect::<Vec<_>>(), vec!["application", "job"]);
        assert_eq!(extended.len(), 3);
    }

    #[test]
    fn test_value_string() {
        assert_eq!(ResolvedTag::new("a", "plain").value_string(), "plain");
        assert_eq!(ResolvedTag::new("a", 42).value_string(), "42");
        assert_eq!(ResolvedTag::new("a", true).value_string(), "true");

        let list = ResolvedTag::new("a", json!(["x", 1]));
        assert_eq!(list.value_string(), "[\"x\",1]");
    }

    #[test]
    fn test_deserialize_spec() {
        let raw = json!(["application", {"region": "us-east-1"}, "job"]);
        let spec: TagSpec = serde_json::from_value(raw).unwrap();
        let keys: Vec<_> = spec.keys().collect();
        assert_eq!(keys, vec!["application", "region", "job"]);

        let tags = resolve_without_context(&spec).unwrap();
        assert_eq!(tags, vec![ResolvedTag::new("region", "us-east-1")]);
    }

    #[test]
    fn test_deserialize_spec_rejects_other_shapes() {
        assert!(serde_json::from_value::<TagSpec>(json!("application")).is_err());
        assert!(serde_json::from_value::<TagSpec>(json!([1])).is_err());
    }
}

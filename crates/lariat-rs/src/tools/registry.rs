//! Tool registration, argument validation/coercion, and dispatch.
//!
//! A [`ToolSpec`] declares a tool's name, its parameter schema (typed,
//! optional/default-aware), and an async handler. Specs are collected into
//! a [`ToolRegistry`] that validates the schema once at registration and
//! then validates, coerces, and dispatches every call. Coercion is
//! deliberately permissive — the upstream model supplies arguments as
//! whatever JSON it managed to emit, and numeric strings, truthy strings,
//! and stringified values are all fair game.
//!
//! # Example
//!
//! ```
//! use lariat_rs::tools::registry::{ParamType, ToolRegistry, ToolSpec};
//! use serde_json::json;
//!
//! let spec = ToolSpec::builder("add_one")
//!     .description("Add one to a number")
//!     .param("value", ParamType::Int, "The number to increment")
//!     .handler(|args| async move {
//!         let n = args["value"].as_i64().unwrap_or(0);
//!         Ok(json!(n + 1))
//!     })
//!     .build();
//!
//! let registry = ToolRegistry::new().with(spec).unwrap();
//! assert!(registry.contains("add_one"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Argument mapping passed to and produced by coercion.
pub type ArgMap = Map<String, Value>;

/// Boxed future returned by a tool handler.
///
/// The `Err` string is the tool's own domain error text; the registry wraps
/// it into [`ToolError::Handler`] without masking it.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>;

/// Type-erased async tool handler.
type ErasedHandler = Box<dyn Fn(ArgMap) -> HandlerFuture + Send + Sync>;

// ── Errors ─────────────────────────────────────────────────────────

/// Per-call dispatch failures. All are local to one tool invocation — the
/// session continues after any of them.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool {name}")]
    UnknownTool { name: String },
    #[error("missing argument '{param}' for {tool}")]
    MissingArgument { tool: String, param: String },
    #[error("failed to coerce '{param}' to {expected} in {tool}: got {value}")]
    Coercion {
        tool: String,
        param: String,
        expected: &'static str,
        value: String,
    },
    #[error("unresolved result reference")]
    UnresolvedReference,
    #[error("call payload does not decode: {0}")]
    InvalidPayload(String),
    #[error("{message}")]
    Handler { tool: String, message: String },
}

/// Registration-time schema violations. These are startup failures, not
/// session failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool name must not be empty")]
    EmptyName,
    #[error("tool '{0}' is already registered")]
    Duplicate(String),
    #[error("tool '{tool}' parameter '{param}' missing description")]
    MissingDescription { tool: String, param: String },
}

// ── Parameter schema ───────────────────────────────────────────────

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Float,
    Int,
    String,
    Bool,
}

impl ParamType {
    /// Name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            ParamType::Float => "float",
            ParamType::Int => "int",
            ParamType::String => "string",
            ParamType::Bool => "bool",
        }
    }

    /// JSON Schema type name for exported schemas.
    pub fn schema_name(self) -> &'static str {
        match self {
            ParamType::Float => "number",
            ParamType::Int => "integer",
            ParamType::String => "string",
            ParamType::Bool => "boolean",
        }
    }

    /// Coerce a raw supplied value to this type.
    ///
    /// `None` means the value cannot be converted. String and bool coercion
    /// never fail: any value stringifies, and bool matches the stringified
    /// value against {"true", "1", "yes"} case-insensitively. Int coercion
    /// truncates fractional numbers but rejects fractional *strings*.
    pub fn coerce(self, value: &Value) -> Option<Value> {
        match self {
            ParamType::Float => match value {
                Value::Number(n) => n
                    .as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number),
                Value::Bool(b) => Some(json!(if *b { 1.0 } else { 0.0 })),
                _ => None,
            },
            ParamType::Int => match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .map(|i| json!(i)),
                Value::String(s) => s.trim().parse::<i64>().ok().map(|i| json!(i)),
                Value::Bool(b) => Some(json!(i64::from(*b))),
                _ => None,
            },
            ParamType::String => Some(Value::String(stringify(value))),
            ParamType::Bool => {
                let text = stringify(value).to_lowercase();
                Some(Value::Bool(matches!(text.as_str(), "true" | "1" | "yes")))
            }
        }
    }
}

/// Bare content for JSON strings, compact JSON for everything else.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Declared schema for one tool parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub param_type: ParamType,
    pub description: String,
    pub optional: bool,
    /// Substituted when an optional parameter is absent. `None` substitutes
    /// JSON null.
    pub default: Option<Value>,
}

// ── ToolSpec ───────────────────────────────────────────────────────

/// A registered tool: name, parameter schema, and async handler.
///
/// Built once at startup via [`ToolSpec::builder`]; read-only thereafter.
pub struct ToolSpec {
    name: String,
    description: String,
    params: BTreeMap<String, ParamSpec>,
    handler: ErasedHandler,
    allows_empty_args: bool,
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("params", &self.params.keys().collect::<Vec<_>>())
            .field("allows_empty_args", &self.allows_empty_args)
            .finish()
    }
}

impl ToolSpec {
    /// Start building a spec for the named tool.
    pub fn builder(name: impl Into<String>) -> ToolSpecBuilder {
        ToolSpecBuilder {
            name: name.into(),
            description: None,
            params: BTreeMap::new(),
            handler: None,
            allows_empty_args: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether a call to this tool may legitimately carry no arguments.
    pub fn allows_empty_args(&self) -> bool {
        self.allows_empty_args
    }

    /// Validate and coerce supplied arguments against the declared schema.
    ///
    /// Undeclared supplied arguments are dropped. Declared ones must either
    /// be present and coercible or optional (default substituted).
    fn coerce_args(&self, supplied: &ArgMap) -> Result<ArgMap, ToolError> {
        let mut coerced = ArgMap::new();
        for (param, spec) in &self.params {
            let Some(raw) = supplied.get(param) else {
                if spec.optional {
                    coerced.insert(param.clone(), spec.default.clone().unwrap_or(Value::Null));
                    continue;
                }
                return Err(ToolError::MissingArgument {
                    tool: self.name.clone(),
                    param: param.clone(),
                });
            };
            let value = spec.param_type.coerce(raw).ok_or_else(|| ToolError::Coercion {
                tool: self.name.clone(),
                param: param.clone(),
                expected: spec.param_type.name(),
                value: raw.to_string(),
            })?;
            coerced.insert(param.clone(), value);
        }
        Ok(coerced)
    }

    /// OpenAI-function-style JSON Schema for this tool.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (param, spec) in &self.params {
            properties.insert(
                param.clone(),
                json!({
                    "type": spec.param_type.schema_name(),
                    "description": spec.description,
                }),
            );
            if !spec.optional {
                required.push(Value::String(param.clone()));
            }
        }
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            },
        })
    }
}

/// Builder for [`ToolSpec`]. Panics on `build()` if the handler or
/// description is missing — this ensures completeness before registration.
pub struct ToolSpecBuilder {
    name: String,
    description: Option<String>,
    params: BTreeMap<String, ParamSpec>,
    handler: Option<ErasedHandler>,
    allows_empty_args: bool,
}

impl ToolSpecBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a required parameter.
    pub fn param(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.params.insert(
            name.into(),
            ParamSpec {
                param_type,
                description: description.into(),
                optional: false,
                default: None,
            },
        );
        self
    }

    /// Declare an optional parameter with an optional default value.
    pub fn optional_param(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
        default: Option<Value>,
    ) -> Self {
        self.params.insert(
            name.into(),
            ParamSpec {
                param_type,
                description: description.into(),
                optional: true,
                default,
            },
        );
        self
    }

    /// Mark this tool as callable with an empty argument set.
    pub fn allow_empty_args(mut self) -> Self {
        self.allows_empty_args = true;
        self
    }

    /// Attach the async handler.
    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ArgMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        self.handler = Some(Box::new(move |args| Box::pin(handler(args))));
        self
    }

    /// Build the spec. Panics if required fields are missing.
    pub fn build(self) -> ToolSpec {
        ToolSpec {
            name: self.name,
            description: self.description.expect("ToolSpec requires 'description'"),
            params: self.params,
            handler: self.handler.expect("ToolSpec requires 'handler'"),
            allows_empty_args: self.allows_empty_args,
        }
    }
}

// ── ToolRegistry ───────────────────────────────────────────────────

/// The set of tools a session may dispatch to, keyed by name.
///
/// Registration validates the declared schema; dispatch validates and
/// coerces arguments, then invokes the handler. Handlers' own domain
/// errors pass through unmasked as [`ToolError::Handler`].
pub struct ToolRegistry {
    tools: HashMap<String, ToolSpec>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, validating its declared schema.
    pub fn register(&mut self, spec: ToolSpec) -> Result<(), RegistryError> {
        if spec.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.tools.contains_key(&spec.name) {
            return Err(RegistryError::Duplicate(spec.name));
        }
        for (param, p) in &spec.params {
            if p.description.is_empty() {
                return Err(RegistryError::MissingDescription {
                    tool: spec.name.clone(),
                    param: param.clone(),
                });
            }
        }
        self.tools.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, spec: ToolSpec) -> Result<Self, RegistryError> {
        self.register(spec)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether the named tool accepts an empty argument set. `false` for
    /// unknown tools.
    pub fn allows_empty_args(&self, name: &str) -> bool {
        self.tools
            .get(name)
            .is_some_and(ToolSpec::allows_empty_args)
    }

    /// Validate, coerce, and dispatch one call.
    pub async fn dispatch(&self, name: &str, supplied: &ArgMap) -> Result<Value, ToolError> {
        let spec = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        let coerced = spec.coerce_args(supplied)?;

        log_dispatch(name, &coerced);
        let start = Instant::now();

        let result = (spec.handler)(coerced)
            .await
            .map_err(|message| ToolError::Handler {
                tool: name.to_string(),
                message,
            })?;

        debug!(
            "tool {name} completed in {:.0}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
    }

    /// JSON Schemas for every registered tool, sorted by name.
    pub fn json_schemas(&self) -> Vec<Value> {
        self.names()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(ToolSpec::json_schema)
            .collect()
    }

    /// A prompt-ready guide describing the call format and every tool.
    pub fn render_guide(&self) -> String {
        let mut guide = String::from(
            "You can call tools by emitting a JSON object of the form \
             {\"name\": \"<tool>\", \"parameters\": {...}}. Available tools:\n",
        );
        for name in self.names() {
            let Some(spec) = self.tools.get(name) else {
                continue;
            };
            guide.push_str(&format!("- {}: {}\n", spec.name, spec.description));
            for (param, p) in &spec.params {
                guide.push_str(&format!("    {param} ({}", p.param_type.schema_name()));
                if p.optional {
                    guide.push_str(", optional");
                }
                guide.push_str(&format!("): {}\n", p.description));
            }
        }
        guide
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Log a dispatch at INFO with a truncated argument preview.
fn log_dispatch(name: &str, args: &ArgMap) {
    let rendered = Value::Object(args.clone()).to_string();
    let preview: String = rendered.chars().take(120).collect();
    info!(
        "[tool] {name}({preview}{})",
        if rendered.chars().count() > 120 { "..." } else { "" }
    );
    trace!("[tool] {name} full args: {rendered}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_spec() -> ToolSpec {
        ToolSpec::builder("echo")
            .description("Echo the coerced arguments back")
            .param("text", ParamType::String, "Text to echo")
            .handler(|args| async move { Ok(Value::Object(args)) })
            .build()
    }

    #[test]
    fn register_and_lookup() {
        let registry = ToolRegistry::new().with(echo_spec()).unwrap();
        assert!(registry.contains("echo"));
        assert!(!registry.contains("nope"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_spec()).unwrap();
        let err = registry.register(echo_spec()).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("echo".into()));
    }

    #[test]
    fn empty_param_description_is_rejected() {
        let spec = ToolSpec::builder("bad")
            .description("A tool with an undocumented parameter")
            .param("x", ParamType::Int, "")
            .handler(|_| async { Ok(Value::Null) })
            .build();
        let err = ToolRegistry::new().register(spec).unwrap_err();
        assert_eq!(
            err,
            RegistryError::MissingDescription {
                tool: "bad".into(),
                param: "x".into()
            }
        );
    }

    #[test]
    #[should_panic(expected = "ToolSpec requires 'handler'")]
    fn builder_panics_without_handler() {
        ToolSpec::builder("incomplete")
            .description("No handler attached")
            .build();
    }

    #[tokio::test]
    async fn unknown_tool_is_a_typed_error() {
        let registry = ToolRegistry::new();
        let err = registry.dispatch("ghost", &ArgMap::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { name } if name == "ghost"));
    }

    #[tokio::test]
    async fn missing_required_argument_names_the_parameter() {
        let registry = ToolRegistry::new().with(echo_spec()).unwrap();
        let err = registry.dispatch("echo", &ArgMap::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "missing argument 'text' for echo");
    }

    #[tokio::test]
    async fn optional_argument_gets_its_default() {
        let spec = ToolSpec::builder("greet")
            .description("Greet someone")
            .optional_param("who", ParamType::String, "Who to greet", Some(json!("world")))
            .optional_param("times", ParamType::Int, "Repeat count", None)
            .allow_empty_args()
            .handler(|args| async move { Ok(Value::Object(args)) })
            .build();
        let registry = ToolRegistry::new().with(spec).unwrap();
        let out = registry.dispatch("greet", &ArgMap::new()).await.unwrap();
        assert_eq!(out["who"], json!("world"));
        assert_eq!(out["times"], Value::Null);
    }

    #[tokio::test]
    async fn undeclared_arguments_are_dropped() {
        let registry = ToolRegistry::new().with(echo_spec()).unwrap();
        let mut args = ArgMap::new();
        args.insert("text".into(), json!("hi"));
        args.insert("extra".into(), json!(true));
        let out = registry.dispatch("echo", &args).await.unwrap();
        assert_eq!(out["text"], json!("hi"));
        assert!(out.get("extra").is_none());
    }

    #[tokio::test]
    async fn handler_domain_error_passes_through() {
        let spec = ToolSpec::builder("fail")
            .description("Always fails")
            .allow_empty_args()
            .handler(|_| async { Err("intentional failure".to_string()) })
            .build();
        let registry = ToolRegistry::new().with(spec).unwrap();
        let err = registry.dispatch("fail", &ArgMap::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::Handler { .. }));
        assert_eq!(err.to_string(), "intentional failure");
    }

    // ── Coercion ───────────────────────────────────────────────────

    #[test]
    fn int_coercion_accepts_numbers_and_numeric_strings() {
        assert_eq!(ParamType::Int.coerce(&json!(7)), Some(json!(7)));
        assert_eq!(ParamType::Int.coerce(&json!(3.9)), Some(json!(3)));
        assert_eq!(ParamType::Int.coerce(&json!("42")), Some(json!(42)));
        assert_eq!(ParamType::Int.coerce(&json!(" 42 ")), Some(json!(42)));
        assert_eq!(ParamType::Int.coerce(&json!("abc")), None);
        assert_eq!(ParamType::Int.coerce(&json!("3.5")), None);
        assert_eq!(ParamType::Int.coerce(&json!([1])), None);
    }

    #[test]
    fn float_coercion() {
        assert_eq!(ParamType::Float.coerce(&json!(2)), Some(json!(2.0)));
        assert_eq!(ParamType::Float.coerce(&json!("2.5")), Some(json!(2.5)));
        assert_eq!(ParamType::Float.coerce(&json!("abc")), None);
        assert_eq!(ParamType::Float.coerce(&json!(true)), Some(json!(1.0)));
        assert_eq!(ParamType::Float.coerce(&json!({})), None);
    }

    #[test]
    fn bool_coercion_never_fails() {
        assert_eq!(ParamType::Bool.coerce(&json!("yes")), Some(json!(true)));
        assert_eq!(ParamType::Bool.coerce(&json!("TRUE")), Some(json!(true)));
        assert_eq!(ParamType::Bool.coerce(&json!("1")), Some(json!(true)));
        assert_eq!(ParamType::Bool.coerce(&json!(1)), Some(json!(true)));
        assert_eq!(ParamType::Bool.coerce(&json!("no")), Some(json!(false)));
        assert_eq!(ParamType::Bool.coerce(&json!("maybe")), Some(json!(false)));
        assert_eq!(ParamType::Bool.coerce(&json!(false)), Some(json!(false)));
    }

    #[test]
    fn string_coercion_stringifies_anything() {
        assert_eq!(ParamType::String.coerce(&json!("hi")), Some(json!("hi")));
        assert_eq!(ParamType::String.coerce(&json!(5)), Some(json!("5")));
        assert_eq!(
            ParamType::String.coerce(&json!({"a": 1})),
            Some(json!(r#"{"a":1}"#))
        );
    }

    #[tokio::test]
    async fn coercion_failure_is_a_typed_error() {
        let spec = ToolSpec::builder("count")
            .description("Count things")
            .param("n", ParamType::Int, "How many")
            .handler(|_| async { Ok(Value::Null) })
            .build();
        let registry = ToolRegistry::new().with(spec).unwrap();
        let mut args = ArgMap::new();
        args.insert("n".into(), json!("abc"));
        let err = registry.dispatch("count", &args).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::Coercion { ref param, expected: "int", .. } if param == "n"
        ));
    }

    // ── Schema export and guide ────────────────────────────────────

    #[test]
    fn json_schema_marks_required_parameters() {
        let spec = ToolSpec::builder("lookup")
            .description("Look something up")
            .param("key", ParamType::String, "The key")
            .optional_param("limit", ParamType::Int, "Max results", Some(json!(10)))
            .handler(|_| async { Ok(Value::Null) })
            .build();
        let schema = spec.json_schema();
        assert_eq!(schema["name"], "lookup");
        assert_eq!(schema["parameters"]["type"], "object");
        assert_eq!(
            schema["parameters"]["properties"]["key"]["type"],
            "string"
        );
        assert_eq!(
            schema["parameters"]["properties"]["limit"]["type"],
            "integer"
        );
        assert_eq!(schema["parameters"]["required"], json!(["key"]));
    }

    #[test]
    fn guide_lists_every_tool_and_parameter() {
        let registry = ToolRegistry::new()
            .with(echo_spec())
            .unwrap()
            .with(
                ToolSpec::builder("now")
                    .description("Current time")
                    .allow_empty_args()
                    .handler(|_| async { Ok(Value::Null) })
                    .build(),
            )
            .unwrap();
        let guide = registry.render_guide();
        assert!(guide.contains("- echo: Echo the coerced arguments back"));
        assert!(guide.contains("text (string): Text to echo"));
        assert!(guide.contains("- now: Current time"));
        assert!(guide.contains(r#"{"name": "<tool>", "parameters": {...}}"#));
    }

    #[test]
    fn allows_empty_args_flag() {
        let registry = ToolRegistry::new()
            .with(
                ToolSpec::builder("now")
                    .description("Current time")
                    .allow_empty_args()
                    .handler(|_| async { Ok(Value::Null) })
                    .build(),
            )
            .unwrap();
        assert!(registry.allows_empty_args("now"));
        assert!(!registry.allows_empty_args("echo"));
    }
}

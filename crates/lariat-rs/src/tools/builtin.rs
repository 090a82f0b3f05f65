//! Built-in tools: calculator, compare, get_date, get_weather_details.
//!
//! These are the stock tools a default session carries. The calculator is a
//! self-contained arithmetic evaluator (no shelling out); the weather tool
//! talks to wttr.in with a short timeout and reports failures as a result
//! value rather than an error, so the model sees what went wrong.

use std::time::Duration;

use serde_json::{Map, Value, json};

use super::registry::{ParamType, RegistryError, ToolRegistry, ToolSpec};

/// A registry pre-loaded with all built-in tools.
pub fn builtin_registry() -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::new()
        .with(calculator_tool())?
        .with(compare_tool())?
        .with(get_date_tool())?
        .with(weather_tool())
}

/// `calculator(expression)` — evaluate an arithmetic expression.
pub fn calculator_tool() -> ToolSpec {
    ToolSpec::builder("calculator")
        .description(
            "Evaluate an arithmetic expression. Supports + - * / ^, parentheses, \
             constants pi and e, and functions like sin, cos, sqrt, log, pow.",
        )
        .param(
            "expression",
            ParamType::String,
            "The expression to evaluate, e.g. \"sqrt(2) * 2^3\"",
        )
        .handler(|args| async move {
            let expression = args
                .get("expression")
                .and_then(Value::as_str)
                .unwrap_or_default();
            expr::evaluate(expression).map(|v| json!(v))
        })
        .build()
}

/// `compare(expressions)` — evaluate several labelled expressions at once.
///
/// The argument arrives as a string (the schema's string coercion turns a
/// JSON object into its JSON text), so the handler re-parses it.
pub fn compare_tool() -> ToolSpec {
    ToolSpec::builder("compare")
        .description("Evaluate several labelled expressions and return all results.")
        .param(
            "expressions",
            ParamType::String,
            "JSON object mapping labels to expressions, e.g. {\"a\": \"2^3\", \"b\": \"3^2\"}",
        )
        .handler(|args| async move {
            let raw = args
                .get("expressions")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let labelled: Map<String, Value> = serde_json::from_str(raw)
                .map_err(|e| format!("expressions must be a JSON object: {e}"))?;
            let mut out = Map::new();
            for (label, value) in labelled {
                let expression = match &value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let result = match expr::evaluate(&expression) {
                    Ok(v) => json!(v),
                    Err(e) => json!(format!("Error: {e}")),
                };
                out.insert(label, result);
            }
            Ok(Value::Object(out))
        })
        .build()
}

/// `get_date()` — today's date as `YYYYMMDD`. Takes no arguments.
pub fn get_date_tool() -> ToolSpec {
    ToolSpec::builder("get_date")
        .description("Get today's date in YYYYMMDD format.")
        .allow_empty_args()
        .handler(|_args| async move {
            Ok(json!(chrono::Local::now().format("%Y%m%d").to_string()))
        })
        .build()
}

/// `get_weather_details(location)` — current conditions via wttr.in.
pub fn weather_tool() -> ToolSpec {
    ToolSpec::builder("get_weather_details")
        .description("Look up current weather conditions for a location.")
        .param("location", ParamType::String, "City or place name")
        .handler(|args| async move {
            let location = args
                .get("location")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(fetch_weather(&location).await)
        })
        .build()
}

/// Lookup failures become part of the result value so the model can react.
async fn fetch_weather(location: &str) -> Value {
    match try_fetch_weather(location).await {
        Ok(value) => value,
        Err(e) => json!({"error": e, "loc": location}),
    }
}

async fn try_fetch_weather(location: &str) -> Result<Value, String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| e.to_string())?;
    let url = format!("https://wttr.in/{location}?format=j1");
    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| e.to_string())?
        .error_for_status()
        .map_err(|e| e.to_string())?;
    let body: Value = resp.json().await.map_err(|e| e.to_string())?;
    let current = body["current_condition"]
        .get(0)
        .cloned()
        .ok_or_else(|| "missing current_condition".to_string())?;
    Ok(json!({
        "loc": location,
        "temp_C": current["temp_C"],
        "weather": current["weatherDesc"][0]["value"],
    }))
}

// ── Expression evaluator ───────────────────────────────────────────

/// Recursive-descent arithmetic evaluator backing the calculator tools.
///
/// Grammar (loosest to tightest): `+ -`, `* /`, unary minus, `^` (right
/// associative, binds tighter than unary minus), atoms. `**` is accepted
/// as a synonym for `^`.
pub mod expr {
    #[derive(Debug, Clone, PartialEq)]
    enum Token {
        Num(f64),
        Ident(String),
        Plus,
        Minus,
        Star,
        Slash,
        Caret,
        LParen,
        RParen,
        Comma,
    }

    /// Evaluate an expression to a number.
    pub fn evaluate(expression: &str) -> Result<f64, String> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser { tokens, pos: 0 };
        let value = parser.expr()?;
        parser.expect_end()?;
        Ok(value)
    }

    fn tokenize(input: &str) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        let mut chars = input.chars().peekable();
        while let Some(&c) = chars.peek() {
            match c {
                ' ' | '\t' | '\n' | '\r' => {
                    chars.next();
                }
                '0'..='9' | '.' => {
                    let mut text = String::new();
                    while let Some(&d) = chars.peek() {
                        if d.is_ascii_digit() || d == '.' {
                            text.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let value = text
                        .parse::<f64>()
                        .map_err(|_| format!("invalid number '{text}'"))?;
                    tokens.push(Token::Num(value));
                }
                'a'..='z' | 'A'..='Z' | '_' => {
                    let mut name = String::new();
                    while let Some(&d) = chars.peek() {
                        if d.is_ascii_alphanumeric() || d == '_' {
                            name.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    tokens.push(Token::Ident(name));
                }
                '+' => {
                    chars.next();
                    tokens.push(Token::Plus);
                }
                '-' => {
                    chars.next();
                    tokens.push(Token::Minus);
                }
                '*' => {
                    chars.next();
                    if chars.peek() == Some(&'*') {
                        chars.next();
                        tokens.push(Token::Caret);
                    } else {
                        tokens.push(Token::Star);
                    }
                }
                '/' => {
                    chars.next();
                    tokens.push(Token::Slash);
                }
                '^' => {
                    chars.next();
                    tokens.push(Token::Caret);
                }
                '(' => {
                    chars.next();
                    tokens.push(Token::LParen);
                }
                ')' => {
                    chars.next();
                    tokens.push(Token::RParen);
                }
                ',' => {
                    chars.next();
                    tokens.push(Token::Comma);
                }
                other => return Err(format!("unexpected character '{other}'")),
            }
        }
        Ok(tokens)
    }

    struct Parser {
        tokens: Vec<Token>,
        pos: usize,
    }

    impl Parser {
        fn peek(&self) -> Option<&Token> {
            self.tokens.get(self.pos)
        }

        fn next(&mut self) -> Option<Token> {
            let token = self.tokens.get(self.pos).cloned();
            if token.is_some() {
                self.pos += 1;
            }
            token
        }

        fn eat(&mut self, expected: &Token) -> bool {
            if self.peek() == Some(expected) {
                self.pos += 1;
                true
            } else {
                false
            }
        }

        fn expect_end(&self) -> Result<(), String> {
            match self.peek() {
                None => Ok(()),
                Some(token) => Err(format!("unexpected trailing input at {token:?}")),
            }
        }

        fn expr(&mut self) -> Result<f64, String> {
            let mut value = self.term()?;
            loop {
                if self.eat(&Token::Plus) {
                    value += self.term()?;
                } else if self.eat(&Token::Minus) {
                    value -= self.term()?;
                } else {
                    return Ok(value);
                }
            }
        }

        fn term(&mut self) -> Result<f64, String> {
            let mut value = self.unary()?;
            loop {
                if self.eat(&Token::Star) {
                    value *= self.unary()?;
                } else if self.eat(&Token::Slash) {
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= rhs;
                } else {
                    return Ok(value);
                }
            }
        }

        fn unary(&mut self) -> Result<f64, String> {
            if self.eat(&Token::Minus) {
                Ok(-self.unary()?)
            } else if self.eat(&Token::Plus) {
                self.unary()
            } else {
                self.power()
            }
        }

        fn power(&mut self) -> Result<f64, String> {
            let base = self.atom()?;
            if self.eat(&Token::Caret) {
                // Right associative; the exponent may carry its own sign.
                let exponent = self.unary()?;
                Ok(base.powf(exponent))
            } else {
                Ok(base)
            }
        }

        fn atom(&mut self) -> Result<f64, String> {
            match self.next() {
                Some(Token::Num(value)) => Ok(value),
                Some(Token::LParen) => {
                    let value = self.expr()?;
                    if self.eat(&Token::RParen) {
                        Ok(value)
                    } else {
                        Err("missing closing parenthesis".to_string())
                    }
                }
                Some(Token::Ident(name)) => {
                    if self.eat(&Token::LParen) {
                        let mut args = vec![self.expr()?];
                        while self.eat(&Token::Comma) {
                            args.push(self.expr()?);
                        }
                        if !self.eat(&Token::RParen) {
                            return Err("missing closing parenthesis".to_string());
                        }
                        apply(&name, &args)
                    } else {
                        constant(&name)
                    }
                }
                Some(token) => Err(format!("unexpected token {token:?}")),
                None => Err("unexpected end of expression".to_string()),
            }
        }
    }

    fn constant(name: &str) -> Result<f64, String> {
        match name {
            "pi" => Ok(std::f64::consts::PI),
            "e" => Ok(std::f64::consts::E),
            _ => Err(format!("unrecognized name: {name}")),
        }
    }

    fn apply(name: &str, args: &[f64]) -> Result<f64, String> {
        match (name, args) {
            ("sin", [x]) => Ok(x.sin()),
            ("cos", [x]) => Ok(x.cos()),
            ("tan", [x]) => Ok(x.tan()),
            ("asin", [x]) => Ok(x.asin()),
            ("acos", [x]) => Ok(x.acos()),
            ("atan", [x]) => Ok(x.atan()),
            ("log", [x]) => Ok(x.ln()),
            ("exp", [x]) => Ok(x.exp()),
            ("sqrt", [x]) => Ok(x.sqrt()),
            ("floor", [x]) => Ok(x.floor()),
            ("ceil", [x]) => Ok(x.ceil()),
            ("degrees", [x]) => Ok(x.to_degrees()),
            ("radians", [x]) => Ok(x.to_radians()),
            ("pow", [x, y]) => Ok(x.powf(*y)),
            (
                "sin" | "cos" | "tan" | "asin" | "acos" | "atan" | "log" | "exp" | "sqrt"
                | "floor" | "ceil" | "degrees" | "radians" | "pow",
                _,
            ) => Err(format!("wrong number of arguments for {name}")),
            _ => Err(format!("unrecognized name: {name}")),
        }
    }
}

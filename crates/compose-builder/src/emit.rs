//! Text emitter
//!
//! Renders a [Value] tree as an indentation based document (a YAML subset).
//!
//! The output is *not* produced by a general purpose serializer because a few keys need a
//! specific shape:
//!
//! - `command`, `entrypoint` and any nested `test` render a list of strings as a single line
//!   flow sequence: `command: ["npm", "start"]`
//! - a nested `content` string spanning multiple lines renders as a literal block (`|`)
//! - strings are only quoted when they have to be, port mappings (`8080:80/tcp`), integers and
//!   memory sizes (`512m`) stay bare even though they start with a digit
//!
//! Every nesting level is indented by two spaces, sequence items one level deeper than their key.
//! [Value::Absent] entries are skipped together with their key.
use crate::value::Value;
use indexmap::IndexMap;
use regex::Regex;

const INDENT: &str = "  ";

lazy_static::lazy_static! {
    /// `80`, `8080:80`, `8080:80/tcp`, `53/udp`
    static ref PORT_MAPPING: Regex =
        Regex::new(r"^\d+(:\d+)?(/\w+)?$").expect("port pattern is valid");

    /// `512m`, `2g`, `1024`, `64kb`
    static ref MEMORY_SIZE: Regex =
        Regex::new(r"^\d+[kmgKMG]?[bB]?$").expect("memory pattern is valid");

    static ref NEEDS_QUOTES: Regex =
        Regex::new(r#"^[\d-]|[:{}\[\],&*#?|<>'"%@`]"#).expect("quote pattern is valid");

    /// Plain spellings a reader resolves to null, a float or a signed integer: `~`, `null`,
    /// `.5`, `+1`, `.inf`, `.nan`
    static ref RESERVED: Regex = Regex::new(
        r"^(~|null|Null|NULL|[-+]?\.(inf|Inf|INF)|\.(nan|NaN|NAN)|\+?\.\d+([eE][-+]?\d+)?|\+\d[\d.]*([eE][-+]?\d+)?)$"
    )
    .expect("reserved pattern is valid");
}

/// Render a whole document
///
/// The result has no leading and no trailing newline.
pub fn emit(value: &Value) -> String {
    let rendered = render(value, 0, "");
    match rendered.strip_prefix('\n') {
        Some(stripped) => stripped.to_string(),
        None => rendered,
    }
}

/// Render `value` at nesting level `indent`
///
/// `parent_key` is the key the value is stored under (empty at the root).
pub fn render(value: &Value, indent: usize, parent_key: &str) -> String {
    match value {
        Value::Absent => String::new(),
        Value::Boolean(value) => value.to_string(),
        Value::Integer(value) => value.to_string(),
        Value::String(value) => scalar(value),
        Value::Array(items) => {
            if is_flow_key(parent_key, indent.saturating_sub(1)) {
                if let Some(flow) = flow_sequence(items) {
                    return flow;
                }
            }
            render_array(items, indent, parent_key)
        }
        Value::Object(entries) => render_object(entries, indent),
    }
}

fn render_object(entries: &IndexMap<String, Value>, indent: usize) -> String {
    let pad = INDENT.repeat(indent);
    let mut out = String::new();

    for (key, value) in entries {
        match value {
            Value::Absent => continue,
            Value::Object(object) if is_empty_object(object) => {
                out.push_str(&format!("\n{pad}{key}: {{}}"));
            }
            Value::Object(object) => {
                out.push_str(&format!("\n{pad}{key}:"));
                out.push_str(&render_object(object, indent + 1));
            }
            Value::Array(items) => {
                let flow = is_flow_key(key, indent)
                    .then(|| flow_sequence(items))
                    .flatten();

                if let Some(flow) = flow {
                    out.push_str(&format!("\n{pad}{key}: {flow}"));
                } else if items.iter().all(Value::is_absent) {
                    out.push_str(&format!("\n{pad}{key}: []"));
                } else {
                    out.push_str(&format!("\n{pad}{key}:"));
                    out.push_str(&render_array(items, indent + 1, key));
                }
            }
            Value::String(text) if key == "content" && indent > 0 && is_block_text(text) => {
                out.push_str(&format!("\n{pad}{key}: |"));
                out.push_str(&block_literal(text, indent + 1));
            }
            Value::String(text) if text.is_empty() => {
                out.push_str(&format!("\n{pad}{key}:"));
            }
            scalar_value => {
                let rendered = render(scalar_value, indent + 1, key);
                out.push_str(&format!("\n{pad}{key}: {rendered}"));
            }
        }
    }

    out
}

fn render_array(items: &[Value], indent: usize, parent_key: &str) -> String {
    let pad = INDENT.repeat(indent);
    let mut out = String::new();

    for item in items {
        let rendered = match item {
            Value::Absent => continue,
            Value::Object(object) if is_empty_object(object) => "{}".to_string(),
            Value::Object(object) => render_object(object, indent + 1).trim_start().to_string(),
            Value::Array(nested) if nested.iter().all(Value::is_absent) => "[]".to_string(),
            Value::Array(nested) => render_array(nested, indent + 1, parent_key)
                .trim_start()
                .to_string(),
            Value::String(text) if text.is_empty() => "\"\"".to_string(),
            scalar_value => render(scalar_value, indent + 1, parent_key),
        };

        out.push_str(&format!("\n{pad}- {rendered}"));
    }

    out
}

/// `[command|entrypoint]` anywhere, `test` below the top level
fn is_flow_key(key: &str, indent: usize) -> bool {
    matches!(key, "command" | "entrypoint") || (key == "test" && indent > 0)
}

/// Single line sequence, only if every (present) item is a string
fn flow_sequence(items: &[Value]) -> Option<String> {
    let strings: Option<Vec<&str>> = items
        .iter()
        .filter(|item| !item.is_absent())
        .map(Value::as_str)
        .collect();

    let strings = strings.filter(|strings| !strings.is_empty())?;
    let quoted: Vec<String> = strings.into_iter().map(quote).collect();

    Some(format!("[{}]", quoted.join(", ")))
}

/// Lines of `text` indented to `indent`, a single trailing empty line is dropped
fn block_literal(text: &str, indent: usize) -> String {
    let pad = INDENT.repeat(indent);
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }

    lines
        .into_iter()
        .map(|line| {
            if line.is_empty() {
                "\n".to_string()
            } else {
                format!("\n{pad}{line}")
            }
        })
        .collect()
}

/// Multi-line text without control characters a literal block cannot hold
fn is_block_text(text: &str) -> bool {
    text.contains('\n')
        && !text
            .chars()
            .any(|c| c.is_control() && !matches!(c, '\n' | '\t'))
}

fn is_empty_object(object: &IndexMap<String, Value>) -> bool {
    object.values().all(Value::is_absent)
}

/// A string in value position, quoted only if needed
pub fn scalar(text: &str) -> String {
    if PORT_MAPPING.is_match(text) || MEMORY_SIZE.is_match(text) {
        return text.to_string();
    }

    if NEEDS_QUOTES.is_match(text)
        || RESERVED.is_match(text)
        || text.trim() != text
        || text.chars().any(char::is_control)
    {
        return quote(text);
    }

    text.to_string()
}

/// Double quoted with `\`, `"` and control characters escaped
fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04X}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn object<const N: usize>(entries: [(&str, Value); N]) -> Value {
        entries.into_iter().collect()
    }

    #[test]
    fn nested_maps_and_sequences() {
        let document = object([(
            "services",
            object([(
                "web",
                object([
                    ("image", "nginx:latest".into()),
                    ("restart", Value::Absent),
                    ("ports", vec!["8080:80/tcp", "443"].into()),
                    ("command", vec!["npm", "start"].into()),
                    ("privileged", true.into()),
                ]),
            )]),
        )]);

        let expected = "\
services:
  web:
    image: \"nginx:latest\"
    ports:
      - 8080:80/tcp
      - 443
    command: [\"npm\", \"start\"]
    privileged: true";

        assert_eq!(emit(&document), expected);
    }

    #[test]
    fn sequence_of_objects() {
        let document = object([(
            "volumes",
            vec![
                object([
                    ("type", "bind".into()),
                    ("source", "./data".into()),
                    ("target", "/data".into()),
                ]),
                object([("type", "volume".into()), ("target", "/cache".into())]),
            ]
            .into(),
        )]);

        let expected = "\
volumes:
  - type: bind
    source: ./data
    target: /data
  - type: volume
    target: /cache";

        assert_eq!(emit(&document), expected);
    }

    #[test]
    fn quoting() {
        assert_eq!(scalar("512m"), "512m");
        assert_eq!(scalar("8080:8080/tcp"), "8080:8080/tcp");
        assert_eq!(scalar("1000"), "1000");
        assert_eq!(scalar(": special"), "\": special\"");
        assert_eq!(scalar("say \"hi\": now"), "\"say \\\"hi\\\": now\"");
        assert_eq!(scalar("-flag"), "\"-flag\"");
        assert_eq!(scalar("30s"), "\"30s\"");
        assert_eq!(scalar(" padded"), "\" padded\"");
        assert_eq!(scalar("${TS_AUTHKEY}"), "\"${TS_AUTHKEY}\"");
        assert_eq!(scalar("/var/lib/tailscale"), "/var/lib/tailscale");
        assert_eq!(scalar("KEY=value"), "KEY=value");
    }

    #[test]
    fn test_key_is_flow_only_when_nested() {
        let document = object([
            ("test", vec!["a", "b"].into()),
            (
                "healthcheck",
                object([("test", vec!["CMD", "true"].into())]),
            ),
        ]);

        let expected = "\
test:
  - a
  - b
healthcheck:
  test: [\"CMD\", \"true\"]";

        assert_eq!(emit(&document), expected);
    }

    #[test]
    fn flow_items_escape_quotes() {
        let document = object([("command", vec!["echo", "say \"hi\""].into())]);
        assert_eq!(emit(&document), r#"command: ["echo", "say \"hi\""]"#);
    }

    #[test]
    fn content_block_literal() {
        let document = object([(
            "configs",
            object([(
                "serve-config",
                object([("content", "{\n  \"TCP\": {}\n}\n".into())]),
            )]),
        )]);

        let expected = "\
configs:
  serve-config:
    content: |
      {
        \"TCP\": {}
      }";

        assert_eq!(emit(&document), expected);
    }

    #[test]
    fn content_at_root_is_a_quoted_scalar() {
        let document = object([("content", "a\nb".into())]);
        assert_eq!(emit(&document), r#"content: "a\nb""#);
    }

    #[test]
    fn escapes_backslashes_and_control_characters() {
        assert_eq!(scalar(r"C:\Users\me"), r#""C:\\Users\\me""#);
        assert_eq!(scalar("line1\nline2: x"), r#""line1\nline2: x""#);
        assert_eq!(scalar("a\tb"), r#""a\tb""#);
        assert_eq!(scalar("bell\u{7}"), r#""bell\u0007""#);
        assert_eq!(scalar(r"plain\path"), r"plain\path");

        let document = object([("command", vec![r"C:\run.bat", "a\nb"].into())]);
        assert_eq!(emit(&document), r#"command: ["C:\\run.bat", "a\nb"]"#);
    }

    #[test]
    fn reserved_spellings_are_quoted() {
        for reserved in ["null", "Null", "NULL", "~", ".5", "+1", "+.5", ".inf", "+.INF", ".nan"] {
            assert_eq!(scalar(reserved), format!("\"{reserved}\""));
        }

        assert_eq!(scalar("nullable"), "nullable");
        assert_eq!(scalar("~user"), "~user");
        assert_eq!(scalar("v1.5"), "v1.5");
    }

    #[test]
    fn empty_values() {
        let document = object([
            ("nofile", object([("soft", Value::Absent)])),
            ("B", "".into()),
            ("list", Value::Array(vec![])),
        ]);

        assert_eq!(emit(&document), "nofile: {}\nB:\nlist: []");
    }
}

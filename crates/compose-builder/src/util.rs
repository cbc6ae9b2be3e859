use crate::model::KeyValue;
use regex::Regex;

lazy_static::lazy_static! {
    /// A double quoted span, a single quoted span or a run of non-whitespace
    static ref COMMAND_TOKEN: Regex =
        Regex::new(r#"(?:"[^"]*"|'[^']*'|\S+)"#).expect("token pattern is valid");
}

/// Split a `command`/`entrypoint`/`test` string into its arguments
///
/// A JSON array (`["npm", "run", "dev"]`) is taken as-is. Anything else is tokenized on
/// whitespace, keeping quoted spans together and removing the quote characters around a token.
pub fn parse_command(command: &str) -> Vec<String> {
    if command.trim().is_empty() {
        return vec![];
    }

    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(command) {
        return items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
    }

    tracing::trace!(command, "not a JSON array, tokenizing");

    COMMAND_TOKEN
        .find_iter(command)
        .map(|token| strip_quotes(token.as_str()).to_string())
        .collect()
}

/// Remove one quote character from each end
fn strip_quotes(token: &str) -> &str {
    let token = token.strip_prefix(['"', '\'']).unwrap_or(token);
    token.strip_suffix(['"', '\'']).unwrap_or(token)
}

/// Inverse of [parse_command] for documents that store the exec form
pub fn command_to_string(args: &[String]) -> String {
    serde_json::to_string(args).unwrap_or_default()
}

/// `KEY=value` → (`KEY`, `value`), a missing `=` yields an empty value
pub fn split_key_value(entry: &str) -> KeyValue {
    match entry.split_once('=') {
        Some((key, value)) => KeyValue::new(key, value),
        None => KeyValue::new(entry, ""),
    }
}

/// Comma separated list, items trimmed, empty items dropped
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_array() {
        assert_eq!(
            parse_command(r#"["npm", "run", "dev"]"#),
            vec!["npm", "run", "dev"]
        );
        assert_eq!(parse_command(r#"["sleep", 10]"#), vec!["sleep", "10"]);
    }

    #[test]
    fn shell_form() {
        assert_eq!(
            parse_command(r#"sh -c "echo hello world" 'single quoted'"#),
            vec!["sh", "-c", "echo hello world", "single quoted"]
        );
        assert_eq!(
            parse_command("curl -f http://localhost || exit 1"),
            vec!["curl", "-f", "http://localhost", "||", "exit", "1"]
        );
    }

    #[test]
    fn json_that_is_not_an_array_is_tokenized() {
        assert_eq!(parse_command(r#"{"a": 1}"#), vec![r#"{"a":"#, "1}"]);
    }

    #[test]
    fn empty_command() {
        assert!(parse_command("").is_empty());
        assert!(parse_command("   ").is_empty());
    }

    #[test]
    fn command_round_trip() {
        let args = parse_command("python -m http.server 8000");
        assert_eq!(command_to_string(&args), r#"["python","-m","http.server","8000"]"#);
        assert_eq!(parse_command(&command_to_string(&args)), args);
    }

    #[test]
    fn key_value() {
        assert_eq!(split_key_value("A=1=2"), KeyValue::new("A", "1=2"));
        assert_eq!(split_key_value("A"), KeyValue::new("A", ""));
    }

    #[test]
    fn list() {
        assert_eq!(split_list(".env, prod.env,,"), vec![".env", "prod.env"]);
    }
}

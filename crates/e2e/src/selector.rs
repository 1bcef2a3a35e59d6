//! Element selectors and fallback chains
//!
//! The markup of the employees screen is not guaranteed stable, so every
//! logical element is described by a [`SelectorChain`]: an ordered list of
//! alternative [`Selector`]s. Consumers try them in order and the first one
//! that matches at least one element wins.
//!
//! Selectors are written in the Playwright-flavoured notation the suite has
//! always used:
//!
//! ```text
//! tbody tr                       plain CSS
//! button:has-text("Trade")       CSS filtered by contained text
//! text=Good Evening              innermost element containing the text
//! text=/\d+\s+Employees/         innermost element whose text matches
//! role=dialog                    ARIA role
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// A single element-matching expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    /// Plain CSS selector
    Css { css: String },

    /// CSS selector whose matches must contain `text` (case-insensitive)
    HasText { css: String, text: String },

    /// Innermost element containing `text` (case-insensitive, whitespace-normalized)
    Text { text: String },

    /// Innermost element whose text matches a regular expression
    TextRegex { source: String, flags: String },

    /// Elements carrying the given ARIA role
    Role { role: String },
}

impl Selector {
    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css { css: css.into() }
    }

    pub fn has_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Selector::HasText {
            css: css.into(),
            text: text.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Selector::Text { text: text.into() }
    }

    /// Regex source must be valid for both the `regex` crate and JavaScript.
    pub fn text_regex(source: impl Into<String>) -> Self {
        Selector::TextRegex {
            source: source.into(),
            flags: String::new(),
        }
    }

    pub fn role(role: impl Into<String>) -> Self {
        Selector::Role { role: role.into() }
    }

    /// Parse one selector expression.
    pub fn parse(input: &str) -> E2eResult<Self> {
        let expr = input.trim();
        if expr.is_empty() {
            return Err(invalid(input, "empty selector"));
        }

        if let Some(rest) = expr.strip_prefix("text=") {
            return parse_text(input, rest.trim());
        }

        if let Some(role) = expr.strip_prefix("role=") {
            let role = unquote(role.trim());
            if role.is_empty() {
                return Err(invalid(input, "missing role name"));
            }
            return Ok(Selector::role(role));
        }

        if let Some(idx) = expr.find(":has-text(") {
            let css = expr[..idx].trim();
            let inner = &expr[idx + ":has-text(".len()..];
            let inner = inner
                .strip_suffix(')')
                .ok_or_else(|| invalid(input, "unterminated :has-text("))?;
            let text = unquote(inner.trim());
            if text.is_empty() {
                return Err(invalid(input, ":has-text() needs a value"));
            }
            let css = if css.is_empty() { "*" } else { css };
            return Ok(Selector::has_text(css, text));
        }

        Ok(Selector::css(expr))
    }

    /// Check the regex of a `TextRegex` selector compiles.
    pub fn validate(&self) -> E2eResult<()> {
        if let Selector::TextRegex { source, flags } = self {
            let pattern = if flags.contains('i') {
                format!("(?i){}", source)
            } else {
                source.clone()
            };
            regex::Regex::new(&pattern).map_err(|e| E2eError::InvalidSelector {
                selector: self.to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

fn parse_text(input: &str, rest: &str) -> E2eResult<Selector> {
    if let Some(body) = rest.strip_prefix('/') {
        let end = body
            .rfind('/')
            .ok_or_else(|| invalid(input, "unterminated regex"))?;
        let source = &body[..end];
        let flags = &body[end + 1..];
        if source.is_empty() {
            return Err(invalid(input, "empty regex"));
        }
        if let Some(bad) = flags.chars().find(|c| !matches!(c, 'i' | 'm' | 's' | 'u')) {
            return Err(invalid(input, &format!("unsupported regex flag '{}'", bad)));
        }
        let selector = Selector::TextRegex {
            source: source.to_string(),
            flags: flags.to_string(),
        };
        selector.validate()?;
        return Ok(selector);
    }

    let text = unquote(rest);
    if text.is_empty() {
        return Err(invalid(input, "text= needs a value"));
    }
    Ok(Selector::text(text))
}

fn unquote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn invalid(selector: &str, reason: &str) -> E2eError {
    E2eError::InvalidSelector {
        selector: selector.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css { css } => write!(f, "{}", css),
            Selector::HasText { css, text } => write!(f, "{}:has-text(\"{}\")", css, text),
            Selector::Text { text } => write!(f, "text={}", text),
            Selector::TextRegex { source, flags } => write!(f, "text=/{}/{}", source, flags),
            Selector::Role { role } => write!(f, "role={}", role),
        }
    }
}

impl std::str::FromStr for Selector {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

/// Ordered, non-empty list of alternative selectors; first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChainRepr")]
pub struct SelectorChain(Vec<Selector>);

/// Accepted YAML shapes: `"a, b"` or `["a", "b"]`
#[derive(Deserialize)]
#[serde(untagged)]
enum ChainRepr {
    One(String),
    Many(Vec<String>),
}

impl TryFrom<ChainRepr> for SelectorChain {
    type Error = E2eError;

    fn try_from(repr: ChainRepr) -> Result<Self, Self::Error> {
        match repr {
            ChainRepr::One(s) => SelectorChain::parse(&s),
            ChainRepr::Many(items) => {
                let mut selectors = Vec::new();
                for item in &items {
                    selectors.extend(SelectorChain::parse(item)?.0);
                }
                SelectorChain::new(selectors)
            }
        }
    }
}

impl SelectorChain {
    pub fn new(selectors: Vec<Selector>) -> E2eResult<Self> {
        if selectors.is_empty() {
            return Err(E2eError::InvalidSelector {
                selector: String::new(),
                reason: "selector chain must not be empty".to_string(),
            });
        }
        Ok(Self(selectors))
    }

    pub fn single(selector: Selector) -> Self {
        Self(vec![selector])
    }

    /// Append a lower-priority alternative.
    pub fn or(mut self, selector: Selector) -> Self {
        self.0.push(selector);
        self
    }

    /// Parse a comma-separated list of selector expressions.
    ///
    /// Commas inside quotes, brackets, parentheses and `text=/.../` regexes do
    /// not split.
    pub fn parse(input: &str) -> E2eResult<Self> {
        let selectors = split_top_level(input)
            .into_iter()
            .map(Selector::parse)
            .collect::<E2eResult<Vec<_>>>()?;
        Self::new(selectors)
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Selector> {
        self.0.iter()
    }

    /// JSON array literal consumed by the in-page resolver.
    pub fn to_js(&self) -> E2eResult<String> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

impl From<Selector> for SelectorChain {
    fn from(selector: Selector) -> Self {
        Self::single(selector)
    }
}

impl fmt::Display for SelectorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, selector) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", selector)?;
        }
        Ok(())
    }
}

fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '/' if input[start..i].trim_start() == "text=" => quote = Some('/'),
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(input[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("tbody tr", Selector::css("tbody tr"); "plain css")]
    #[test_case("button:has-text(\"Add Employee\")", Selector::has_text("button", "Add Employee"); "has text")]
    #[test_case("h1:has-text('Employees')", Selector::has_text("h1", "Employees"); "single quoted")]
    #[test_case("text=Good Evening", Selector::text("Good Evening"); "text literal")]
    #[test_case("text=\"Choose Employees Type\"", Selector::text("Choose Employees Type"); "quoted text")]
    #[test_case("text=/\\d+\\s+Employees/", Selector::text_regex(r"\d+\s+Employees"); "text regex")]
    #[test_case("role=dialog", Selector::role("dialog"); "role")]
    fn parses_selector(input: &str, expected: Selector) {
        assert_eq!(Selector::parse(input).unwrap(), expected);
    }

    #[test_case(""; "empty")]
    #[test_case("text="; "empty text")]
    #[test_case("text=/(unclosed/"; "bad regex")]
    #[test_case("button:has-text(\"x\""; "unterminated has text")]
    #[test_case("text=/abc/g"; "unsupported flag")]
    fn rejects_selector(input: &str) {
        assert!(matches!(
            Selector::parse(input),
            Err(E2eError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn chain_keeps_priority_order() {
        let chain = SelectorChain::parse(
            r#"input[type="text"], input[name="username"], input[placeholder*="Username"]"#,
        )
        .unwrap();
        assert_eq!(
            chain.selectors(),
            &[
                Selector::css(r#"input[type="text"]"#),
                Selector::css(r#"input[name="username"]"#),
                Selector::css(r#"input[placeholder*="Username"]"#),
            ]
        );
    }

    #[test]
    fn chain_does_not_split_inside_quotes_or_regex() {
        let chain =
            SelectorChain::parse(r#"button:has-text("Save, close"), text=/\d{1,3}\s+Employees/"#)
                .unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.selectors()[0], Selector::has_text("button", "Save, close"));
        assert_eq!(chain.selectors()[1], Selector::text_regex(r"\d{1,3}\s+Employees"));
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert!(SelectorChain::parse(" , ").is_err());
        assert!(SelectorChain::new(vec![]).is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let chain = SelectorChain::single(Selector::has_text("button", "Status"))
            .or(Selector::text_regex(r"\d+\s+Employees"))
            .or(Selector::role("dialog"));
        let reparsed = SelectorChain::parse(&chain.to_string()).unwrap();
        assert_eq!(reparsed, chain);
    }

    #[test]
    fn js_literal_is_tagged_json() {
        let chain = SelectorChain::single(Selector::has_text("button", "Trade"));
        let value: serde_json::Value = serde_json::from_str(&chain.to_js().unwrap()).unwrap();
        assert_eq!(value[0]["kind"], "has_text");
        assert_eq!(value[0]["css"], "button");
        assert_eq!(value[0]["text"], "Trade");
    }

    #[test]
    fn chain_deserializes_from_string_or_list() {
        let from_str: SelectorChain = serde_yaml::from_str("\"tbody tr, role=row\"").unwrap();
        let from_list: SelectorChain = serde_yaml::from_str("- tbody tr\n- role=row\n").unwrap();
        assert_eq!(from_str, from_list);
        assert_eq!(from_str.len(), 2);
    }
}

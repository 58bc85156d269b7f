//! Rule grammar — Traefik-style rule parsing and matching
//!
//! Parses expressions like:
//! ```text
//! Host(`api.example.com`) && PathPrefix(`/v1`) || Path(`/health`)
//! ```
//! `&&` binds tighter than `||`. Backtick-quoted arguments may contain
//! the operator characters. Parentheses only delimit matcher arguments:
//! `(A || B) && C` is rejected and must be written `A && C || B && C`.

use http::HeaderMap;

/// A single matcher condition
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Match by hostname: `Host(`domain`)`
    Host(String),
    /// Match by exact path: `Path(`/exact`)`
    Path(String),
    /// Match by path prefix: `PathPrefix(`/prefix`)`
    PathPrefix(String),
    /// Match by HTTP method: `Method(`GET`)`
    Method(String),
    /// Match by header key-value: `Headers(`key`, `value`)`
    Headers(String, String),
}

impl Matcher {
    fn matches(&self, host: Option<&str>, path: &str, method: &str, headers: &HeaderMap) -> bool {
        match self {
            Matcher::Host(expected) => host
                .map(|h| strip_port(h).eq_ignore_ascii_case(expected))
                .unwrap_or(false),
            Matcher::Path(expected) => path == expected,
            Matcher::PathPrefix(prefix) => path.starts_with(prefix.as_str()),
            Matcher::Method(expected) => method.eq_ignore_ascii_case(expected),
            Matcher::Headers(key, value) => headers
                .get(key.as_str())
                .and_then(|v| v.to_str().ok())
                .map(|v| v == value)
                .unwrap_or(false),
        }
    }
}

/// A compiled rule in disjunctive normal form: any alternative whose
/// matchers all match makes the rule match
#[derive(Debug, Clone)]
pub struct Rule {
    alternatives: Vec<Vec<Matcher>>,
}

impl Rule {
    /// Parse a rule expression string
    ///
    /// # Examples
    ///
    /// ```
    /// use a3s_router::router::Rule;
    ///
    /// let rule = Rule::parse("Host(`example.com`) && PathPrefix(`/api`)").unwrap();
    /// assert_eq!(rule.matcher_count(), 2);
    /// ```
    pub fn parse(input: &str) -> Result<Self, String> {
        if input.trim().is_empty() {
            return Err("Rule must contain at least one matcher".to_string());
        }

        let mut alternatives = Vec::new();
        for branch in split_top_level(input, "||")? {
            let mut matchers = Vec::new();
            for part in split_top_level(branch, "&&")? {
                matchers.push(Self::parse_matcher(part)?);
            }
            alternatives.push(matchers);
        }

        Ok(Self { alternatives })
    }

    fn parse_matcher(input: &str) -> Result<Matcher, String> {
        let input = input.trim();
        if input.is_empty() {
            return Err("Empty matcher expression".to_string());
        }

        let paren_start = input
            .find('(')
            .ok_or_else(|| format!("Invalid matcher syntax, expected '(': {}", input))?;
        if !input.ends_with(')') {
            return Err(format!("Invalid matcher syntax, expected ')': {}", input));
        }

        let name = input[..paren_start].trim();
        let args = Self::parse_args(&input[paren_start + 1..input.len() - 1])?;

        let expect = |n: usize| -> Result<(), String> {
            if args.len() == n {
                Ok(())
            } else if n == 1 {
                Err(format!("{}() expects 1 argument, got {}", name, args.len()))
            } else {
                Err(format!("{}() expects {} arguments, got {}", name, n, args.len()))
            }
        };

        match name {
            "Host" => {
                expect(1)?;
                Ok(Matcher::Host(args[0].clone()))
            }
            "Path" => {
                expect(1)?;
                Ok(Matcher::Path(args[0].clone()))
            }
            "PathPrefix" => {
                expect(1)?;
                Ok(Matcher::PathPrefix(args[0].clone()))
            }
            "Method" => {
                expect(1)?;
                Ok(Matcher::Method(args[0].clone()))
            }
            "Headers" => {
                expect(2)?;
                Ok(Matcher::Headers(args[0].clone(), args[1].clone()))
            }
            _ => Err(format!("Unknown matcher: {}", name)),
        }
    }

    /// Parse backtick-delimited arguments: `arg1`, `arg2`
    fn parse_args(input: &str) -> Result<Vec<String>, String> {
        let mut args = Vec::new();
        let mut chars = input.chars().peekable();

        loop {
            while chars
                .peek()
                .map(|c| c.is_whitespace() || *c == ',')
                .unwrap_or(false)
            {
                chars.next();
            }

            match chars.next() {
                None => break,
                Some('`') => {}
                Some(c) => return Err(format!("Expected backtick, got '{}'", c)),
            }

            let mut arg = String::new();
            loop {
                match chars.next() {
                    Some('`') => break,
                    Some(c) => arg.push(c),
                    None => return Err("Unterminated backtick argument".to_string()),
                }
            }
            args.push(arg);
        }

        Ok(args)
    }

    /// Check if this rule matches the given request attributes
    pub fn matches(
        &self,
        host: Option<&str>,
        path: &str,
        method: &str,
        headers: &HeaderMap,
    ) -> bool {
        self.alternatives
            .iter()
            .any(|all| all.iter().all(|m| m.matches(host, path, method, headers)))
    }

    /// Total number of matchers across all alternatives
    pub fn matcher_count(&self) -> usize {
        self.alternatives.iter().map(Vec::len).sum()
    }
}

/// Split on `sep` outside backtick-quoted arguments
fn split_top_level<'a>(input: &'a str, sep: &str) -> Result<Vec<&'a str>, String> {
    let mut parts = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'`' {
            in_quote = !in_quote;
        } else if !in_quote && bytes[i..].starts_with(sep.as_bytes()) {
            parts.push(&input[start..i]);
            i += sep.len();
            start = i;
            continue;
        }
        i += 1;
    }

    if in_quote {
        return Err("Unterminated backtick argument".to_string());
    }
    parts.push(&input[start..]);
    Ok(parts)
}

/// Drop a trailing `:port` from a host, keeping bracketed IPv6 literals
fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

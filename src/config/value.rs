//! `eval:` and `file:` value transforms.
//!
//! `eval:` does not run arbitrary code. It accepts a small expression
//! language:
//!
//! ```text
//! expr := term ( '+' term )*
//! term := "literal" | 'literal'
//!       | env(NAME) | env(NAME, expr)
//!       | lower(expr) | upper(expr) | trim(expr)
//! ```
//!
//! `file:PATH` is replaced by the contents of `PATH`. When those contents are
//! themselves an `eval:` value they are evaluated too.

use std::path::Path;

use crate::Error;
use crate::environment::EnvSnapshot;

pub const EVAL_PREFIX: &str = "eval:";
pub const FILE_PREFIX: &str = "file:";

pub fn transform(raw: &str, env: &EnvSnapshot, base_dir: &Path) -> crate::Result<String> {
    if let Some(expr) = raw.strip_prefix(EVAL_PREFIX) {
        return evaluate(expr, env);
    }

    if let Some(path) = raw.strip_prefix(FILE_PREFIX) {
        let path = base_dir.join(path.trim());
        let contents = std::fs::read_to_string(&path).map_err(|e| Error::ConfigEval {
            expression: raw.to_string(),
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        return match contents.trim().strip_prefix(EVAL_PREFIX) {
            Some(expr) => evaluate(expr, env),
            None => Ok(contents),
        };
    }

    Ok(raw.to_string())
}

/// Evaluate an expression (without the `eval:` prefix).
pub fn evaluate(expr: &str, env: &EnvSnapshot) -> crate::Result<String> {
    let mut parser = Parser { src: expr, pos: 0, env };
    parser
        .parse_expr()
        .and_then(|value| {
            parser.skip_ws();
            match parser.peek() {
                None => Ok(value),
                Some(c) => Err(format!("unexpected '{}' at offset {}", c, parser.pos)),
            }
        })
        .map_err(|reason| Error::ConfigEval {
            expression: format!("{EVAL_PREFIX}{expr}"),
            reason,
        })
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    env: &'a EnvSnapshot,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        if self.eat(expected) {
            Ok(())
        } else {
            match self.peek() {
                Some(c) => Err(format!(
                    "expected '{}' but found '{}' at offset {}",
                    expected, c, self.pos
                )),
                None => Err(format!("expected '{}' at end of expression", expected)),
            }
        }
    }

    fn parse_expr(&mut self) -> Result<String, String> {
        let mut out = self.parse_term()?;
        while self.eat('+') {
            out.push_str(&self.parse_term()?);
        }
        Ok(out)
    }

    fn parse_term(&mut self) -> Result<String, String> {
        self.skip_ws();
        match self.peek() {
            Some(quote @ ('"' | '\'')) => self.parse_string(quote),
            Some(c) if c.is_ascii_alphabetic() => {
                let name = self.parse_ident();
                self.parse_call(&name)
            }
            Some(c) => Err(format!("unexpected '{}' at offset {}", c, self.pos)),
            None => Err("unexpected end of expression".into()),
        }
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn parse_string(&mut self, quote: char) -> Result<String, String> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => break,
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(format!("unterminated string starting at offset {}", start))
    }

    fn parse_call(&mut self, name: &str) -> Result<String, String> {
        self.expect('(')?;
        let value = match name {
            "env" => {
                self.skip_ws();
                let var = self.parse_ident();
                if var.is_empty() {
                    return Err("env() expects a variable name".into());
                }
                let default = if self.eat(',') {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                match (self.env.get(&var), default) {
                    (Some(value), _) => value.to_string(),
                    (None, Some(default)) => default,
                    (None, None) => return Err(format!("environment variable {} is not set", var)),
                }
            }
            "lower" => self.parse_expr()?.to_lowercase(),
            "upper" => self.parse_expr()?.to_uppercase(),
            "trim" => self.parse_expr()?.trim().to_string(),
            other => return Err(format!("unknown function '{}'", other)),
        };
        self.expect(')')?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn env() -> EnvSnapshot {
        EnvSnapshot::empty()
            .with_var("GL_USER", "Alice")
            .with_var("DOMAIN", "example.com")
    }

    #[test]
    fn test_plain_values_pass_through() {
        let value = transform("just text", &env(), Path::new(".")).unwrap();
        assert_eq!(value, "just text");
    }

    #[test]
    fn test_eval_expressions() {
        let env = env();
        assert_eq!(evaluate("env(GL_USER)", &env).unwrap(), "Alice");
        assert_eq!(evaluate("lower(env(GL_USER))", &env).unwrap(), "alice");
        assert_eq!(
            evaluate("env(GL_USER) + '@' + env(DOMAIN)", &env).unwrap(),
            "Alice@example.com"
        );
        assert_eq!(
            evaluate("env(MISSING, \"nobody\")", &env).unwrap(),
            "nobody"
        );
        assert_eq!(evaluate("trim('  x  ')", &env).unwrap(), "x");
        assert_eq!(evaluate(r#"upper("a\"b")"#, &env).unwrap(), "A\"B");
    }

    #[test]
    fn test_eval_errors_name_the_expression() {
        let env = env();
        for bad in [
            "env(MISSING)",
            "system('rm -rf /')",
            "'unterminated",
            "env(GL_USER) extra",
            "env()",
            "",
        ] {
            let err = transform(&format!("eval:{bad}"), &env, Path::new(".")).unwrap_err();
            match err {
                Error::ConfigEval { expression, .. } => {
                    assert_eq!(expression, format!("eval:{bad}"))
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_file_values() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("groups"), "admins = alice bob\n").unwrap();
        std::fs::write(dir.path().join("user"), "eval:env(GL_USER)\n").unwrap();

        assert_eq!(
            transform("file:groups", &env(), dir.path()).unwrap(),
            "admins = alice bob\n"
        );
        assert_eq!(transform("file:user", &env(), dir.path()).unwrap(), "Alice");
        assert!(matches!(
            transform("file:missing", &env(), dir.path()),
            Err(Error::ConfigEval { .. })
        ));
    }
}

use super::PathError;
use super::types::{PathExpr, Step, StepKind};

/// Parse a JQ-style path expression.
pub fn parse(source: &str) -> Result<PathExpr, PathError> {
    let mut parser = Parser {
        chars: source.chars().collect(),
        pos: 0,
    };
    let steps = parser.parse_pipeline()?;
    Ok(PathExpr {
        source: source.trim().to_string(),
        steps,
    })
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> PathError {
        PathError::Syntax {
            position: self.pos,
            message: message.into(),
        }
    }

    fn expect(&mut self, c: char) -> Result<(), PathError> {
        match self.peek() {
            Some(found) if found == c => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(self.error(format!("expected '{c}', found '{found}'"))),
            None => Err(self.error(format!("expected '{c}', found end of path"))),
        }
    }

    /// term ('|' term)*
    fn parse_pipeline(&mut self) -> Result<Vec<Step>, PathError> {
        let mut steps = Vec::new();
        self.skip_ws();
        if self.peek().is_none() {
            return Err(self.error("empty path"));
        }
        loop {
            self.parse_term(&mut steps)?;
            self.skip_ws();
            match self.peek() {
                None => return Ok(steps),
                Some('|') => {
                    self.pos += 1;
                    self.skip_ws();
                }
                Some(c) => return Err(self.error(format!("unexpected '{c}'"))),
            }
        }
    }

    /// A term starts with '.' and runs until whitespace, a pipe or the end.
    fn parse_term(&mut self, steps: &mut Vec<Step>) -> Result<(), PathError> {
        if self.peek() != Some('.') {
            return Err(match self.peek() {
                Some(c) => self.error(format!("path must start with '.', found '{c}'")),
                None => self.error("expected a path after '|'"),
            });
        }
        let mut first = true;
        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    match self.peek() {
                        Some('.') => {
                            self.pos += 1;
                            steps.push(Step::new(StepKind::Recurse));
                        }
                        Some('"') => {
                            let name = self.parse_string()?;
                            steps.push(Step::new(StepKind::Field(name)));
                        }
                        Some(c) if is_ident_start(c) => {
                            let name = self.parse_ident();
                            steps.push(Step::new(StepKind::Field(name)));
                        }
                        Some('[') => {}
                        // Bare '.' is only valid as the identity term.
                        _ if first => {}
                        Some(c) => return Err(self.error(format!("unexpected '{c}' after '.'"))),
                        None => return Err(self.error("path ends with '.'")),
                    }
                }
                Some('[') => {
                    let kind = self.parse_bracket()?;
                    steps.push(Step::new(kind));
                }
                Some('?') => {
                    self.pos += 1;
                    match steps.last_mut() {
                        Some(step) => step.optional = true,
                        None => return Err(self.error("'?' must follow a path step")),
                    }
                }
                _ => return Ok(()),
            }
            first = false;
        }
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn parse_string(&mut self) -> Result<String, PathError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some('"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = match self.peek() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some(c @ ('"' | '\\' | '/')) => c,
                        Some(c) => return Err(self.error(format!("unknown escape '\\{c}'"))),
                        None => return Err(self.error("unterminated string")),
                    };
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_int(&mut self) -> Result<i64, PathError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<i64>().map_err(|_| PathError::Syntax {
            position: start,
            message: format!("invalid index '{text}'"),
        })
    }

    /// '[' ( ']' | string ']' | int ']' | int? ':' int? ']' )
    fn parse_bracket(&mut self) -> Result<StepKind, PathError> {
        self.expect('[')?;
        self.skip_ws();
        let kind = match self.peek() {
            Some(']') => StepKind::Iterate,
            Some('"') => StepKind::Field(self.parse_string()?),
            Some(':') => {
                self.pos += 1;
                self.skip_ws();
                let end = self.parse_optional_int()?;
                StepKind::Slice(None, end)
            }
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let start = self.parse_int()?;
                self.skip_ws();
                if self.peek() == Some(':') {
                    self.pos += 1;
                    self.skip_ws();
                    let end = self.parse_optional_int()?;
                    StepKind::Slice(Some(start), end)
                } else {
                    StepKind::Index(start)
                }
            }
            Some(c) => return Err(self.error(format!("unexpected '{c}' inside brackets"))),
            None => return Err(self.error("unterminated '['")),
        };
        self.skip_ws();
        self.expect(']')?;
        Ok(kind)
    }

    fn parse_optional_int(&mut self) -> Result<Option<i64>, PathError> {
        match self.peek() {
            Some(c) if c == '-' || c.is_ascii_digit() => Ok(Some(self.parse_int()?)),
            _ => Ok(None),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(path: &str) -> Vec<StepKind> {
        parse(path).unwrap().steps.into_iter().map(|s| s.kind).collect()
    }

    #[test]
    fn identity() {
        assert!(kinds(".").is_empty());
        assert!(kinds("  .  ").is_empty());
    }

    #[test]
    fn dotted_fields() {
        assert_eq!(
            kinds(".Event.info"),
            vec![
                StepKind::Field("Event".into()),
                StepKind::Field("info".into())
            ]
        );
    }

    #[test]
    fn iterate_and_index() {
        assert_eq!(
            kinds(".response[].Event.Attribute[-1]"),
            vec![
                StepKind::Field("response".into()),
                StepKind::Iterate,
                StepKind::Field("Event".into()),
                StepKind::Field("Attribute".into()),
                StepKind::Index(-1),
            ]
        );
    }

    #[test]
    fn quoted_keys() {
        assert_eq!(
            kinds(r#"."first name".["last-name"]"#),
            vec![
                StepKind::Field("first name".into()),
                StepKind::Field("last-name".into())
            ]
        );
    }

    #[test]
    fn slices() {
        assert_eq!(kinds(".[1:3]"), vec![StepKind::Slice(Some(1), Some(3))]);
        assert_eq!(kinds(".[:2]"), vec![StepKind::Slice(None, Some(2))]);
        assert_eq!(kinds(".[2:]"), vec![StepKind::Slice(Some(2), None)]);
    }

    #[test]
    fn pipes_flatten() {
        assert_eq!(kinds(".a | .b"), kinds(".a.b"));
        assert_eq!(kinds(". | .a"), kinds(".a"));
    }

    #[test]
    fn optional_marks_last_step() {
        let path = parse(".a[]?.b").unwrap();
        assert!(!path.steps[0].optional);
        assert!(path.steps[1].optional);
        assert!(!path.steps[2].optional);
    }

    #[test]
    fn recurse() {
        assert_eq!(
            kinds(".. | .id"),
            vec![StepKind::Recurse, StepKind::Field("id".into())]
        );
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "   ", "status", ".a[", ".a[x]", ".a |", ".a b", "[0]", ".\"open", ".a..."] {
            assert!(parse(bad).is_err(), "should reject {bad:?}");
        }
    }

    #[test]
    fn syntax_error_reports_position() {
        let err = parse(".a b").unwrap_err();
        assert!(matches!(err, PathError::Syntax { position: 3, .. }), "{err}");
    }
}

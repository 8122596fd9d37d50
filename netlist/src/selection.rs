use std::fmt::Display;

use yap::{IntoTokens, Tokens};

use crate::{AttrValue, Module, Wire};

/// Restricts an operation to a subset of the wires of a design.
///
/// A selection is written as whitespace-separated terms, evaluated as a stack:
///
/// - `<glob>` selects every wire of the modules whose name matches,
/// - `<module-glob>/<object>` restricts `<object>` to matching modules,
/// - `w:<glob>` selects wires by name; `i:`, `o:` and `x:` select input, output and any port wires,
/// - `a:<name>` and `a:<name>=<glob>` select wires by attribute,
/// - `%u`, `%i` and `%d` replace the two topmost entries with their union, intersection and
///   difference.
///
/// Entries left on the stack are united.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    ops: Vec<SelectOp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SelectOp {
    Term { module: Option<String>, object: Option<Pattern> },
    Union,
    Intersect,
    Difference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Wire(String),
    Input(String),
    Output(String),
    Port(String),
    Attr(String, Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionError {
    pub term: String,
    pub message: String,
}

impl Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid selection term {:?}: {}", self.term, self.message)
    }
}

impl std::error::Error for SelectionError {}

impl Selection {
    pub fn parse(text: &str) -> Result<Selection, SelectionError> {
        let mut toks = text.into_tokens();
        let mut ops = Vec::new();
        let mut depth = 0usize;
        loop {
            toks.skip_while(|c| c.is_whitespace());
            let word: String = toks.take_while(|c| !c.is_whitespace()).collect();
            if word.is_empty() {
                break;
            }
            let op = parse_term(&word)?;
            if matches!(op, SelectOp::Term { .. }) {
                depth += 1;
            } else if depth < 2 {
                return Err(SelectionError { term: word, message: "operator needs two operands".into() });
            } else {
                depth -= 1;
            }
            ops.push(op);
        }
        if ops.is_empty() {
            return Err(SelectionError { term: text.into(), message: "empty selection".into() });
        }
        Ok(Selection { ops })
    }

    /// Evaluates the expression for one object; `select` decides the terms.
    fn evaluate(&self, select: impl Fn(Option<&str>, Option<&Pattern>) -> bool) -> bool {
        let mut stack: Vec<bool> = Vec::new();
        for op in &self.ops {
            let value = match op {
                SelectOp::Term { module, object } => select(module.as_deref(), object.as_ref()),
                _ => {
                    let (Some(rhs), Some(lhs)) = (stack.pop(), stack.pop()) else {
                        unreachable!("operand count is checked while parsing")
                    };
                    match op {
                        SelectOp::Union => lhs || rhs,
                        SelectOp::Intersect => lhs && rhs,
                        _ => lhs && !rhs,
                    }
                }
            };
            stack.push(value);
        }
        stack.into_iter().any(|value| value)
    }

    pub fn selects_wire(&self, module: &Module, wire: &Wire) -> bool {
        self.evaluate(|module_glob, object| {
            module_glob.is_none_or(|glob| glob_match(glob, module.name()))
                && object.is_none_or(|pattern| pattern.matches(wire))
        })
    }

    /// Returns `true` if the module is selected as a whole, or any of its wires is.
    pub fn selects_module(&self, module: &Module) -> bool {
        // only terms without an object pattern name the module itself
        let whole = self.evaluate(|module_glob, object| {
            object.is_none() && module_glob.is_none_or(|glob| glob_match(glob, module.name()))
        });
        whole || module.wires().any(|(_, wire)| self.selects_wire(module, wire))
    }
}

fn parse_term(word: &str) -> Result<SelectOp, SelectionError> {
    let error = |message: &str| SelectionError { term: word.into(), message: message.into() };
    let mut toks = word.into_tokens();
    if toks.token('%') {
        let name: String = toks.take_while(|_| true).collect();
        return match name.as_str() {
            "u" => Ok(SelectOp::Union),
            "i" => Ok(SelectOp::Intersect),
            "d" => Ok(SelectOp::Difference),
            _ => Err(error("unknown operator")),
        };
    }
    let module = match word.split_once('/') {
        Some((module, _)) if !module.contains(':') => {
            let module: String = toks.take_while(|c| *c != '/').collect();
            toks.token('/');
            Some(module)
        }
        _ => None,
    };
    let prefix = toks.optional(|toks| {
        let kind = toks.next()?;
        if "wioxa".contains(kind) && toks.token(':') { Some(kind) } else { None }
    });
    let rest: String = toks.take_while(|_| true).collect();
    let object = match prefix {
        None if module.is_none() => return Ok(SelectOp::Term { module: Some(rest), object: None }),
        None => Pattern::Wire(rest),
        Some('w') => Pattern::Wire(rest),
        Some('i') => Pattern::Input(rest),
        Some('o') => Pattern::Output(rest),
        Some('x') => Pattern::Port(rest),
        Some(_) => match rest.split_once('=') {
            Some((name, value)) => Pattern::Attr(name.into(), Some(value.into())),
            None => Pattern::Attr(rest, None),
        },
    };
    match &object {
        Pattern::Attr(name, _) if name.is_empty() => Err(error("missing attribute name")),
        Pattern::Wire(glob) | Pattern::Input(glob) | Pattern::Output(glob) | Pattern::Port(glob)
            if glob.is_empty() =>
        {
            Err(error("missing name pattern"))
        }
        _ => Ok(SelectOp::Term { module, object: Some(object) }),
    }
}

impl Pattern {
    fn matches(&self, wire: &Wire) -> bool {
        match self {
            Pattern::Wire(glob) => glob_match(glob, wire.name()),
            Pattern::Input(glob) => wire.port_input && glob_match(glob, wire.name()),
            Pattern::Output(glob) => wire.port_output && glob_match(glob, wire.name()),
            Pattern::Port(glob) => wire.is_port() && glob_match(glob, wire.name()),
            Pattern::Attr(name, expected) => match (wire.attributes.get(name), expected) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(AttrValue::String(value)), Some(expected)) => glob_match(expected, value),
                (Some(AttrValue::Const(value)), Some(expected)) => {
                    value.as_uint().is_some_and(|int| int.to_string() == *expected) || value.to_string() == *expected
                }
            },
        }
    }
}

/// Matches `text` against a pattern where `*` matches any run of characters and `?` any one.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = backtrack {
            p = star_p + 1;
            t = star_t + 1;
            backtrack = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&chr| chr == '*')
}

#[cfg(test)]
mod test {
    use super::{Selection, glob_match};
    use crate::{AttrValue, Module};

    #[test]
    fn test_glob() {
        assert!(glob_match("*", ""));
        assert!(glob_match("clk*", "clk_in"));
        assert!(glob_match("c?k", "clk"));
        assert!(glob_match("*_in", "clk_in"));
        assert!(!glob_match("clk", "clk_in"));
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(!glob_match("a*b*c", "axxbyy"));
    }

    fn module() -> Module {
        let mut module = Module::new("top");
        let clk = module.add_wire("clk", 1);
        module.wire_mut(clk).port_input = true;
        let rst = module.add_wire("rst", 1);
        module.wire_mut(rst).attributes.insert("buffer_type".into(), AttrValue::from("none"));
        module.add_wire("data", 8);
        module
    }

    fn selected(text: &str, module: &Module) -> Vec<String> {
        let selection = Selection::parse(text).unwrap();
        module
            .wires()
            .filter(|(_, wire)| selection.selects_wire(module, wire))
            .map(|(_, wire)| wire.name().to_owned())
            .collect()
    }

    #[test]
    fn test_terms() {
        let module = module();
        assert_eq!(selected("w:c*", &module), vec!["clk"]);
        assert_eq!(selected("i:*", &module), vec!["clk"]);
        assert_eq!(selected("top", &module), vec!["clk", "rst", "data"]);
        assert_eq!(selected("other", &module), Vec::<String>::new());
        assert_eq!(selected("top/data", &module), vec!["data"]);
        assert_eq!(selected("t*/w:r*", &module), vec!["rst"]);
        assert_eq!(selected("a:buffer_type", &module), vec!["rst"]);
    }

    #[test]
    fn test_operators() {
        let module = module();
        assert_eq!(selected("w:* a:buffer_type=none a:buffer_type=bufr %u %d", &module), vec!["clk", "data"]);
        assert_eq!(selected("w:* i:* %i", &module), vec!["clk"]);
        assert_eq!(selected("w:clk w:rst", &module), vec!["clk", "rst"]);
    }

    #[test]
    fn test_selects_module() {
        let empty = Module::new("mid");
        assert!(Selection::parse("mid").unwrap().selects_module(&empty));
        assert!(Selection::parse("m*").unwrap().selects_module(&empty));
        assert!(!Selection::parse("mid/w:*").unwrap().selects_module(&empty));
        assert!(!Selection::parse("top").unwrap().selects_module(&empty));
        assert!(!Selection::parse("mid top %i").unwrap().selects_module(&empty));
        assert!(Selection::parse("w:clk").unwrap().selects_module(&module()));
        assert!(!Selection::parse("w:none").unwrap().selects_module(&module()));
    }

    #[test]
    fn test_errors() {
        assert!(Selection::parse("").is_err());
        assert!(Selection::parse("w:* %u").is_err());
        assert!(Selection::parse("w:a w:b %q").is_err());
        assert!(Selection::parse("a:").is_err());
    }
}

use std::fmt::Display;

use yap::{IntoTokens, Tokens};

use crate::{AttrValue, Attributes, Const, Design, Module, SigBit, SigSpec};

/// An error encountered while parsing RTLIL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Id(String),
    Str(String),
    Int(i64),
    Const(Const),
    Punct(char),
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Token::Word(word) => write!(f, "`{word}`"),
            Token::Id(name) => write!(f, "identifier `{name}`"),
            Token::Str(_) => write!(f, "string"),
            Token::Int(value) => write!(f, "integer `{value}`"),
            Token::Const(value) => write!(f, "constant `{}'{value}`", value.len()),
            Token::Punct(chr) => write!(f, "`{chr}`"),
        }
    }
}

fn lex(text: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut toks = text.into_tokens();
    let mut tokens = Vec::new();
    let mut line = 1;
    while let Some(chr) = toks.peek() {
        let error = move |message: String| ParseError { line, message };
        let token = match chr {
            '\n' => {
                toks.next();
                line += 1;
                continue;
            }
            _ if chr.is_whitespace() => {
                toks.next();
                continue;
            }
            '#' => {
                toks.skip_while(|c| *c != '\n');
                continue;
            }
            '\\' | '$' => {
                toks.token('\\');
                let name: String = toks.take_while(|c| !c.is_whitespace()).collect();
                if name.is_empty() {
                    return Err(error("empty identifier".into()));
                }
                Token::Id(name)
            }
            '"' => {
                toks.next();
                let mut value = String::new();
                loop {
                    match toks.next() {
                        None => return Err(error("unterminated string".into())),
                        Some('"') => break,
                        Some('\\') => match toks.next() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(digit @ '0'..='7') => {
                                let rest: String = toks.take_while(|c| c.is_digit(8)).collect();
                                let code = u32::from_str_radix(&format!("{digit}{rest}"), 8)
                                    .map_err(|_| error("invalid escape".into()))?;
                                value.push(char::from_u32(code).ok_or_else(|| error("invalid escape".into()))?);
                            }
                            Some(other) => value.push(other),
                            None => return Err(error("unterminated string".into())),
                        },
                        Some('\n') => {
                            line += 1;
                            value.push('\n');
                        }
                        Some(other) => value.push(other),
                    }
                }
                Token::Str(value)
            }
            '0'..='9' | '-' => {
                let negative = toks.token('-');
                let digits: String = toks.take_while(|c| c.is_ascii_digit()).collect();
                let value: i64 = digits.parse().map_err(|_| error(format!("invalid number `{digits}`")))?;
                if !negative && toks.token('\'') {
                    let bits: String = toks.take_while(|c| "01xzm-".contains(*c)).collect();
                    let mut value: Const = bits.parse().map_err(|_| error(format!("invalid constant `{bits}`")))?;
                    let width = digits.parse::<usize>().map_err(|_| error("invalid width".into()))?;
                    if value.len() > width {
                        return Err(error(format!("constant `{bits}` is wider than {width} bits")));
                    }
                    while value.len() < width {
                        value.push(false);
                    }
                    Token::Const(value)
                } else {
                    Token::Int(if negative { -value } else { value })
                }
            }
            '{' | '}' | '[' | ']' | ':' => {
                toks.next();
                Token::Punct(chr)
            }
            _ if chr.is_ascii_alphabetic() => {
                Token::Word(toks.take_while(|c| c.is_ascii_alphanumeric() || *c == '_').collect())
            }
            _ => return Err(error(format!("unexpected character {chr:?}"))),
        };
        tokens.push((token, line));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
}

impl Parser {
    fn line(&self) -> usize {
        match self.tokens.get(self.position).or(self.tokens.last()) {
            Some((_, line)) => *line,
            None => 1,
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError { line: self.line(), message: message.into() })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(token, _)| token)
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        match self.tokens.get(self.position) {
            Some((token, _)) => {
                self.position += 1;
                Ok(token.clone())
            }
            None => self.error("unexpected end of input"),
        }
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == word)
    }

    fn eat_word(&mut self, word: &str) -> bool {
        let matched = self.is_word(word);
        if matched {
            self.position += 1;
        }
        matched
    }

    fn eat_punct(&mut self, chr: char) -> bool {
        let matched = self.peek() == Some(&Token::Punct(chr));
        if matched {
            self.position += 1;
        }
        matched
    }

    fn expect_punct(&mut self, chr: char) -> Result<(), ParseError> {
        if self.eat_punct(chr) { Ok(()) } else { self.error(format!("expected `{chr}`")) }
    }

    fn id(&mut self) -> Result<String, ParseError> {
        match self.next()? {
            Token::Id(name) => Ok(name),
            token => {
                self.position -= 1;
                self.error(format!("expected identifier, found {token}"))
            }
        }
    }

    fn int(&mut self) -> Result<i64, ParseError> {
        match self.next()? {
            Token::Int(value) => Ok(value),
            token => {
                self.position -= 1;
                self.error(format!("expected integer, found {token}"))
            }
        }
    }

    fn uint(&mut self) -> Result<usize, ParseError> {
        let value = self.int()?;
        match usize::try_from(value) {
            Ok(value) => Ok(value),
            Err(_) => self.error(format!("expected non-negative integer, found {value}")),
        }
    }

    fn value(&mut self) -> Result<AttrValue, ParseError> {
        match self.next()? {
            Token::Const(value) => Ok(AttrValue::Const(value)),
            Token::Int(value) => Ok(AttrValue::from(value)),
            Token::Str(value) => Ok(AttrValue::String(value)),
            token => {
                self.position -= 1;
                self.error(format!("expected constant, found {token}"))
            }
        }
    }

    fn sig(&mut self, module: &Module) -> Result<SigSpec, ParseError> {
        match self.next()? {
            Token::Const(value) => Ok(SigSpec::from(value)),
            Token::Int(value) => Ok(SigSpec::from(Const::from_uint(value as u64, 32))),
            Token::Punct('{') => {
                let mut parts = Vec::new();
                while !self.eat_punct('}') {
                    parts.push(self.sig(module)?);
                }
                // parts are listed most significant first
                Ok(SigSpec::from_iter(parts.iter().rev().flat_map(|part| part.iter())))
            }
            Token::Id(name) => {
                let Some(wire) = module.find_wire(&name) else {
                    self.position -= 1;
                    return self.error(format!("unknown wire `{name}`"));
                };
                let sig = module.wire_sig(wire);
                if !self.eat_punct('[') {
                    return Ok(sig);
                }
                let first = self.int()?;
                let last = if self.eat_punct(':') { self.int()? } else { first };
                self.expect_punct(']')?;
                // the first index names the most significant bit of the slice
                let wire = module.wire(wire);
                match (wire.from_hdl_index(first), wire.from_hdl_index(last)) {
                    (Some(high), Some(low)) if low <= high => Ok(sig.slice(low..=high)),
                    _ => self.error(format!("invalid slice [{first}:{last}] of `{name}`")),
                }
            }
            token => {
                self.position -= 1;
                self.error(format!("expected signal, found {token}"))
            }
        }
    }

    fn attribute(&mut self, attributes: &mut Attributes) -> Result<(), ParseError> {
        let name = self.id()?;
        let value = self.value()?;
        attributes.insert(name, value);
        Ok(())
    }

    fn wire(&mut self, module: &mut Module, attributes: Attributes) -> Result<(), ParseError> {
        let (mut width, mut port_id, mut start_offset) = (1, 0, 0);
        let (mut port_input, mut port_output) = (false, false);
        let (mut upto, mut is_signed) = (false, false);
        loop {
            if self.eat_word("width") {
                width = self.uint()?;
            } else if self.eat_word("offset") {
                start_offset = self.int()?;
            } else if self.eat_word("input") {
                port_input = true;
                port_id = self.uint()?;
            } else if self.eat_word("output") {
                port_output = true;
                port_id = self.uint()?;
            } else if self.eat_word("inout") {
                (port_input, port_output) = (true, true);
                port_id = self.uint()?;
            } else if self.eat_word("upto") {
                upto = true;
            } else if self.eat_word("signed") {
                is_signed = true;
            } else {
                break;
            }
        }
        let name = self.id()?;
        if module.find_wire(&name).is_some() {
            return self.error(format!("duplicate wire `{name}`"));
        }
        let wire = module.add_wire(name, width);
        let wire = module.wire_mut(wire);
        wire.start_offset = start_offset;
        wire.upto = upto;
        wire.is_signed = is_signed;
        wire.port_input = port_input;
        wire.port_output = port_output;
        wire.port_id = port_id;
        wire.attributes = attributes;
        Ok(())
    }

    fn cell(&mut self, module: &mut Module, attributes: Attributes) -> Result<(), ParseError> {
        let cell_type = self.id()?;
        let name = self.id()?;
        if module.find_cell(&name).is_some() {
            return self.error(format!("duplicate cell `{name}`"));
        }
        let cell = module.add_cell(name, cell_type);
        module.cell_mut(cell).attributes = attributes;
        loop {
            if self.eat_word("end") {
                return Ok(());
            } else if self.eat_word("parameter") {
                while self.eat_word("signed") || self.eat_word("real") {}
                let name = self.id()?;
                let value = self.value()?;
                module.cell_mut(cell).parameters.insert(name, value);
            } else if self.eat_word("connect") {
                let port = self.id()?;
                let sig = self.sig(module)?;
                module.cell_mut(cell).set_port(port, sig);
            } else {
                let token = self.next()?;
                return self.error(format!("unexpected {token} in cell"));
            }
        }
    }

    fn module(&mut self, design: &mut Design, attributes: Attributes) -> Result<(), ParseError> {
        let name = self.id()?;
        if design.module(&name).is_some() {
            return self.error(format!("duplicate module `{name}`"));
        }
        let mut module = Module::new(name);
        module.attributes = attributes;
        let mut attributes = Attributes::new();
        loop {
            if self.eat_word("end") {
                break;
            } else if self.eat_word("attribute") {
                self.attribute(&mut attributes)?;
            } else if self.eat_word("wire") {
                self.wire(&mut module, std::mem::take(&mut attributes))?;
            } else if self.eat_word("cell") {
                self.cell(&mut module, std::mem::take(&mut attributes))?;
            } else if self.eat_word("connect") {
                let lhs = self.sig(&module)?;
                let rhs = self.sig(&module)?;
                if lhs.len() != rhs.len() {
                    return self.error(format!("connection width mismatch ({} vs {})", lhs.len(), rhs.len()));
                }
                module.connect(lhs, rhs);
            } else if self.eat_word("parameter") {
                self.id()?;
                if matches!(self.peek(), Some(Token::Const(_) | Token::Int(_) | Token::Str(_))) {
                    self.value()?;
                }
            } else {
                let token = self.next()?;
                return self.error(format!("unsupported {token} in module"));
            }
        }
        module.fixup_ports();
        let target = design.add_module(module.name().to_owned());
        *target = module;
        Ok(())
    }
}

/// Parses a design from the RTLIL text format.
///
/// Only the structural subset is accepted: modules, wires, cells and connections. Processes and
/// memories are rejected.
pub fn parse(text: &str) -> Result<Design, ParseError> {
    let mut parser = Parser { tokens: lex(text)?, position: 0 };
    let mut design = Design::new();
    let mut attributes = Attributes::new();
    while parser.peek().is_some() {
        if parser.eat_word("autoidx") {
            parser.int()?;
        } else if parser.eat_word("attribute") {
            parser.attribute(&mut attributes)?;
        } else if parser.eat_word("module") {
            parser.module(&mut design, std::mem::take(&mut attributes))?;
        } else {
            let token = parser.next()?;
            return parser.error(format!("unexpected {token}"));
        }
    }
    Ok(design)
}

#[cfg(test)]
mod test {
    use crate::{AttrValue, Design, SigBit, SigSpec, parse};

    #[test]
    fn test_parse() {
        let design = parse(concat!(
            "# comment\n",
            "autoidx 5\n",
            "attribute \\top 1\n",
            "module \\top\n",
            "  attribute \\clkbuf_inhibit 1\n",
            "  wire input 1 \\clk\n",
            "  wire width 4 output 2 \\q\n",
            "  wire $n\n",
            "  cell \\DFF $ff\n",
            "    parameter \\INIT 4'01x0\n",
            "    parameter \\NAME \"a\\\"b\"\n",
            "    connect \\C \\clk\n",
            "    connect \\Q { \\q [3:1] $n }\n",
            "  end\n",
            "  connect \\q [0] 1'1\n",
            "end\n",
        ))
        .unwrap();
        let top = design.module("top").unwrap();
        assert!(top.is_top());
        let clk = top.find_wire("clk").unwrap();
        let q = top.find_wire("q").unwrap();
        let n = top.find_wire("$n").unwrap();
        assert!(top.wire(clk).port_input);
        assert!(top.wire(clk).get_bool_attribute("clkbuf_inhibit"));
        assert_eq!(top.wire(q).width, 4);
        assert_eq!(top.ports(), &[clk, q]);
        let ff = top.cell(top.find_cell("$ff").unwrap());
        assert_eq!(ff.cell_type, "DFF");
        assert_eq!(ff.parameters["INIT"], AttrValue::Const("01x0".parse().unwrap()));
        assert_eq!(ff.parameters["NAME"], AttrValue::String("a\"b".into()));
        assert_eq!(
            ff.port("Q").unwrap(),
            &SigSpec::from_iter([SigBit::Wire(n, 0), SigBit::Wire(q, 1), SigBit::Wire(q, 2), SigBit::Wire(q, 3)])
        );
        assert_eq!(top.connections()[0], (SigSpec::from(SigBit::Wire(q, 0)), SigSpec::from(SigBit::ONE)));
    }

    #[test]
    fn test_roundtrip() {
        let text = concat!(
            "attribute \\top 1\n",
            "module \\top\n",
            "  attribute \\keep 1\n",
            "  wire width 2 input 1 \\a\n",
            "  wire output 2 \\y\n",
            "  cell \\AND2 \\g\n",
            "    parameter \\MODE \"fast\"\n",
            "    connect \\A \\a [0]\n",
            "    connect \\B \\a [1]\n",
            "    connect \\Y \\y\n",
            "  end\n",
            "end\n",
        );
        let design: Design = text.parse().unwrap();
        assert_eq!(design.to_string(), text);
    }

    #[test]
    fn test_wire_shape() {
        let design = parse(concat!(
            "module \\top\n",
            "  wire width 2 offset 4 \\a\n",
            "  wire width 4 upto \\b\n",
            "  wire width 3 upto offset -1 \\c\n",
            "  connect \\a [5] 1'1\n",
            "  connect \\b [0] \\a [4]\n",
            "  connect \\c [0:1] 2'10\n",
            "end\n",
        ))
        .unwrap();
        let top = design.module("top").unwrap();
        let a = top.find_wire("a").unwrap();
        let b = top.find_wire("b").unwrap();
        let c = top.find_wire("c").unwrap();
        assert_eq!(top.wire(a).start_offset, 4);
        assert!(top.wire(b).upto);
        assert_eq!(top.connections()[0].0, SigSpec::from(SigBit::Wire(a, 1)));
        assert_eq!(top.connections()[1], (SigSpec::from(SigBit::Wire(b, 3)), SigSpec::from(SigBit::Wire(a, 0))));
        // c [-1] is bit 2, c [1] is bit 0
        assert_eq!(top.connections()[2].0, SigSpec::from_iter([SigBit::Wire(c, 0), SigBit::Wire(c, 1)]));

        assert!(parse("module \\top\n  wire width 2 offset 4 \\a\n  connect \\a [3] 1'1\nend\n").is_err());
        assert!(parse("module \\top\n  wire width 4 upto \\b\n  connect \\b [2:0] 3'000\nend\n").is_err());
    }

    #[test]
    fn test_roundtrip_wire_shape() {
        let text = concat!(
            "module \\top\n",
            "  wire width 2 offset 4 \\a\n",
            "  wire width 4 upto input 1 signed \\b\n",
            "  wire width 3 upto offset -1 \\c\n",
            "  cell \\BUF \\u\n",
            "    connect \\A \\b [1:2]\n",
            "    connect \\Y \\c [-1:0]\n",
            "  end\n",
            "  connect \\a [5] \\b [3]\n",
            "end\n",
        );
        let design: Design = text.parse().unwrap();
        assert_eq!(design.to_string(), text);
    }

    #[test]
    fn test_errors() {
        let error = parse("module \\top\n  connect \\a \\b\nend\n").unwrap_err();
        assert_eq!(error.line, 2);
        assert!(parse("module \\top\n  process $p\n  end\nend\n").is_err());
        assert!(parse("module \\top\n  wire width 2 \\a\n  connect \\a 1'1\nend\n").is_err());
        assert!(parse("module \\top\n  wire \\a\n  connect \\a [1] 1'1\nend\n").is_err());
        assert!(parse("module \\top\n  wire \\a\n").is_err());
    }
}

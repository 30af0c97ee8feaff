use crate::server::ParamKind;
use core::fmt::Display;

/// A `__kernel` declaration found in a program text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSignature {
    /// The entry name.
    pub name: String,
    /// The kind of each parameter, in order.
    pub params: Vec<ParamKind>,
}

impl Display for KernelSignature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let params = self
            .params
            .iter()
            .map(|param| format!("{param:?}"))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_fmt(format_args!("{}({params})", self.name))
    }
}

/// The kernel declarations of an OpenCL C program text.
///
/// Only the interface is extracted: kernel bodies are executed by the matching
/// [host kernels](super::HostKernel).
#[derive(Debug, Clone, Default)]
pub struct Program {
    kernels: Vec<KernelSignature>,
}

impl Program {
    /// Parses the program text. The error is a build log.
    pub fn parse(source: &str) -> Result<Self, String> {
        let code = strip_comments(source)?;
        check_balanced(&code)?;

        let tokens = tokenize(&code);
        let mut kernels = Vec::new();
        let mut cursor = 0;

        while cursor < tokens.len() {
            if !matches!(tokens[cursor].as_str(), "__kernel" | "kernel") {
                cursor += 1;
                continue;
            }

            let (signature, next) = parse_declaration(&tokens, cursor + 1)?;
            if kernels
                .iter()
                .any(|kernel: &KernelSignature| kernel.name == signature.name)
            {
                return Err(format!(
                    "error: redefinition of kernel '{}'",
                    signature.name
                ));
            }
            kernels.push(signature);
            cursor = next;
        }

        Ok(Self { kernels })
    }

    /// The declaration of the given entry.
    pub fn kernel(&self, entry: &str) -> Option<&KernelSignature> {
        self.kernels.iter().find(|kernel| kernel.name == entry)
    }

    /// All declared kernels, in source order.
    pub fn kernels(&self) -> &[KernelSignature] {
        &self.kernels
    }

    /// The names of all declared kernels, for diagnostics.
    pub fn names(&self) -> Vec<&str> {
        self.kernels.iter().map(|kernel| kernel.name.as_str()).collect()
    }
}

fn parse_declaration(tokens: &[String], start: usize) -> Result<(KernelSignature, usize), String> {
    let mut cursor = start;
    // Attributes such as `__attribute__((reqd_work_group_size(64, 1, 1)))` may precede the
    // return type.
    while expect(tokens, cursor, "return type")? == "__attribute__" {
        cursor = skip_group(tokens, cursor + 1)?;
    }

    let return_type = expect(tokens, cursor, "return type")?;
    if return_type != "void" {
        return Err(format!(
            "error: kernel must have a 'void' return type, found '{return_type}'"
        ));
    }

    let name = expect(tokens, cursor + 1, "kernel name")?;
    if !is_identifier(name) {
        return Err(format!("error: expected kernel name, found '{name}'"));
    }

    if expect(tokens, cursor + 2, "'('")? != "(" {
        return Err(format!("error: expected '(' after kernel name '{name}'"));
    }

    let mut params = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut cursor = cursor + 3;

    loop {
        let token = expect(tokens, cursor, "')'")?;
        cursor += 1;
        match token.as_str() {
            ")" => {
                // `(void)` declares no parameter.
                let void_list = params.is_empty() && current == ["void"];
                if !current.is_empty() && !void_list {
                    params.push(param_kind(name, &current)?);
                }
                break;
            }
            "," => {
                if current.is_empty() {
                    return Err(format!("error: expected parameter declaration in '{name}'"));
                }
                params.push(param_kind(name, &current)?);
                current.clear();
            }
            token => current.push(token),
        }
    }

    if expect(tokens, cursor, "kernel body")? != "{" {
        return Err(format!("error: expected function body after kernel '{name}'"));
    }

    Ok((
        KernelSignature {
            name: name.clone(),
            params,
        },
        cursor,
    ))
}

fn expect<'a>(tokens: &'a [String], index: usize, what: &str) -> Result<&'a String, String> {
    tokens
        .get(index)
        .ok_or_else(|| format!("error: expected {what} at end of input"))
}

fn param_kind(kernel: &str, tokens: &[&str]) -> Result<ParamKind, String> {
    let has = |qualifier: &str| tokens.iter().any(|token| *token == qualifier);
    let pointer = has("*");

    if has("__local") || has("local") {
        return match pointer {
            true => Ok(ParamKind::Scratch),
            false => Err(format!(
                "error: local address space parameter of '{kernel}' must be a pointer"
            )),
        };
    }

    if pointer {
        if has("__global") || has("global") || has("__constant") || has("constant") {
            return Ok(ParamKind::Buffer);
        }
        return Err(format!(
            "error: pointer parameter of '{kernel}' must be declared in the global address space"
        ));
    }

    Ok(ParamKind::Scalar)
}

fn skip_group(tokens: &[String], start: usize) -> Result<usize, String> {
    if tokens.get(start).map(String::as_str) != Some("(") {
        return Err("error: expected '(' after '__attribute__'".into());
    }

    let mut depth = 0;
    for (index, token) in tokens.iter().enumerate().skip(start) {
        match token.as_str() {
            "(" => depth += 1,
            ")" => {
                depth -= 1;
                if depth == 0 {
                    return Ok(index + 1);
                }
            }
            _ => {}
        }
    }

    Err("error: expected ')' at end of input".into())
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn strip_comments(source: &str) -> Result<String, String> {
    let mut code = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, chars.peek().copied()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        code.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut closed = false;
                let mut previous = ' ';
                for c in chars.by_ref() {
                    if previous == '*' && c == '/' {
                        closed = true;
                        break;
                    }
                    previous = c;
                }
                if !closed {
                    return Err("error: unterminated /* comment".into());
                }
                code.push(' ');
            }
            _ => code.push(c),
        }
    }

    Ok(code)
}

fn check_balanced(code: &str) -> Result<(), String> {
    let mut stack = Vec::new();

    for (line, text) in code.lines().enumerate() {
        for c in text.chars() {
            match c {
                '(' | '{' | '[' => stack.push(c),
                ')' | '}' | ']' => {
                    let expected = match c {
                        ')' => '(',
                        '}' => '{',
                        _ => '[',
                    };
                    if stack.pop() != Some(expected) {
                        return Err(format!(
                            "{}: error: extraneous closing '{c}'",
                            line + 1
                        ));
                    }
                }
                _ => {}
            }
        }
    }

    match stack.last() {
        Some(open) => Err(format!("error: unmatched '{open}' at end of input")),
        None => Ok(()),
    }
}

fn tokenize(code: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in code.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            current.push(c);
            continue;
        }

        if !current.is_empty() {
            tokens.push(core::mem::take(&mut current));
        }

        if !c.is_whitespace() {
            tokens.push(c.to_string());
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

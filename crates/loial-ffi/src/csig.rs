//! C prototypes of the functions a bridge is generated for.
//!
//! Handles common C function signatures including stdint types, qualifiers,
//! pointer and array parameters, `struct`/`union`/`enum` tags, typedef names
//! and variadic functions. Does NOT handle function pointer parameters.
//!
//! [`find_signature`] locates the file-scope definition (or prototype) of a
//! function inside a C translation unit.

use crate::error::{FfiError, Result};

/// A C type representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CType {
    Void,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    LongDouble,
    // stdint / stddef types
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    IntPtr,
    UIntPtr,
    PtrDiff,
    SizeT,
    SSizeT,
    WChar,
    Bool,
    /// Pointer to another type.
    Pointer(Box<CType>),
    /// Const-qualified type.
    Const(Box<CType>),
    /// `struct` tag reference (by name).
    Struct(String),
    /// `union` tag reference (by name).
    Union(String),
    /// `enum` tag reference (by name).
    Enum(String),
    /// A typedef name the parser cannot see through.
    Named(String),
}

/// How a value of a C type travels through the call bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CCategory {
    Void,
    Integer,
    Real,
    Pointer,
    /// Structs, unions and typedef names: copied from the slot as-is.
    Aggregate,
}

impl CType {
    /// Whether this type is void.
    pub fn is_void(&self) -> bool {
        matches!(self.strip_const(), CType::Void)
    }

    /// Strip const qualifiers from outer level.
    pub fn strip_const(&self) -> &CType {
        match self {
            CType::Const(inner) => inner.strip_const(),
            other => other,
        }
    }

    pub fn category(&self) -> CCategory {
        match self.strip_const() {
            CType::Void => CCategory::Void,
            CType::Float | CType::Double | CType::LongDouble => CCategory::Real,
            CType::Pointer(_) => CCategory::Pointer,
            CType::Struct(_) | CType::Union(_) | CType::Named(_) => CCategory::Aggregate,
            _ => CCategory::Integer,
        }
    }
}

impl std::fmt::Display for CType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CType::Void => write!(f, "void"),
            CType::Char => write!(f, "char"),
            CType::SignedChar => write!(f, "signed char"),
            CType::UnsignedChar => write!(f, "unsigned char"),
            CType::Short => write!(f, "short"),
            CType::UnsignedShort => write!(f, "unsigned short"),
            CType::Int => write!(f, "int"),
            CType::UnsignedInt => write!(f, "unsigned int"),
            CType::Long => write!(f, "long"),
            CType::UnsignedLong => write!(f, "unsigned long"),
            CType::LongLong => write!(f, "long long"),
            CType::UnsignedLongLong => write!(f, "unsigned long long"),
            CType::Float => write!(f, "float"),
            CType::Double => write!(f, "double"),
            CType::LongDouble => write!(f, "long double"),
            CType::Int8 => write!(f, "int8_t"),
            CType::Int16 => write!(f, "int16_t"),
            CType::Int32 => write!(f, "int32_t"),
            CType::Int64 => write!(f, "int64_t"),
            CType::UInt8 => write!(f, "uint8_t"),
            CType::UInt16 => write!(f, "uint16_t"),
            CType::UInt32 => write!(f, "uint32_t"),
            CType::UInt64 => write!(f, "uint64_t"),
            CType::IntPtr => write!(f, "intptr_t"),
            CType::UIntPtr => write!(f, "uintptr_t"),
            CType::PtrDiff => write!(f, "ptrdiff_t"),
            CType::SizeT => write!(f, "size_t"),
            CType::SSizeT => write!(f, "ssize_t"),
            CType::WChar => write!(f, "wchar_t"),
            CType::Bool => write!(f, "_Bool"),
            CType::Pointer(inner) => write!(f, "{inner}*"),
            CType::Const(inner) => write!(f, "const {inner}"),
            CType::Struct(name) => write!(f, "struct {name}"),
            CType::Union(name) => write!(f, "union {name}"),
            CType::Enum(name) => write!(f, "enum {name}"),
            CType::Named(name) => write!(f, "{name}"),
        }
    }
}

/// A parsed C function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CParam {
    /// Parameter type (array parameters are adjusted to pointers).
    pub param_type: CType,
    /// Parameter name (may be empty if unnamed).
    pub name: String,
}

/// A parsed C function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSignature {
    /// Return type.
    pub return_type: CType,
    /// Function name.
    pub name: String,
    /// Parameters (excluding variadic `...`).
    pub parameters: Vec<CParam>,
    /// Whether the function is variadic (`...`).
    pub is_variadic: bool,
}

impl CSignature {
    /// Parse a C function signature string.
    ///
    /// Examples:
    /// - `"double sin(double x)"`
    /// - `"static inline void* grow(void *p, size_t n)"`
    /// - `"int sum(const int values[], int count)"`
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(FfiError::InvalidCSignature {
                detail: "empty signature".to_string(),
            });
        }

        let paren_pos = input.find('(').ok_or_else(|| FfiError::InvalidCSignature {
            detail: "missing '('".to_string(),
        })?;

        if !input.ends_with(')') {
            return Err(FfiError::InvalidCSignature {
                detail: "missing ')'".to_string(),
            });
        }

        let before_paren = input[..paren_pos].trim();
        let params_str = &input[paren_pos + 1..input.len() - 1];

        let (return_type, name) = parse_type_and_name(before_paren)?;
        let (parameters, is_variadic) = parse_params(params_str)?;

        Ok(CSignature {
            return_type,
            name,
            parameters,
            is_variadic,
        })
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

impl std::fmt::Display for CSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}(", self.return_type, self.name)?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param.param_type)?;
            if !param.name.is_empty() {
                write!(f, " {}", param.name)?;
            }
        }
        if self.is_variadic {
            if !self.parameters.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "...")?;
        } else if self.parameters.is_empty() {
            write!(f, "void")?;
        }
        write!(f, ")")
    }
}

/// Locate `symbol` at file scope in `source` and parse its signature.
///
/// A definition wins over a prototype. Comments, string literals and
/// preprocessor lines are ignored. Returns `Ok(None)` when the symbol is
/// neither defined nor declared.
pub fn find_signature(source: &str, symbol: &str) -> Result<Option<CSignature>> {
    let clean = strip_noise(source);
    let bytes = clean.as_bytes();
    let mut depth = 0usize;
    let mut boundary = 0usize;
    let mut prototype = None;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                depth += 1;
                boundary = i + 1;
                i += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                boundary = i + 1;
                i += 1;
            }
            b';' => {
                if depth == 0 {
                    boundary = i + 1;
                }
                i += 1;
            }
            b if is_ident_start(b) => {
                let start = i;
                while i < bytes.len() && is_ident(bytes[i]) {
                    i += 1;
                }
                if depth > 0 || &clean[start..i] != symbol {
                    continue;
                }
                let Some((close, next)) = call_shape(bytes, i) else {
                    continue;
                };
                let head = &clean[boundary..=close];
                match next {
                    Some(b'{') => return CSignature::parse(head).map(Some),
                    Some(b';') if prototype.is_none() => prototype = Some(head),
                    _ => {}
                }
            }
            _ => i += 1,
        }
    }

    prototype.map(CSignature::parse).transpose()
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// If a parenthesised list follows `from`, return the index of its closing
/// parenthesis and the first non-space byte after it.
fn call_shape(bytes: &[u8], from: usize) -> Option<(usize, Option<u8>)> {
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if bytes.get(i) != Some(&b'(') {
        return None;
    }
    let mut depth = 0usize;
    let close = loop {
        match bytes.get(i)? {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    break i;
                }
            }
            _ => {}
        }
        i += 1;
    };
    let next = bytes[close + 1..]
        .iter()
        .copied()
        .find(|b| !b.is_ascii_whitespace());
    Some((close, next))
}

/// Blank out comments, string and character literals and preprocessor
/// directives, keeping byte offsets and line breaks.
fn strip_noise(source: &str) -> String {
    let src = source.as_bytes();
    let mut out = Vec::with_capacity(src.len());
    let blank = |b: u8| if b == b'\n' { b'\n' } else { b' ' };
    let mut line_start = true;
    let mut i = 0;

    while i < src.len() {
        let b = src[i];
        if line_start && b == b'#' {
            while i < src.len() && src[i] != b'\n' {
                if src[i] == b'\\' && src.get(i + 1) == Some(&b'\n') {
                    out.extend_from_slice(b" \n");
                    i += 2;
                } else {
                    out.push(b' ');
                    i += 1;
                }
            }
            continue;
        }
        match (b, src.get(i + 1)) {
            (b'/', Some(b'/')) => {
                while i < src.len() && src[i] != b'\n' {
                    out.push(b' ');
                    i += 1;
                }
            }
            (b'/', Some(b'*')) => {
                out.extend_from_slice(b"  ");
                i += 2;
                while i < src.len() && !(src[i] == b'*' && src.get(i + 1) == Some(&b'/')) {
                    out.push(blank(src[i]));
                    i += 1;
                }
                if i < src.len() {
                    out.extend_from_slice(b"  ");
                    i += 2;
                }
            }
            (b'"' | b'\'', _) => {
                out.push(b' ');
                i += 1;
                while i < src.len() && src[i] != b {
                    if src[i] == b'\\' && i + 1 < src.len() {
                        out.push(b' ');
                        out.push(blank(src[i + 1]));
                        i += 2;
                    } else {
                        out.push(blank(src[i]));
                        i += 1;
                    }
                }
                if i < src.len() {
                    out.push(b' ');
                    i += 1;
                }
            }
            _ => {
                if b == b'\n' {
                    line_start = true;
                } else if !b.is_ascii_whitespace() {
                    line_start = false;
                }
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Words that may precede a type without changing it.
const QUALIFIERS: &[&str] = &[
    "static",
    "inline",
    "extern",
    "volatile",
    "register",
    "restrict",
    "__inline",
    "__inline__",
    "__restrict",
    "_Noreturn",
];

/// Words that can never start a declaration; seeing one means the text is a
/// statement, not a signature.
const STATEMENT_KEYWORDS: &[&str] = &[
    "return", "if", "else", "while", "for", "do", "switch", "case", "goto", "sizeof",
    "typedef", "break", "continue", "default",
];

/// Parse a type specifier from a sequence of tokens.
fn parse_base_type(tokens: &[&str]) -> Result<(CType, usize)> {
    let mut pos = 0;
    let mut is_const = false;

    while pos < tokens.len() && (tokens[pos] == "const" || QUALIFIERS.contains(&tokens[pos])) {
        is_const |= tokens[pos] == "const";
        pos += 1;
    }
    if pos >= tokens.len() {
        return Err(FfiError::InvalidCSignature {
            detail: "expected type".to_string(),
        });
    }

    let wrap = |ct: CType| if is_const { CType::Const(Box::new(ct)) } else { ct };
    let skip_int = |pos: usize| if tokens.get(pos) == Some(&"int") { pos + 1 } else { pos };

    // Handle `struct` / `union` / `enum` tags
    if matches!(tokens[pos], "struct" | "union" | "enum") {
        let keyword = tokens[pos];
        pos += 1;
        let Some(name) = tokens.get(pos) else {
            return Err(FfiError::InvalidCSignature {
                detail: format!("expected {keyword} name"),
            });
        };
        pos += 1;
        let ct = match keyword {
            "struct" => CType::Struct(name.to_string()),
            "union" => CType::Union(name.to_string()),
            _ => CType::Enum(name.to_string()),
        };
        return Ok((wrap(ct), pos));
    }

    // Handle `unsigned`/`signed` modifiers
    let is_unsigned = tokens[pos] == "unsigned";
    let is_signed = tokens[pos] == "signed";

    if is_unsigned || is_signed {
        pos += 1;
        let ct = match tokens.get(pos).copied() {
            Some("char") => {
                pos += 1;
                if is_unsigned { CType::UnsignedChar } else { CType::SignedChar }
            }
            Some("short") => {
                pos = skip_int(pos + 1);
                if is_unsigned { CType::UnsignedShort } else { CType::Short }
            }
            Some("int") => {
                pos += 1;
                if is_unsigned { CType::UnsignedInt } else { CType::Int }
            }
            Some("long") => {
                pos += 1;
                if tokens.get(pos) == Some(&"long") {
                    pos = skip_int(pos + 1);
                    if is_unsigned { CType::UnsignedLongLong } else { CType::LongLong }
                } else {
                    pos = skip_int(pos);
                    if is_unsigned { CType::UnsignedLong } else { CType::Long }
                }
            }
            // bare `unsigned` or `signed` means `unsigned int` / `signed int`
            _ => {
                if is_unsigned { CType::UnsignedInt } else { CType::Int }
            }
        };
        return Ok((wrap(ct), pos));
    }

    let ct = match tokens[pos] {
        "void" => { pos += 1; CType::Void }
        "char" => { pos += 1; CType::Char }
        "short" => { pos = skip_int(pos + 1); CType::Short }
        "int" => { pos += 1; CType::Int }
        "long" => {
            pos += 1;
            if tokens.get(pos) == Some(&"long") {
                pos = skip_int(pos + 1);
                CType::LongLong
            } else if tokens.get(pos) == Some(&"double") {
                pos += 1;
                CType::LongDouble
            } else {
                pos = skip_int(pos);
                CType::Long
            }
        }
        "float" => { pos += 1; CType::Float }
        "double" => { pos += 1; CType::Double }
        "_Bool" | "bool" => { pos += 1; CType::Bool }
        "size_t" => { pos += 1; CType::SizeT }
        "ssize_t" => { pos += 1; CType::SSizeT }
        "ptrdiff_t" => { pos += 1; CType::PtrDiff }
        "intptr_t" => { pos += 1; CType::IntPtr }
        "uintptr_t" => { pos += 1; CType::UIntPtr }
        "wchar_t" => { pos += 1; CType::WChar }
        "int8_t" => { pos += 1; CType::Int8 }
        "int16_t" => { pos += 1; CType::Int16 }
        "int32_t" => { pos += 1; CType::Int32 }
        "int64_t" => { pos += 1; CType::Int64 }
        "uint8_t" => { pos += 1; CType::UInt8 }
        "uint16_t" => { pos += 1; CType::UInt16 }
        "uint32_t" => { pos += 1; CType::UInt32 }
        "uint64_t" => { pos += 1; CType::UInt64 }
        other if STATEMENT_KEYWORDS.contains(&other) => {
            return Err(FfiError::InvalidCSignature {
                detail: format!("'{other}' cannot start a declaration"),
            });
        }
        other if other.bytes().all(is_ident) && other.bytes().next().is_some_and(is_ident_start) => {
            pos += 1;
            CType::Named(other.to_string())
        }
        other => {
            return Err(FfiError::InvalidCSignature {
                detail: format!("unknown type '{other}'"),
            });
        }
    };
    Ok((wrap(ct), pos))
}

/// Tokenize a C declaration fragment, splitting on whitespace but keeping `*` as separate tokens.
fn tokenize(s: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for part in s.split_whitespace() {
        let mut remaining = part;
        while !remaining.is_empty() {
            if let Some(star_pos) = remaining.find('*') {
                if star_pos > 0 {
                    tokens.push(&remaining[..star_pos]);
                }
                tokens.push("*");
                remaining = &remaining[star_pos + 1..];
            } else {
                tokens.push(remaining);
                break;
            }
        }
    }
    tokens
}

/// Parse "return_type function_name" from the part before `(`.
fn parse_type_and_name(s: &str) -> Result<(CType, String)> {
    let tokens = tokenize(s);
    if tokens.is_empty() {
        return Err(FfiError::InvalidCSignature {
            detail: "empty return type and name".to_string(),
        });
    }

    let (base_type, consumed) = parse_base_type(&tokens)?;

    let remaining = &tokens[consumed..];
    let mut ptr_count = 0;
    let mut name = None;
    for tok in remaining {
        match *tok {
            "*" => ptr_count += 1,
            "const" => {}
            other if name.is_none() => name = Some(other),
            other => {
                return Err(FfiError::InvalidCSignature {
                    detail: format!("unexpected '{other}' after function name"),
                });
            }
        }
    }

    let name = name.ok_or_else(|| FfiError::InvalidCSignature {
        detail: "missing function name after type".to_string(),
    })?;
    if !name.bytes().all(is_ident) {
        return Err(FfiError::InvalidCSignature {
            detail: format!("invalid function name '{name}'"),
        });
    }

    let mut result_type = base_type;
    for _ in 0..ptr_count {
        result_type = CType::Pointer(Box::new(result_type));
    }

    Ok((result_type, name.to_string()))
}

/// Remove `[...]` suffixes from a parameter declaration, returning the rest
/// and how many array dimensions were removed.
fn strip_array_dims(s: &str) -> Result<(String, usize)> {
    let mut out = String::with_capacity(s.len());
    let mut dims = 0;
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '[' => {
                depth += 1;
                if depth == 1 {
                    dims += 1;
                }
            }
            ']' => {
                depth = depth.checked_sub(1).ok_or_else(|| FfiError::InvalidCSignature {
                    detail: format!("unbalanced ']' in '{s}'"),
                })?;
            }
            c if depth == 0 => out.push(c),
            _ => {}
        }
    }
    Ok((out, dims))
}

/// Parse a single parameter type (no name expected, but name tolerated).
fn parse_param_type(s: &str) -> Result<(CType, String)> {
    let s = s.trim();
    if s.contains('(') {
        return Err(FfiError::InvalidCSignature {
            detail: format!("function pointer parameter '{s}' is not supported"),
        });
    }

    let (decl, dims) = strip_array_dims(s)?;
    let tokens = tokenize(&decl);
    if tokens.is_empty() {
        return Err(FfiError::InvalidCSignature {
            detail: "empty parameter".to_string(),
        });
    }

    let (base_type, consumed) = parse_base_type(&tokens)?;
    let remaining = &tokens[consumed..];

    // Collect pointer stars and optional name; `const` between stars only
    // qualifies the pointer itself.
    let mut ptr_count = dims;
    let mut name = String::new();
    for tok in remaining {
        match *tok {
            "*" => ptr_count += 1,
            "const" => {}
            t if QUALIFIERS.contains(&t) => {}
            t => name = t.to_string(),
        }
    }

    let mut result_type = base_type;
    for _ in 0..ptr_count {
        result_type = CType::Pointer(Box::new(result_type));
    }

    Ok((result_type, name))
}

/// Parse the parameter list between `(` and `)`.
fn parse_params(s: &str) -> Result<(Vec<CParam>, bool)> {
    let s = s.trim();

    if s.is_empty() || s == "void" {
        return Ok((Vec::new(), false));
    }

    let parts: Vec<&str> = s.split(',').collect();
    let mut params = Vec::new();
    let mut is_variadic = false;

    for (i, part) in parts.iter().enumerate() {
        let part = part.trim();
        if part == "..." {
            if i != parts.len() - 1 {
                return Err(FfiError::InvalidCSignature {
                    detail: "'...' must be the last parameter".to_string(),
                });
            }
            is_variadic = true;
            continue;
        }

        let (param_type, param_name) = parse_param_type(part)?;
        if param_type.is_void() {
            return Err(FfiError::InvalidCSignature {
                detail: "parameter of type void".to_string(),
            });
        }
        params.push(CParam {
            param_type,
            name: param_name,
        });
    }

    Ok((params, is_variadic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_function() {
        let sig = CSignature::parse("double sin(double x)").unwrap();
        assert_eq!(sig.name, "sin");
        assert_eq!(sig.return_type, CType::Double);
        assert_eq!(sig.parameters.len(), 1);
        assert_eq!(sig.parameters[0].param_type, CType::Double);
        assert_eq!(sig.parameters[0].name, "x");
        assert!(!sig.is_variadic);
    }

    #[test]
    fn parse_pointer_return() {
        let sig = CSignature::parse("void* grow(size_t size)").unwrap();
        assert_eq!(sig.return_type, CType::Pointer(Box::new(CType::Void)));
        assert_eq!(sig.return_type.category(), CCategory::Pointer);
        assert_eq!(sig.parameters[0].param_type, CType::SizeT);
    }

    #[test]
    fn parse_const_char_pointer() {
        let sig = CSignature::parse("int puts(const char* s)").unwrap();
        assert_eq!(
            sig.parameters[0].param_type,
            CType::Pointer(Box::new(CType::Const(Box::new(CType::Char))))
        );
    }

    #[test]
    fn parse_variadic() {
        let sig = CSignature::parse("int printf(const char* fmt, ...)").unwrap();
        assert!(sig.is_variadic);
        assert_eq!(sig.parameters.len(), 1);
    }

    #[test]
    fn parse_storage_class_and_int_suffixes() {
        let sig =
            CSignature::parse("static inline unsigned long int fold(long long int a, short int b)")
                .unwrap();
        assert_eq!(sig.return_type, CType::UnsignedLong);
        assert_eq!(sig.parameters[0].param_type, CType::LongLong);
        assert_eq!(sig.parameters[1].param_type, CType::Short);
    }

    #[test]
    fn parse_array_parameters_as_pointers() {
        let sig = CSignature::parse("int sum(int a[], int grid[3][4], int n)").unwrap();
        assert_eq!(sig.parameters[0].param_type, CType::Pointer(Box::new(CType::Int)));
        assert_eq!(sig.parameters[0].name, "a");
        assert_eq!(
            sig.parameters[1].param_type,
            CType::Pointer(Box::new(CType::Pointer(Box::new(CType::Int))))
        );
        assert_eq!(sig.parameters[2].param_type, CType::Int);
    }

    #[test]
    fn parse_typedef_and_tagged_types() {
        let sig = CSignature::parse("Record make(struct node *n, enum color c, Record r)")
            .unwrap();
        assert_eq!(sig.return_type, CType::Named("Record".into()));
        assert_eq!(sig.return_type.category(), CCategory::Aggregate);
        assert_eq!(
            sig.parameters[0].param_type,
            CType::Pointer(Box::new(CType::Struct("node".into())))
        );
        assert_eq!(sig.parameters[1].param_type.category(), CCategory::Integer);
        assert_eq!(sig.parameters[2].name, "r");
    }

    #[test]
    fn parse_no_param_names() {
        let sig = CSignature::parse("float sqrtf(float)").unwrap();
        assert_eq!(sig.parameters[0].param_type, CType::Float);
        assert!(sig.parameters[0].name.is_empty());
    }

    #[test]
    fn parse_void_params() {
        let sig = CSignature::parse("int getpid(void)").unwrap();
        assert!(sig.parameters.is_empty());
        assert_eq!(sig.to_string(), "int getpid(void)");
    }

    #[test]
    fn display_round_trips_through_parse() {
        let sig = CSignature::parse("const char * name(wchar_t *w, uint32_t n)").unwrap();
        assert_eq!(CSignature::parse(&sig.to_string()).unwrap(), sig);
    }

    #[test]
    fn rejects_statements_and_function_pointers() {
        assert!(CSignature::parse("return fun(a)").is_err());
        assert!(CSignature::parse("int apply(int (*f)(int), int x)").is_err());
        assert!(CSignature::parse("double sin double x").is_err());
        assert!(CSignature::parse("").is_err());
    }

    #[test]
    fn find_definition_skipping_noise() {
        let source = r#"
            #include <stdio.h>
            #define CALL(x) fun(x) \
                + fun(x)
            // int fun(char c) { return 0; }
            /* int fun(double d); */
            static const char *msg = "int fun(float f) {";
            int helper(int a) { return fun(a) * 2; }
            int fun(int a, int b) {
                return a + b;
            }
        "#;
        let sig = find_signature(source, "fun").unwrap().unwrap();
        assert_eq!(sig.return_type, CType::Int);
        assert_eq!(sig.parameters.len(), 2);
    }

    #[test]
    fn find_prefers_definition_over_prototype() {
        let source = "float fun(int a);\nint other(void) { return 1; }\nfloat fun(int a) { return a; }";
        let sig = find_signature(source, "fun").unwrap().unwrap();
        assert_eq!(sig.return_type, CType::Float);

        let only_prototype = "double fun(double x);";
        let sig = find_signature(only_prototype, "fun").unwrap().unwrap();
        assert_eq!(sig.parameters[0].param_type, CType::Double);
    }

    #[test]
    fn find_after_struct_typedef() {
        let source = "typedef struct {\n\tint first;\n} Record;\nint stru(Record r) { return r.first; }";
        let sig = find_signature(source, "stru").unwrap().unwrap();
        assert_eq!(sig.parameters[0].param_type, CType::Named("Record".into()));
    }

    #[test]
    fn find_missing_symbol() {
        assert_eq!(find_signature("int fun(void) { return 1; }", "fun_x").unwrap(), None);
        assert_eq!(find_signature("junk", "bad").unwrap(), None);
    }
}

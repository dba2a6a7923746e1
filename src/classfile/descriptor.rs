// Descriptor and signature helpers
//
// Extracts the class names a descriptor or generic signature mentions, and
// renders descriptors in the external (Java source) form used by reports.

/// Internal class names in a field or method descriptor, in order
pub fn classes_in_descriptor(descriptor: &str) -> Vec<&str> {
    let mut classes = Vec::new();
    let mut rest = descriptor;

    while let Some(c) = rest.chars().next() {
        if c == 'L' {
            match rest.find(';') {
                Some(end) => {
                    classes.push(&rest[1..end]);
                    rest = &rest[end + 1..];
                }
                None => break,
            }
        } else {
            rest = &rest[c.len_utf8()..];
        }
    }

    classes
}

/// Internal class names in a generic signature, in order. Inner classes of
/// parameterized outer classes come out with their `$` binary name.
pub fn classes_in_signature(signature: &str) -> Vec<String> {
    let mut parser = SignatureParser {
        bytes: signature.as_bytes(),
        pos: 0,
        classes: Vec::new(),
    };
    parser.parse();
    parser.classes
}

struct SignatureParser<'a> {
    bytes: &'a [u8],
    pos: usize,
    classes: Vec<String>,
}

impl SignatureParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn parse(&mut self) {
        if self.peek() == Some(b'<') {
            self.parse_type_parameters();
        }
        while let Some(c) = self.peek() {
            match c {
                b'(' | b')' | b'^' => self.pos += 1,
                _ => {
                    let before = self.pos;
                    self.parse_type();
                    if self.pos == before {
                        self.pos += 1;
                    }
                }
            }
        }
    }

    fn parse_type_parameters(&mut self) {
        self.pos += 1;
        while let Some(c) = self.peek() {
            if c == b'>' {
                self.pos += 1;
                return;
            }
            // identifier
            while matches!(self.peek(), Some(c) if c != b':') {
                self.pos += 1;
            }
            // class bound, then interface bounds; the class bound may be empty
            while self.peek() == Some(b':') {
                self.pos += 1;
                if !matches!(self.peek(), Some(b':') | Some(b'>') | None) {
                    self.parse_type();
                }
            }
        }
    }

    fn parse_type(&mut self) {
        match self.peek() {
            Some(b'L') => self.parse_class_type(),
            Some(b'T') => {
                while matches!(self.peek(), Some(c) if c != b';') {
                    self.pos += 1;
                }
                self.pos += 1;
            }
            Some(b'[') => {
                self.pos += 1;
                self.parse_type();
            }
            Some(_) => self.pos += 1,
            None => {}
        }
    }

    fn parse_class_type(&mut self) {
        self.pos += 1;
        let mut name = self.identifier();
        loop {
            match self.peek() {
                Some(b'<') => self.parse_type_arguments(),
                Some(b'.') => {
                    self.classes.push(name.clone());
                    self.pos += 1;
                    name = format!("{}${}", name, self.identifier());
                }
                Some(b';') => {
                    self.pos += 1;
                    break;
                }
                _ => break,
            }
        }
        self.classes.push(name);
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c != b'<' && c != b'.' && c != b';') {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn parse_type_arguments(&mut self) {
        self.pos += 1;
        while let Some(c) = self.peek() {
            match c {
                b'>' => {
                    self.pos += 1;
                    return;
                }
                b'*' | b'+' | b'-' => self.pos += 1,
                _ => {
                    let before = self.pos;
                    self.parse_type();
                    if self.pos == before {
                        self.pos += 1;
                    }
                }
            }
        }
    }
}

/// Element class of an array class name (`[[Lfoo/Bar;` gives `foo/Bar`)
pub fn array_element_class(name: &str) -> Option<&str> {
    let element = name.trim_start_matches('[');
    if element.len() == name.len() {
        return Some(name);
    }
    element.strip_prefix('L')?.strip_suffix(';')
}

pub fn external_class_name(name: &str) -> String {
    name.replace('/', ".")
}

pub fn internal_class_name(name: &str) -> String {
    name.replace('.', "/")
}

/// Kotlin metadata names nested classes with dots (`a/Outer.Inner`)
pub fn kotlin_class_name_to_internal(name: &str) -> String {
    name.replace('.', "$")
}

/// Java source form of a single field type
pub fn external_type(descriptor: &str) -> String {
    let dimensions = descriptor.chars().take_while(|&c| c == '[').count();
    let element = &descriptor[dimensions..];
    let base = match element.chars().next() {
        Some('B') => "byte".to_string(),
        Some('C') => "char".to_string(),
        Some('D') => "double".to_string(),
        Some('F') => "float".to_string(),
        Some('I') => "int".to_string(),
        Some('J') => "long".to_string(),
        Some('S') => "short".to_string(),
        Some('Z') => "boolean".to_string(),
        Some('V') => "void".to_string(),
        Some('L') => external_class_name(element.trim_start_matches('L').trim_end_matches(';')),
        _ => element.to_string(),
    };
    format!("{}{}", base, "[]".repeat(dimensions))
}

/// Java source form of a method, e.g. `void run(java.lang.String,int)`
pub fn external_method(name: &str, descriptor: &str) -> String {
    let Some(close) = descriptor.find(')') else {
        return format!("{}{}", name, descriptor);
    };
    let parameter_list = &descriptor[..close];
    let parameters = split_parameter_types(parameter_list.strip_prefix('(').unwrap_or(parameter_list));
    let return_type = external_type(&descriptor[close + 1..]);

    format!(
        "{} {}({})",
        return_type,
        name,
        parameters
            .iter()
            .map(|p| external_type(p))
            .collect::<Vec<_>>()
            .join(",")
    )
}

fn split_parameter_types(parameters: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;

    for (pos, c) in parameters.char_indices() {
        // still inside the previous class name
        if pos < start {
            continue;
        }
        match c {
            '[' => {}
            'L' => {
                let end = parameters[pos..].find(';').map_or(parameters.len(), |end| pos + end + 1);
                result.push(&parameters[start..end]);
                start = end;
            }
            _ => {
                let end = pos + c.len_utf8();
                result.push(&parameters[start..end]);
                start = end;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_in_method_descriptor() {
        let classes = classes_in_descriptor("(ILjava/lang/String;[Lcom/Lib;J)Lcom/example/Result;");
        assert_eq!(classes, vec!["java/lang/String", "com/Lib", "com/example/Result"]);
    }

    #[test]
    fn test_classes_in_primitive_descriptor() {
        assert!(classes_in_descriptor("(IJZ)V").is_empty());
        assert!(classes_in_descriptor("[[D").is_empty());
    }

    #[test]
    fn test_classes_in_generic_signature() {
        let classes = classes_in_signature(
            "<T:Ljava/lang/Object;U::Ljava/lang/Comparable<TT;>;>(Ljava/util/List<+TT;>;)Ljava/util/Map<TU;[Lcom/Value;>;^Ljava/io/IOException;",
        );
        assert_eq!(
            classes,
            vec![
                "java/lang/Object",
                "java/lang/Comparable",
                "java/util/List",
                "com/Value",
                "java/util/Map",
                "java/io/IOException"
            ]
        );
    }

    #[test]
    fn test_inner_class_signature() {
        let classes = classes_in_signature("Lcom/Outer<Ljava/lang/String;>.Inner<*>;");
        assert_eq!(classes, vec!["java/lang/String", "com/Outer", "com/Outer$Inner"]);
    }

    #[test]
    fn test_array_element_class() {
        assert_eq!(array_element_class("com/Foo"), Some("com/Foo"));
        assert_eq!(array_element_class("[[Lcom/Foo;"), Some("com/Foo"));
        assert_eq!(array_element_class("[I"), None);
    }

    #[test]
    fn test_external_forms() {
        assert_eq!(external_type("[[I"), "int[][]");
        assert_eq!(external_type("Ljava/lang/String;"), "java.lang.String");
        assert_eq!(
            external_method("copy", "([BILjava/util/List;)[Ljava/lang/Object;"),
            "java.lang.Object[] copy(byte[],int,java.util.List)"
        );
        assert_eq!(external_method("<init>", "()V"), "void <init>()");
    }

    #[test]
    fn test_external_method_with_non_ascii_descriptor() {
        assert_eq!(
            external_method("run", "(Lcom/Ünï;é[é)V"),
            "void run(com.Ünï,é,é[])"
        );
        assert_eq!(external_method("broken", "(Lcom/Ü)V"), "void broken(com.Ü)");
        assert_eq!(external_method("bare", "é)V"), "void bare(é)");
    }
}

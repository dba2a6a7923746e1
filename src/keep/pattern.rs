// ProGuard-style wildcard patterns
//
// Class patterns use Java notation: `?` matches one character other than a
// package separator, `*` any run of them, `**` anything including separators.
// A pattern list like `!com.foo.**,com.**` is not supported.

use crate::config::{MemberKind, MemberSpec};
use miette::{IntoDiagnostic, Result, WrapErr};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct ClassPattern {
    source: String,
    regex: Regex,
}

impl ClassPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&wildcard_to_regex(pattern, '.'))
            .into_diagnostic()
            .wrap_err_with(|| format!("Invalid class pattern: {}", pattern))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Match an external (dotted) class name
    pub fn matches(&self, class_name: &str) -> bool {
        self.regex.is_match(class_name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Member name and descriptor filter of a keep rule
#[derive(Debug, Clone)]
pub struct MemberPattern {
    kind: MemberKind,
    name: Option<Regex>,
    descriptor: Option<String>,
}

impl MemberPattern {
    pub fn new(spec: &MemberSpec) -> Result<Self> {
        let (kind, name) = match spec.name.as_str() {
            "<methods>" => (MemberKind::Method, None),
            "<fields>" => (MemberKind::Field, None),
            "*" => (spec.kind, None),
            name => {
                let regex = Regex::new(&wildcard_to_regex(name, '.'))
                    .into_diagnostic()
                    .wrap_err_with(|| format!("Invalid member pattern: {}", name))?;
                (spec.kind, Some(regex))
            }
        };
        Ok(Self {
            kind,
            name,
            descriptor: spec.descriptor.clone(),
        })
    }

    pub fn matches_field(&self, name: &str, descriptor: &str) -> bool {
        self.kind != MemberKind::Method && self.matches(name, descriptor)
    }

    pub fn matches_method(&self, name: &str, descriptor: &str) -> bool {
        if self.kind == MemberKind::Field {
            return false;
        }
        // Initializers are only kept by name
        if name.starts_with('<') && self.name.is_none() {
            return false;
        }
        self.matches(name, descriptor)
    }

    fn matches(&self, name: &str, descriptor: &str) -> bool {
        let name_matches = self.name.as_ref().map_or(true, |regex| regex.is_match(name));
        let descriptor_matches = self.descriptor.as_deref().map_or(true, |d| d == descriptor);
        name_matches && descriptor_matches
    }
}

/// Translate a wildcard pattern into an anchored regex
fn wildcard_to_regex(pattern: &str, separator: char) -> String {
    let separator = regex::escape(&separator.to_string());
    let mut regex = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                regex.push_str(".*");
            }
            '*' => regex.push_str(&format!("[^{}]*", separator)),
            '?' => regex.push_str(&format!("[^{}]", separator)),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }

    regex.push('$');
    regex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(kind: MemberKind, name: &str, descriptor: Option<&str>) -> MemberPattern {
        MemberPattern::new(&MemberSpec {
            kind,
            name: name.to_string(),
            descriptor: descriptor.map(str::to_string),
        })
        .unwrap()
    }

    #[test]
    fn test_single_star_stays_in_package() {
        let pattern = ClassPattern::new("com.example.*").unwrap();
        assert!(pattern.matches("com.example.Main"));
        assert!(!pattern.matches("com.example.ui.MainActivity"));
        assert!(!pattern.matches("com.examples.Main"));
    }

    #[test]
    fn test_double_star_crosses_packages() {
        let pattern = ClassPattern::new("com.example.**").unwrap();
        assert!(pattern.matches("com.example.Main"));
        assert!(pattern.matches("com.example.ui.MainActivity"));
        assert!(!pattern.matches("org.example.Main"));
    }

    #[test]
    fn test_question_mark_and_inner_classes() {
        let pattern = ClassPattern::new("app.Outer$Inner?").unwrap();
        assert!(pattern.matches("app.Outer$Inner1"));
        assert!(!pattern.matches("app.Outer$Inner"));
        assert!(!pattern.matches("app.Outer$Inner12"));
    }

    #[test]
    fn test_member_selectors() {
        let methods = member(MemberKind::Any, "<methods>", None);
        assert!(methods.matches_method("run", "()V"));
        assert!(!methods.matches_method("<init>", "()V"));
        assert!(!methods.matches_field("count", "I"));

        let init = member(MemberKind::Method, "<init>", Some("()V"));
        assert!(init.matches_method("<init>", "()V"));
        assert!(!init.matches_method("<init>", "(I)V"));

        let getters = member(MemberKind::Method, "get*", None);
        assert!(getters.matches_method("getName", "()Ljava/lang/String;"));
        assert!(!getters.matches_method("setName", "(Ljava/lang/String;)V"));

        let fields = member(MemberKind::Any, "<fields>", None);
        assert!(fields.matches_field("count", "I"));
        assert!(!fields.matches_method("count", "()I"));
    }
}

// ProGuard `-printusage` style listing
//
// Format:
// ```
// com.example.UnusedClass
// com.example.PartiallyUsedClass
//     private int unusedField
//     public void unusedMethod(java.lang.String)
// ```
//
// A class line without member lines means the whole class is unused.

use crate::classfile::descriptor::{external_class_name, external_method, external_type};
use crate::classfile::{access, ClassId, ClassPool, Entity, MemberId, ProgramClass, ProgramMember, METHOD_NAME_INIT};
use crate::mark::UsageMarker;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Program classes and members left unmarked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub classes: Vec<UnusedClass>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnusedClass {
    /// External class name
    pub name: String,
    /// The class itself is unused, so all its members are too
    pub whole_class: bool,
    /// Unused members in Java notation, empty for whole classes
    pub members: Vec<String>,
}

impl UsageReport {
    pub fn collect<M: UsageMarker>(pool: &ClassPool, marker: &M) -> Self {
        let mut classes: Vec<UnusedClass> = pool
            .program_classes()
            .filter_map(|(id, class)| unused_class(id, class, marker))
            .collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        Self { classes }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn unused_class_count(&self) -> usize {
        self.classes.iter().filter(|c| c.whole_class).count()
    }

    /// Unused members of classes that are themselves used
    pub fn unused_member_count(&self) -> usize {
        self.classes.iter().map(|c| c.members.len()).sum()
    }

    pub fn to_proguard_format(&self) -> String {
        let mut output = String::new();
        for class in &self.classes {
            output.push_str(&class.name);
            output.push('\n');
            for member in &class.members {
                output.push_str("    ");
                output.push_str(member);
                output.push('\n');
            }
        }
        output
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_proguard_format())
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write usage file: {}", path.display()))?;
        info!(
            "Wrote {} unused classes and {} unused members to {}",
            self.unused_class_count(),
            self.unused_member_count(),
            path.display()
        );
        Ok(())
    }
}

fn unused_class<M: UsageMarker>(id: ClassId, class: &ProgramClass, marker: &M) -> Option<UnusedClass> {
    let name = external_class_name(class.name());

    if !marker.is_used(Entity::Class(id)) {
        return Some(UnusedClass {
            name,
            whole_class: true,
            members: Vec::new(),
        });
    }

    let fields = class.fields.iter().enumerate().filter_map(|(index, field)| {
        let entity = Entity::Field(MemberId::new(id, index as u16));
        (!marker.is_used(entity)).then(|| describe_field(class, field))
    });
    let methods = class.methods.iter().enumerate().filter_map(|(index, method)| {
        let entity = Entity::Method(MemberId::new(id, index as u16));
        (!marker.is_used(entity)).then(|| describe_method(class, method))
    });
    let members: Vec<String> = fields.chain(methods).collect();

    if members.is_empty() {
        return None;
    }
    Some(UnusedClass {
        name,
        whole_class: false,
        members,
    })
}

fn describe_field(class: &ProgramClass, field: &ProgramMember) -> String {
    format!(
        "{}{} {}",
        modifiers(field.access_flags, false),
        external_type(class.member_descriptor(field)),
        class.member_name(field)
    )
}

fn describe_method(class: &ProgramClass, method: &ProgramMember) -> String {
    let name = class.member_name(method);
    let descriptor = class.member_descriptor(method);
    let signature = if name == METHOD_NAME_INIT {
        // Constructors print as the simple class name, without a return type
        let simple_name = class.name().rsplit('/').next().unwrap_or_default();
        let external = external_method(simple_name, descriptor);
        external
            .split_once(' ')
            .map(|(_, rest)| rest.to_string())
            .unwrap_or(external)
    } else {
        external_method(name, descriptor)
    };
    format!("{}{}", modifiers(method.access_flags, true), signature)
}

fn modifiers(access_flags: u16, is_method: bool) -> String {
    let mut words = Vec::new();
    if access_flags & access::PUBLIC != 0 {
        words.push("public");
    } else if access_flags & access::PRIVATE != 0 {
        words.push("private");
    } else if access_flags & access::PROTECTED != 0 {
        words.push("protected");
    }
    if access_flags & access::STATIC != 0 {
        words.push("static");
    }
    if access_flags & access::FINAL != 0 {
        words.push("final");
    }
    if is_method {
        if access_flags & access::SYNCHRONIZED != 0 {
            words.push("synchronized");
        }
        if access_flags & access::NATIVE != 0 {
            words.push("native");
        }
        if access_flags & access::ABSTRACT != 0 {
            words.push("abstract");
        }
    }

    words.iter().map(|word| format!("{} ", word)).collect()
}

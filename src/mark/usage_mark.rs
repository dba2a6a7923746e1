// Usage marks and the reasons recorded with them

use crate::classfile::Entity;
use std::fmt;
use std::rc::Rc;

/// Reachability of a marked entity; unmarked entities are unused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageState {
    /// Needed if its class turns out to be used
    PossiblyUsed,
    Used,
}

impl UsageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageState::PossiblyUsed => "possibly used",
            UsageState::Used => "used",
        }
    }
}

impl fmt::Display for UsageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an entity was marked, relative to the entity that caused it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reason {
    /// A keep rule names the entity
    KeptByDirective(String),
    /// A keep rule names the entity, but only applies if its class is used
    KeptConditionally(String),
    ExtendedBy,
    ImplementedBy,
    MemberOf,
    DeclaredBy,
    ReferencedByField,
    ReferencedByMethod,
    MethodHierarchy,
    ClassConstant,
    StringConstant,
    MemberReference,
    MethodType,
    DynamicConstant,
    Annotation,
    Attribute,
    KotlinMetadata,
}

impl Reason {
    pub fn description(&self) -> String {
        match self {
            Reason::KeptByDirective(rule) => format!("is kept by a directive in the configuration ({})", rule),
            Reason::KeptConditionally(rule) => {
                format!("is conditionally kept by a directive in the configuration ({})", rule)
            }
            other => other.verb().to_string(),
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Reason::KeptByDirective(_) | Reason::KeptConditionally(_) => "is kept by a directive in the configuration",
            Reason::ExtendedBy => "is extended by",
            Reason::ImplementedBy => "is implemented by",
            Reason::MemberOf => "is a member of",
            Reason::DeclaredBy => "is declared by",
            Reason::ReferencedByField => "is referenced by field",
            Reason::ReferencedByMethod => "is referenced by method",
            Reason::MethodHierarchy => "is in the method hierarchy of",
            Reason::ClassConstant => "is referenced by class constant",
            Reason::StringConstant => "is referenced by string constant",
            Reason::MemberReference => "is referenced by member reference",
            Reason::MethodType => "is referenced by method type",
            Reason::DynamicConstant => "is referenced by dynamic constant",
            Reason::Annotation => "is referenced by annotation",
            Reason::Attribute => "is referenced by attribute",
            Reason::KotlinMetadata => "is referenced by Kotlin metadata",
        }
    }

    /// Whether an entity marked for this reason is used unconditionally
    pub fn is_certain(&self) -> bool {
        !matches!(self, Reason::KeptConditionally(_))
    }

    /// Depth added to a chain by one step of this reason
    pub fn cost(&self) -> u32 {
        match self {
            Reason::KeptByDirective(_) | Reason::KeptConditionally(_) => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// One link of a justification chain
#[derive(Debug)]
pub struct ShortestUsageMark {
    reason: Reason,
    certain: bool,
    depth: u32,
    producer: Option<Entity>,
    previous: Option<Rc<ShortestUsageMark>>,
}

impl ShortestUsageMark {
    pub fn root(reason: Reason) -> Self {
        Self {
            certain: reason.is_certain(),
            depth: 0,
            reason,
            producer: None,
            previous: None,
        }
    }

    /// A mark caused by `producer`, whose own mark is `previous`
    pub fn derive(previous: Rc<ShortestUsageMark>, reason: Reason, producer: Option<Entity>) -> Self {
        Self {
            certain: previous.certain && reason.is_certain(),
            depth: previous.depth + reason.cost(),
            reason,
            producer,
            previous: Some(previous),
        }
    }

    pub fn reason(&self) -> &Reason {
        &self.reason
    }

    pub fn is_certain(&self) -> bool {
        self.certain
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn producer(&self) -> Option<Entity> {
        self.producer
    }

    pub fn previous(&self) -> Option<&Rc<ShortestUsageMark>> {
        self.previous.as_ref()
    }

    /// Certain beats uncertain, then the shorter chain wins
    pub fn is_shorter_than(&self, other: &ShortestUsageMark) -> bool {
        if self.certain != other.certain {
            return self.certain;
        }
        self.depth < other.depth
    }

    /// This mark followed by every mark it derives from
    pub fn chain(&self) -> impl Iterator<Item = &ShortestUsageMark> {
        std::iter::successors(Some(self), |mark| mark.previous.as_deref())
    }
}

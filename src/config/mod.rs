mod loader;

pub use loader::{Config, KeepKind, KeepRule, MemberKind, MemberSpec, ReportConfig};

//! Keep rule integration tests
//!
//! Loads a configuration file, seeds the marker from its rules and checks the
//! resulting usage report.

use classmark::classfile::{access, ClassPool, Clazz, Entity, LibraryClass, MemberId, ProgramClassBuilder};
use classmark::mark::{ClassUsageMarker, SimpleUsageMarker, UsageMarker};
use classmark::report::UsageReport;
use classmark::{Config, KeepMarker, KeepStats};
use std::fs;
use tempfile::TempDir;

const CONFIG: &str = r#"
keep:
  - class: app.Main
    members:
      - kind: method
        name: main
        descriptor: "([Ljava/lang/String;)V"
  - class: "app.plugin.*"
    extends: app.Plugin
    members:
      - name: "<methods>"
  - class: app.Dead
    kind: class_members
    members:
      - name: run
  - class: app.Missing
print_usage: usage.txt
"#;

fn object() -> Clazz {
    LibraryClass::new(access::PUBLIC, "java/lang/Object", None)
        .with_method(access::PUBLIC, "<init>", "()V")
        .into()
}

fn pool() -> ClassPool {
    let main = ProgramClassBuilder::new(access::PUBLIC, "app/Main", Some("java/lang/Object"))
        .method_with_code(access::PUBLIC | access::STATIC, "main", "([Ljava/lang/String;)V", |code| {
            code.invokestatic("app/Util", "helper", "()V").return_();
        })
        .method(access::PUBLIC | access::STATIC, "unused", "()V")
        .build();
    let util = ProgramClassBuilder::new(access::PUBLIC, "app/Util", Some("java/lang/Object"))
        .method(access::PUBLIC | access::STATIC, "helper", "()V")
        .method(access::PUBLIC | access::STATIC, "dead", "()V")
        .build();
    let plugin = ProgramClassBuilder::new(access::PUBLIC | access::ABSTRACT, "app/Plugin", Some("java/lang/Object"))
        .build();
    let greeter = ProgramClassBuilder::new(access::PUBLIC, "app/plugin/Greeter", Some("app/Plugin"))
        .method(access::PUBLIC, "<init>", "()V")
        .method(access::PUBLIC, "greet", "()V")
        .build();
    let loose = ProgramClassBuilder::new(access::PUBLIC, "app/plugin/Loose", Some("java/lang/Object"))
        .method(access::PUBLIC, "greet", "()V")
        .build();
    let dead = ProgramClassBuilder::new(access::PUBLIC, "app/Dead", Some("java/lang/Object"))
        .method(access::PUBLIC, "run", "()V")
        .build();
    ClassPool::new(vec![object(), main, util, plugin, greeter, loose, dead])
}

fn load_config(temp: &TempDir) -> Config {
    let path = temp.path().join("classmark.yml");
    fs::write(&path, CONFIG).unwrap();
    Config::from_file(&path).unwrap()
}

fn mark(pool: &ClassPool, config: &Config) -> (KeepStats, SimpleUsageMarker) {
    let keep = KeepMarker::new(config).unwrap();
    let mut marker = ClassUsageMarker::new(pool, SimpleUsageMarker::new());
    let stats = keep.mark_roots(&mut marker).unwrap();
    marker.finish().unwrap();
    (stats, marker.into_usage_marker())
}

#[test]
fn test_rules_seed_the_expected_roots() {
    let temp = TempDir::new().unwrap();
    let config = load_config(&temp);
    let pool = pool();

    let (stats, _) = mark(&pool, &config);

    assert_eq!(
        stats,
        KeepStats {
            classes: 2,
            members: 3,
            unmatched_rules: 1,
        }
    );
}

#[test]
fn test_usage_report_from_config() {
    let temp = TempDir::new().unwrap();
    let config = load_config(&temp);
    let pool = pool();

    let (_, marker) = mark(&pool, &config);
    let report = UsageReport::collect(&pool, &marker);

    let expected = "\
app.Dead
app.Main
    public static void unused()
app.Util
    public static void dead()
app.plugin.Greeter
    public Greeter()
app.plugin.Loose
";
    assert_eq!(report.to_proguard_format(), expected);
    assert_eq!(report.unused_class_count(), 2);
    assert_eq!(report.unused_member_count(), 3);
}

#[test]
fn test_print_usage_path_is_written() {
    let temp = TempDir::new().unwrap();
    let config = load_config(&temp);
    let pool = pool();

    let (_, marker) = mark(&pool, &config);
    let path = temp.path().join(config.print_usage.as_ref().unwrap());
    UsageReport::collect(&pool, &marker).write(&path).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("app.Dead\n"));
    assert!(content.contains("    public static void dead()\n"));
}

#[test]
fn test_extends_filter_keeps_the_super_class() {
    let temp = TempDir::new().unwrap();
    let config = load_config(&temp);
    let pool = pool();

    let (_, marker) = mark(&pool, &config);
    let greeter = pool.find("app/plugin/Greeter").unwrap();

    assert!(marker.is_used(Entity::Class(greeter)));
    assert!(marker.is_used(Entity::Method(MemberId::new(greeter, 1))));
    assert!(marker.is_used(Entity::Class(pool.find("app/Plugin").unwrap())));
    assert!(!marker.is_used(Entity::Class(pool.find("app/plugin/Loose").unwrap())));
}

#[test]
fn test_class_members_rule_waits_for_its_class() {
    let temp = TempDir::new().unwrap();
    let config = load_config(&temp);
    let pool = pool();

    let (_, marker) = mark(&pool, &config);
    let dead = pool.find("app/Dead").unwrap();
    let run = Entity::Method(MemberId::new(dead, 0));

    assert!(!marker.is_used(Entity::Class(dead)));
    assert!(!marker.is_used(run));
    assert!(marker.is_possibly_used(run));
}

#[test]
fn test_class_members_rule_applies_once_the_class_is_used() {
    let temp = TempDir::new().unwrap();
    let mut config = load_config(&temp);
    config.keep[2].class = "app.Util".to_string();
    config.keep[2].members[0].name = "dead".to_string();
    let pool = pool();

    let (_, marker) = mark(&pool, &config);
    let util = pool.find("app/Util").unwrap();

    assert!(marker.is_used(Entity::Class(util)));
    assert!(marker.is_used(Entity::Method(MemberId::new(util, 1))));
    assert!(!marker.is_used(Entity::Class(pool.find("app/Dead").unwrap())));
}

#[test]
fn test_invalid_config_is_an_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("classmark.yml");
    fs::write(&path, "keep: [ { members: 3 } ]").unwrap();

    assert!(Config::from_file(&path).is_err());
}

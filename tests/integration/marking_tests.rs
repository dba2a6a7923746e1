//! Marking integration tests
//!
//! These tests drive the marker through its public API over small pools and
//! check the properties every marking must have.

use classmark::classfile::{
    access, AttributeId, AttributeKind, AttributeOwner, ClassId, ClassPool, Clazz, Constant, Entity,
    InnerClassesInfo, LibraryClass, MemberId, ProgramClass, ProgramClassBuilder,
};
use classmark::mark::{
    ClassUsageMarker, Reason, ShortestClassUsageMarker, ShortestUsageMarker, SimpleUsageMarker, UsageMarker,
};
use classmark::report::UsageReport;
use std::rc::Rc;

fn object() -> Clazz {
    LibraryClass::new(access::PUBLIC, "java/lang/Object", None)
        .with_method(access::PUBLIC, "<init>", "()V")
        .with_method(access::PUBLIC, "toString", "()Ljava/lang/String;")
        .with_method(access::PUBLIC, "hashCode", "()I")
        .into()
}

fn id(pool: &ClassPool, name: &str) -> ClassId {
    pool.find(name).unwrap()
}

fn program<'p>(pool: &'p ClassPool, name: &str) -> &'p ProgramClass {
    pool.program_class(id(pool, name)).unwrap()
}

/// Index of the class constant naming `name` in `class`'s constant pool
fn class_constant(class: &ProgramClass, name: &str) -> u16 {
    class
        .constant_pool
        .iter()
        .find(|(index, constant)| {
            matches!(constant, Constant::Class { .. }) && class.constant_pool.class_name(*index) == Some(name)
        })
        .map(|(index, _)| index)
        .unwrap()
}

/// Root extends A, A has a field of type B, Main calls into Root
fn app_pool() -> ClassPool {
    let main = ProgramClassBuilder::new(access::PUBLIC, "app/Main", Some("java/lang/Object"))
        .method_with_code(access::PUBLIC | access::STATIC, "main", "([Ljava/lang/String;)V", |code| {
            code.new_instance("app/Root")
                .dup()
                .invokespecial("app/Root", "<init>", "()V")
                .invokevirtual("app/Root", "start", "()V")
                .return_();
        })
        .method(access::PUBLIC | access::STATIC, "unused", "()V")
        .build();
    let a = ProgramClassBuilder::new(access::PUBLIC | access::ABSTRACT, "app/A", Some("java/lang/Object"))
        .field(access::PROTECTED, "b", "Lapp/B;")
        .method_with_code(access::PUBLIC, "<init>", "()V", |code| {
            code.aload_0().invokespecial("java/lang/Object", "<init>", "()V").return_();
        })
        .method(access::PUBLIC | access::ABSTRACT, "start", "()V")
        .build();
    let b = ProgramClassBuilder::new(access::PUBLIC, "app/B", Some("java/lang/Object")).build();
    let root = ProgramClassBuilder::new(access::PUBLIC, "app/Root", Some("app/A"))
        .method_with_code(access::PUBLIC, "<init>", "()V", |code| {
            code.aload_0().invokespecial("app/A", "<init>", "()V").return_();
        })
        .method_with_code(access::PUBLIC, "start", "()V", |code| {
            code.aload_0().getfield("app/A", "b", "Lapp/B;").pop().return_();
        })
        .method(access::PUBLIC, "stop", "()V")
        .build();
    let dead = ProgramClassBuilder::new(access::PUBLIC, "app/Dead", Some("java/lang/Object"))
        .method(access::PUBLIC, "run", "()V")
        .build();
    ClassPool::new(vec![object(), main, a, b, root, dead])
}

fn keep_main<M: UsageMarker>(marker: &mut ClassUsageMarker<'_, M>, pool: &ClassPool) {
    let main = id(pool, "app/Main");
    marker
        .mark_root(Reason::KeptByDirective("-keep class app.Main { main(...); }".into()), |m| {
            m.visit_class(main)?;
            m.visit_method(MemberId::new(main, 0))
        })
        .unwrap();
    marker.finish().unwrap();
}

// ============================================================================
// Reachability
// ============================================================================

#[test]
fn test_reachable_classes_and_members_are_used() {
    let pool = app_pool();
    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    keep_main(&mut marker, &pool);

    for name in ["app/Main", "app/A", "app/B", "app/Root"] {
        assert!(marker.is_used(Entity::Class(id(&pool, name))), "{} should be used", name);
    }
    let root = id(&pool, "app/Root");
    let a = id(&pool, "app/A");
    assert!(marker.is_used(Entity::Method(MemberId::new(root, 1))));
    assert!(marker.is_used(Entity::Field(MemberId::new(a, 0))));
    assert!(marker.is_used(Entity::Method(MemberId::new(a, 0))));
}

#[test]
fn test_unreachable_classes_and_members_stay_unmarked() {
    let pool = app_pool();
    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    keep_main(&mut marker, &pool);

    let dead = id(&pool, "app/Dead");
    assert!(!marker.is_used(Entity::Class(dead)));
    assert!(!marker.is_possibly_used(Entity::Class(dead)));
    assert!(!marker.is_used(Entity::Method(MemberId::new(dead, 0))));
    assert!(!marker.is_used(Entity::Method(MemberId::new(id(&pool, "app/Root"), 2))));
    assert!(!marker.is_used(Entity::Method(MemberId::new(id(&pool, "app/Main"), 1))));
}

#[test]
fn test_print_usage_lists_unused_code() {
    let pool = app_pool();
    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    keep_main(&mut marker, &pool);

    let usage = UsageReport::collect(&pool, marker.usage_marker()).to_proguard_format();
    assert!(usage.contains("app.Dead\n"));
    assert!(usage.contains("app.Main\n    public static void unused()\n"));
    assert!(usage.contains("app.Root\n    public void stop()\n"));
    assert!(!usage.contains("app.B\n"));
    assert!(!usage.contains("java.lang.Object"));
}

// ============================================================================
// Mark invariants
// ============================================================================

#[test]
fn test_marking_twice_changes_nothing() {
    let pool = app_pool();
    let mut marker = ShortestClassUsageMarker::new(&pool);
    keep_main(&mut *marker, &pool);

    let before = marker.usage_marker().marked_entities();
    let b = Entity::Class(id(&pool, "app/B"));
    let reason_before = marker.explain(b);
    let certain_before = marker.usage_marker().usage_mark(b).unwrap().is_certain();

    keep_main(&mut *marker, &pool);

    assert_eq!(marker.usage_marker().marked_entities(), before);
    assert_eq!(marker.explain(b), reason_before);
    assert_eq!(marker.usage_marker().usage_mark(b).unwrap().is_certain(), certain_before);
}

#[test]
fn test_used_marks_are_monotonic() {
    let pool = app_pool();
    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    keep_main(&mut marker, &pool);

    let used: Vec<Entity> = marker
        .usage_marker()
        .marked_entities()
        .into_iter()
        .filter(|(entity, _)| marker.is_used(*entity))
        .map(|(entity, _)| entity)
        .collect();
    assert!(!used.is_empty());

    let usage = marker.usage_marker_mut();
    for entity in &used {
        usage.mark_as_possibly_used(*entity);
        assert!(!usage.mark_as_unused(*entity));
    }
    for entity in &used {
        assert!(usage.is_used(*entity));
        assert!(!usage.is_possibly_used(*entity));
    }
}

#[test]
fn test_cyclic_references_terminate() {
    let ping = ProgramClassBuilder::new(access::PUBLIC, "c/Ping", Some("c/Pong"))
        .field(access::PRIVATE, "pong", "Lc/Pong;")
        .method_with_code(access::PUBLIC, "call", "()V", |code| {
            code.aload_0().invokevirtual("c/Pong", "call", "()V").return_();
        })
        .build();
    let pong = ProgramClassBuilder::new(access::PUBLIC, "c/Pong", Some("c/Ping"))
        .field(access::PRIVATE, "ping", "Lc/Ping;")
        .method_with_code(access::PUBLIC, "call", "()V", |code| {
            code.aload_0().invokevirtual("c/Ping", "call", "()V").ldc_class("c/Pong").pop().return_();
        })
        .build();
    let pool = ClassPool::new(vec![ping, pong]);
    let ping = id(&pool, "c/Ping");
    let pong = id(&pool, "c/Pong");

    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    marker.visit_class(ping).unwrap();
    marker.visit_method(MemberId::new(ping, 0)).unwrap();
    marker.finish().unwrap();

    assert!(marker.is_used(Entity::Class(pong)));
    assert!(marker.is_used(Entity::Method(MemberId::new(pong, 0))));
}

// ============================================================================
// Reasons
// ============================================================================

#[test]
fn test_class_constant_reason_is_certain() {
    let user = ProgramClassBuilder::new(access::PUBLIC, "r/User", None)
        .method_with_code(access::PUBLIC | access::STATIC, "load", "()V", |code| {
            code.ldc_class("r/Target").pop().return_();
        })
        .build();
    let target = ProgramClassBuilder::new(access::PUBLIC, "r/Target", None).build();
    let pool = ClassPool::new(vec![user, target]);
    let user_id = id(&pool, "r/User");
    let user = program(&pool, "r/User");
    let index = class_constant(user, "r/Target");

    let mut marker = ShortestClassUsageMarker::new(&pool);
    marker
        .mark_root(Reason::KeptByDirective("-keep class r.User".into()), |m| {
            m.visit_class(user_id)?;
            m.visit_class_constant(user_id, user, index)
        })
        .unwrap();

    let target = Entity::Class(id(&pool, "r/Target"));
    let chain = marker.explain(target);
    assert_eq!(chain[0], (Reason::ClassConstant, Some(Entity::Constant(user_id, index))));
    assert_eq!(chain[0].0.to_string(), "is referenced by class constant");
    assert!(marker.usage_marker().usage_mark(target).unwrap().is_certain());
}

#[test]
fn test_this_class_constant_shares_the_class_mark() {
    let class = ProgramClassBuilder::new(access::PUBLIC, "s/Solo", None).build();
    let pool = ClassPool::new(vec![class]);
    let solo = id(&pool, "s/Solo");
    let program = program(&pool, "s/Solo");

    let mut marker = ClassUsageMarker::new(&pool, ShortestUsageMarker::new());
    marker.visit_program_class(solo, program).unwrap();

    let usage = marker.usage_marker();
    let class_mark = usage.usage_mark(Entity::Class(solo)).unwrap();
    let constant_mark = usage.usage_mark(Entity::Constant(solo, program.this_class)).unwrap();
    assert!(Rc::ptr_eq(class_mark, constant_mark));
}

#[test]
fn test_conditional_roots_give_uncertain_marks() {
    let pool = app_pool();
    let dead = id(&pool, "app/Dead");

    let mut marker = ShortestClassUsageMarker::new(&pool);
    marker
        .mark_root(Reason::KeptConditionally("-keepclassmembers class app.Dead { run(); }".into()), |m| {
            m.visit_method(MemberId::new(dead, 0))
        })
        .unwrap();
    let run = Entity::Method(MemberId::new(dead, 0));
    assert!(marker.is_possibly_used(run));
    assert!(!marker.usage_marker().usage_mark(run).unwrap().is_certain());

    marker
        .mark_root(Reason::KeptByDirective("-keep class app.Dead".into()), |m| m.visit_class(dead))
        .unwrap();
    assert!(marker.is_used(run));
}

// ============================================================================
// Library classes and hierarchies
// ============================================================================

#[test]
fn test_library_classes_are_never_marked() {
    let pool = app_pool();
    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    keep_main(&mut marker, &pool);

    let object = Entity::Class(id(&pool, "java/lang/Object"));
    assert!(!marker.is_used(object));
    assert!(!marker.is_possibly_used(object));
    assert!(marker
        .usage_marker()
        .marked_entities()
        .iter()
        .all(|(entity, _)| pool.program_class(entity.class()).is_some()));
}

#[test]
fn test_library_method_override_is_kept() {
    let model = ProgramClassBuilder::new(access::PUBLIC, "h/Model", Some("java/lang/Object"))
        .method_with_code(access::PUBLIC, "toString", "()Ljava/lang/String;", |code| {
            code.ldc_string("model").areturn();
        })
        .method(access::PUBLIC, "hashCode", "()I")
        .method(access::PUBLIC, "describe", "()Ljava/lang/String;")
        .build();
    let pool = ClassPool::new(vec![object(), model]);
    let model = id(&pool, "h/Model");

    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    marker.visit_class(model).unwrap();

    assert!(marker.is_used(Entity::Method(MemberId::new(model, 0))));
    assert!(marker.is_used(Entity::Method(MemberId::new(model, 1))));
    assert!(!marker.is_used(Entity::Method(MemberId::new(model, 2))));
}

// ============================================================================
// Completion passes
// ============================================================================

#[test]
fn test_inner_class_rows_follow_used_inner_classes() {
    let outer = ProgramClassBuilder::new(access::PUBLIC, "n/Outer", None)
        .attribute(|pool| {
            let outer = pool.add_class("n/Outer");
            let rows = ["Kept", "Dropped"]
                .iter()
                .map(|simple| InnerClassesInfo {
                    inner_class_index: pool.add_class(&format!("n/Outer${}", simple)),
                    outer_class_index: outer,
                    inner_name_index: pool.add_utf8(simple),
                    inner_class_access_flags: access::PUBLIC | access::STATIC,
                })
                .collect();
            AttributeKind::InnerClasses(rows)
        })
        .build();
    let kept = ProgramClassBuilder::new(access::PUBLIC, "n/Outer$Kept", None).build();
    let dropped = ProgramClassBuilder::new(access::PUBLIC, "n/Outer$Dropped", None).build();
    let pool = ClassPool::new(vec![outer, kept, dropped]);
    let outer = id(&pool, "n/Outer");

    // The outer class is used before its inner class
    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    marker.visit_class(outer).unwrap();
    marker.visit_class(id(&pool, "n/Outer$Kept")).unwrap();
    marker.finish().unwrap();

    let attribute = AttributeId::new(outer, AttributeOwner::Class, 0);
    assert!(marker.is_used(Entity::Attribute(attribute)));
    assert!(marker.is_used(Entity::Entry(attribute, 0)));
    assert!(!marker.is_used(Entity::Entry(attribute, 1)));
    assert!(!marker.is_used(Entity::Class(id(&pool, "n/Outer$Dropped"))));
}

#[test]
fn test_class_table_rows_for_library_and_missing_classes_are_kept() {
    let entry = LibraryClass::new(access::PUBLIC | access::INTERFACE | access::ABSTRACT, "java/util/Map$Entry", None);
    let outer = ProgramClassBuilder::new(access::PUBLIC, "n/Outer", Some("java/lang/Object"))
        .method_with_code(access::PUBLIC, "run", "()V", |code| {
            code.aload_0()
                .checkcast("java/util/Map$Entry")
                .checkcast("n/Missing$Inner")
                .pop()
                .return_();
        })
        .attribute(|pool| {
            AttributeKind::InnerClasses(vec![
                InnerClassesInfo {
                    inner_class_index: pool.add_class("java/util/Map$Entry"),
                    outer_class_index: pool.add_class("java/util/Map"),
                    inner_name_index: pool.add_utf8("Entry"),
                    inner_class_access_flags: access::PUBLIC | access::STATIC | access::INTERFACE | access::ABSTRACT,
                },
                InnerClassesInfo {
                    inner_class_index: pool.add_class("n/Missing$Inner"),
                    outer_class_index: pool.add_class("n/Missing"),
                    inner_name_index: pool.add_utf8("Inner"),
                    inner_class_access_flags: access::PUBLIC | access::STATIC,
                },
            ])
        })
        .attribute(|pool| AttributeKind::NestMembers(vec![pool.add_class("n/Outer$Gone")]))
        .build();
    let pool = ClassPool::new(vec![object(), entry.into(), outer]);
    let outer = id(&pool, "n/Outer");

    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    marker.visit_class(outer).unwrap();
    marker.visit_method(MemberId::new(outer, 0)).unwrap();
    marker.finish().unwrap();

    let inner_classes = AttributeId::new(outer, AttributeOwner::Class, 0);
    assert!(marker.is_used(Entity::Attribute(inner_classes)));
    assert!(marker.is_used(Entity::Entry(inner_classes, 0)));
    assert!(marker.is_used(Entity::Entry(inner_classes, 1)));

    let nest_members = AttributeId::new(outer, AttributeOwner::Class, 1);
    assert!(marker.is_used(Entity::Attribute(nest_members)));
    assert!(marker.is_used(Entity::Entry(nest_members, 0)));
}

#[test]
fn test_super_class_fields_wait_for_a_reference() {
    let pool = app_pool();
    let a = id(&pool, "app/A");
    let b = Entity::Class(id(&pool, "app/B"));

    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    marker.visit_class(id(&pool, "app/Root")).unwrap();
    marker.finish().unwrap();

    assert!(marker.is_used(Entity::Class(a)));
    assert!(!marker.is_possibly_used(Entity::Field(MemberId::new(a, 0))));
    assert!(!marker.is_used(b));

    marker.visit_field(MemberId::new(a, 0)).unwrap();
    marker.finish().unwrap();

    assert!(marker.is_used(Entity::Field(MemberId::new(a, 0))));
    assert!(marker.is_used(b));
}

//! Kotlin metadata integration tests

use classmark::classfile::kotlin::{
    JvmSignature, KotlinContract, KotlinDeclarationContainer, KotlinEffect, KotlinEffectExpression,
    KotlinEffectType, KotlinFileFacadeMetadata, KotlinFunction, KotlinMetadata, KotlinMultiFileFacadeMetadata,
    KotlinMultiFilePartMetadata, KotlinProperty, KotlinType,
};
use classmark::classfile::{access, ClassId, ClassPool, Clazz, Entity, MemberId, ProgramClassBuilder};
use classmark::mark::{ClassUsageMarker, Reason, ShortestClassUsageMarker, SimpleUsageMarker};

fn id(pool: &ClassPool, name: &str) -> ClassId {
    pool.find(name).unwrap()
}

fn plain(name: &str) -> Clazz {
    ProgramClassBuilder::new(access::PUBLIC, name, None).build()
}

fn facade(metadata: KotlinMetadata) -> Clazz {
    ProgramClassBuilder::new(access::PUBLIC | access::FINAL, "k/ChecksKt", None)
        .method(access::PUBLIC | access::STATIC, "requireReady", "(Ljava/lang/Object;)V")
        .method(access::PUBLIC | access::STATIC, "getLabel", "()Ljava/lang/String;")
        .kotlin_metadata(metadata)
        .build()
}

fn declarations(metadata: &KotlinMetadata) -> &KotlinDeclarationContainer {
    metadata.declarations().unwrap()
}

/// `fun requireReady(value: Any) { contract { returns() implies (value is Ready) } }`
fn require_ready() -> KotlinFunction {
    KotlinFunction {
        name: "requireReady".to_string(),
        jvm_signature: Some(JvmSignature::new("requireReady", "(Ljava/lang/Object;)V")),
        contracts: vec![KotlinContract {
            effects: vec![KotlinEffect {
                effect_type: KotlinEffectType::ReturnsConstant,
                conclusion: Some(KotlinEffectExpression {
                    parameter_index: Some(0),
                    is_instance_type: Some(KotlinType::class("k/Ready")),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[test]
fn test_class_in_contract_effect_expression_is_used() {
    let metadata = KotlinMetadata::FileFacade(KotlinFileFacadeMetadata {
        declarations: KotlinDeclarationContainer {
            functions: vec![require_ready()],
            ..Default::default()
        },
        ..Default::default()
    });
    let pool = ClassPool::new(vec![facade(metadata), plain("k/Ready")]);
    let checks = id(&pool, "k/ChecksKt");

    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    marker.visit_class(checks).unwrap();
    marker.visit_method(MemberId::new(checks, 0)).unwrap();
    marker.finish().unwrap();

    assert!(marker.is_used(Entity::Class(id(&pool, "k/Ready"))));

    let metadata = pool.program_class(checks).unwrap().kotlin_metadata.as_ref().unwrap();
    let function = &declarations(metadata).functions[0];
    let expression = function.contracts[0].effects[0].conclusion.as_ref().unwrap();
    assert!(marker.is_used(Entity::Kotlin(checks, function.contracts[0].id)));
    assert!(marker.is_used(Entity::Kotlin(checks, expression.id)));
}

#[test]
fn test_contract_class_stays_unused_when_function_is_unused() {
    let metadata = KotlinMetadata::FileFacade(KotlinFileFacadeMetadata {
        declarations: KotlinDeclarationContainer {
            functions: vec![require_ready()],
            ..Default::default()
        },
        ..Default::default()
    });
    let pool = ClassPool::new(vec![facade(metadata), plain("k/Ready")]);

    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    marker.visit_class(id(&pool, "k/ChecksKt")).unwrap();
    marker.finish().unwrap();

    assert!(!marker.is_used(Entity::Class(id(&pool, "k/Ready"))));
}

#[test]
fn test_property_follows_its_getter() {
    let property = KotlinProperty {
        name: "label".to_string(),
        getter_signature: Some(JvmSignature::new("getLabel", "()Ljava/lang/String;")),
        property_type: Some(KotlinType::class("k/Label")),
        ..Default::default()
    };
    let metadata = KotlinMetadata::FileFacade(KotlinFileFacadeMetadata {
        declarations: KotlinDeclarationContainer {
            properties: vec![property],
            ..Default::default()
        },
        ..Default::default()
    });
    let pool = ClassPool::new(vec![facade(metadata), plain("k/Label")]);
    let checks = id(&pool, "k/ChecksKt");
    let label = Entity::Class(id(&pool, "k/Label"));

    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    marker.visit_class(checks).unwrap();
    marker.finish().unwrap();
    assert!(!marker.is_used(label));

    marker.visit_method(MemberId::new(checks, 1)).unwrap();
    marker.finish().unwrap();
    assert!(marker.is_used(label));
}

#[test]
fn test_multi_file_part_keeps_its_facade() {
    let facade = ProgramClassBuilder::new(access::PUBLIC | access::FINAL, "k/UtilsKt", None)
        .kotlin_metadata(KotlinMetadata::MultiFileFacade(KotlinMultiFileFacadeMetadata {
            part_class_names: vec!["k/UtilsKt__StringsKt".to_string(), "k/UtilsKt__ListsKt".to_string()],
            ..Default::default()
        }))
        .build();
    let part = |name: &str| {
        ProgramClassBuilder::new(access::FINAL | access::SYNTHETIC, name, None)
            .kotlin_metadata(KotlinMetadata::MultiFilePart(KotlinMultiFilePartMetadata {
                facade_name: "k/UtilsKt".to_string(),
                ..Default::default()
            }))
            .build()
    };
    let pool = ClassPool::new(vec![facade, part("k/UtilsKt__StringsKt"), part("k/UtilsKt__ListsKt")]);
    let strings = id(&pool, "k/UtilsKt__StringsKt");
    let lists = id(&pool, "k/UtilsKt__ListsKt");

    let mut marker = ClassUsageMarker::new(&pool, SimpleUsageMarker::new());
    marker.visit_class(strings).unwrap();
    marker.finish().unwrap();

    assert!(marker.is_used(Entity::Class(id(&pool, "k/UtilsKt"))));
    assert!(!marker.is_used(Entity::Class(lists)));

    let part_metadata = pool.program_class(strings).unwrap().kotlin_metadata.as_ref().unwrap();
    assert!(marker.is_used(Entity::Kotlin(strings, part_metadata.id())));
}

#[test]
fn test_kotlin_metadata_reason_is_recorded() {
    let metadata = KotlinMetadata::FileFacade(KotlinFileFacadeMetadata {
        declarations: KotlinDeclarationContainer {
            functions: vec![require_ready()],
            ..Default::default()
        },
        ..Default::default()
    });
    let pool = ClassPool::new(vec![facade(metadata), plain("k/Ready")]);
    let checks = id(&pool, "k/ChecksKt");

    let mut marker = ShortestClassUsageMarker::new(&pool);
    marker
        .mark_root(Reason::KeptByDirective("-keep class k.ChecksKt { requireReady(...); }".into()), |m| {
            m.visit_class(checks)?;
            m.visit_method(MemberId::new(checks, 0))
        })
        .unwrap();
    marker.finish().unwrap();

    let chain = marker.explain(Entity::Class(id(&pool, "k/Ready")));
    assert_eq!(chain[0].0, Reason::KotlinMetadata);
    assert!(matches!(chain[0].1, Some(Entity::Kotlin(class, _)) if class == checks));
    assert!(matches!(chain.last(), Some((Reason::KeptByDirective(_), None))));
}

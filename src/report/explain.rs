// "Why are you keeping" explanations
//
// A target is an external class name (`com.example.Foo`) or a member of one
// (`com.example.Foo#bar`); a member target explains every field and method
// with that name.

use crate::classfile::descriptor::internal_class_name;
use crate::classfile::{ClassPool, Entity, MemberId};
use crate::mark::{ShortestUsageMarker, UsageState};
use miette::{miette, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    /// Description of the explained entity
    pub entity: String,
    /// None when the entity is not marked at all
    pub state: Option<&'static str>,
    /// From the entity back to its root
    pub steps: Vec<ExplanationStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplanationStep {
    pub reason: String,
    pub producer: Option<String>,
}

impl Explanation {
    pub fn new(pool: &ClassPool, marker: &ShortestUsageMarker, entity: Entity) -> Self {
        let steps = marker
            .explain(entity)
            .into_iter()
            .map(|(reason, producer)| ExplanationStep {
                reason: reason.description(),
                producer: producer.map(|p| pool.describe(p)),
            })
            .collect();

        Self {
            entity: pool.describe(entity),
            state: marker.state(entity).map(|state| state.as_str()),
            steps,
        }
    }

    pub fn is_kept(&self) -> bool {
        self.state == Some(UsageState::Used.as_str())
    }

    /// Indented text in the shape ProGuard prints for `-whyareyoukeeping`
    pub fn render(&self) -> String {
        let mut output = format!("{}\n", self.entity);
        match self.state {
            None => output.push_str("  is not being kept.\n"),
            Some(state) if !self.is_kept() => {
                output.push_str(&format!("  is {} only:\n", state));
                self.render_steps(&mut output);
            }
            Some(_) => self.render_steps(&mut output),
        }
        output
    }

    fn render_steps(&self, output: &mut String) {
        for step in &self.steps {
            match &step.producer {
                Some(producer) => output.push_str(&format!("  {} {}\n", step.reason, producer)),
                None => output.push_str(&format!("  {}\n", step.reason)),
            }
        }
    }
}

/// Resolve a target to the entities it names
pub fn resolve_target(pool: &ClassPool, target: &str) -> Result<Vec<Entity>> {
    let (class_name, member_name) = match target.split_once('#') {
        Some((class, member)) => (class, Some(member)),
        None => (target, None),
    };

    let id = pool
        .find(&internal_class_name(class_name))
        .ok_or_else(|| miette!("Unknown class in why-are-you-keeping target: {}", class_name))?;

    let Some(member_name) = member_name else {
        return Ok(vec![Entity::Class(id)]);
    };

    let class = pool
        .class(id)
        .ok_or_else(|| miette!("Unknown class in why-are-you-keeping target: {}", class_name))?;
    let fields = (0..class.field_count() as u16)
        .filter(|&index| class.field_signature(index).is_some_and(|(name, _, _)| name == member_name))
        .map(|index| Entity::Field(MemberId::new(id, index)));
    let methods = (0..class.method_count() as u16)
        .filter(|&index| class.method_signature(index).is_some_and(|(name, _, _)| name == member_name))
        .map(|index| Entity::Method(MemberId::new(id, index)));
    let entities: Vec<Entity> = fields.chain(methods).collect();

    if entities.is_empty() {
        return Err(miette!("No member named {} in {}", member_name, class_name));
    }
    Ok(entities)
}

/// Explanations for every entity a target names
pub fn explain_target(pool: &ClassPool, marker: &ShortestUsageMarker, target: &str) -> Result<Vec<Explanation>> {
    Ok(resolve_target(pool, target)?
        .into_iter()
        .map(|entity| Explanation::new(pool, marker, entity))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{access, ProgramClassBuilder};
    use crate::mark::{Reason, ShortestClassUsageMarker};

    fn pool() -> ClassPool {
        let main = ProgramClassBuilder::new(access::PUBLIC, "app/Main", None)
            .method_with_code(access::PUBLIC | access::STATIC, "main", "([Ljava/lang/String;)V", |code| {
                code.invokestatic("app/Helper", "help", "()V").return_();
            })
            .build();
        let helper = ProgramClassBuilder::new(access::PUBLIC, "app/Helper", None)
            .method(access::PUBLIC | access::STATIC, "help", "()V")
            .field(access::PRIVATE, "help", "I")
            .build();
        let dead = ProgramClassBuilder::new(access::PUBLIC, "app/Dead", None).build();
        ClassPool::new(vec![main, helper, dead])
    }

    fn mark(pool: &ClassPool) -> ShortestUsageMarker {
        let main = pool.find("app/Main").unwrap();
        let mut marker = ShortestClassUsageMarker::new(pool);
        marker
            .mark_root(Reason::KeptByDirective("-keep class app.Main".into()), |m| {
                m.visit_class(main)?;
                m.visit_method(MemberId::new(main, 0))
            })
            .unwrap();
        marker.into_inner().into_usage_marker()
    }

    #[test]
    fn test_resolve_class_and_member_targets() {
        let pool = pool();
        let helper = pool.find("app/Helper").unwrap();

        assert_eq!(resolve_target(&pool, "app.Helper").unwrap(), vec![Entity::Class(helper)]);
        assert_eq!(
            resolve_target(&pool, "app.Helper#help").unwrap(),
            vec![Entity::Field(MemberId::new(helper, 0)), Entity::Method(MemberId::new(helper, 0))]
        );
        assert!(resolve_target(&pool, "app.Missing").is_err());
        assert!(resolve_target(&pool, "app.Helper#nothing").is_err());
    }

    #[test]
    fn test_explanation_leads_to_the_keep_rule() {
        let pool = pool();
        let marker = mark(&pool);
        let explanations = explain_target(&pool, &marker, "app.Helper").unwrap();

        assert_eq!(explanations.len(), 1);
        let explanation = &explanations[0];
        assert!(explanation.is_kept());
        assert_eq!(explanation.entity, "app.Helper");

        let last = explanation.steps.last().unwrap();
        assert_eq!(last.reason, "is kept by a directive in the configuration (-keep class app.Main)");
        assert!(last.producer.is_none());
        assert!(explanation
            .steps
            .iter()
            .any(|step| step.producer.as_deref() == Some("app.Main: void main(java.lang.String[])")));
    }

    #[test]
    fn test_unmarked_entity_is_not_kept() {
        let pool = pool();
        let marker = mark(&pool);
        let explanations = explain_target(&pool, &marker, "app.Dead").unwrap();

        assert!(!explanations[0].is_kept());
        assert_eq!(explanations[0].render(), "app.Dead\n  is not being kept.\n");
    }

    #[test]
    fn test_render_lists_each_step() {
        let pool = pool();
        let marker = mark(&pool);
        let explanation = &explain_target(&pool, &marker, "app.Helper").unwrap()[0];
        let rendered = explanation.render();

        assert!(rendered.starts_with("app.Helper\n"));
        assert_eq!(rendered.lines().count(), explanation.steps.len() + 1);
    }
}

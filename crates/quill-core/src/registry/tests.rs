use super::*;
use crate::{
    compiler::CompileError,
    expr::{Queryable, Setters, lambda, param},
    model::{AssignedValue, Clause, OrderDirection, QueryModel, QuerySource, ResultOp},
};

fn call_of(expr: &Expr) -> &Call {
    expr.as_call().expect("call node")
}

fn no_subquery(_: &Expr) -> Result<QueryModel, CompileError> {
    panic!("no sub-query expected")
}

fn pred() -> Expr {
    lambda(&["x"], param("x").member("active"))
}

#[test]
fn shape_treats_quoted_lambdas_as_lambdas() {
    let expr = Queryable::source("person").filter(pred()).into_expr();

    assert_eq!(
        CallShape::of(call_of(&expr)),
        CallShape::queryable("filter", &[ArgKind::Lambda(1)])
    );
    assert_eq!(
        CallShape::of(call_of(&expr)).to_string(),
        "queryable::filter(lambda/1)"
    );
}

#[test]
fn standard_registry_covers_builder_operations() {
    let registry = Registry::standard().unwrap();
    let people = || Queryable::source("person");

    let chains = [
        people().filter(pred()).into_expr(),
        people().take(10).into_expr(),
        people().distinct().into_expr(),
        people().union(people()).into_expr(),
        people().all(pred()),
        people().sum(lambda(&["x"], param("x").member("age"))),
        people().first(),
        people().delete_all(),
        people().delete_where(pred()),
    ];

    for chain in &chains {
        assert!(
            registry.lookup(call_of(chain)).is_some(),
            "unrecognized: {}",
            CallShape::of(call_of(chain))
        );
    }
}

#[test]
fn exact_shape_wins_over_name_fallback() {
    let registry = {
        let mut builder = Registry::builder();
        builder
            .register_name(CallOwner::Queryable, "top", NodeType::Distinct)
            .unwrap()
            .replace(CallShape::queryable("top", &[ArgKind::Operand]), NodeType::Take);
        builder.build()
    };

    let exact = Queryable::source("person").call("top", vec![Expr::from(3)]).into_expr();
    let other = Queryable::source("person").call("top", vec![]).into_expr();

    assert_eq!(registry.lookup(call_of(&exact)), Some(NodeType::Take));
    assert_eq!(registry.lookup(call_of(&other)), Some(NodeType::Distinct));
    assert_eq!(registry.len(), 2);
}

#[test]
fn colliding_sets_fail_at_build_time() {
    let mine = RegistrySet::new("mine").shape(CallShape::dml("delete_all", &[]), NodeType::Take);

    let mut builder = Registry::builder();
    builder.merge(&RegistrySet::dml()).unwrap();
    let err = builder.merge(&mine).unwrap_err();

    assert_eq!(
        err,
        RegistryError::AmbiguousShape {
            shape: CallShape::dml("delete_all", &[]),
            existing: NodeType::Delete,
            incoming: NodeType::Take,
        }
    );
    assert!(err.to_string().contains("dml::delete_all()"));
}

#[test]
fn name_collisions_are_detected_separately() {
    let twice = RegistrySet::new("twice")
        .by_name(CallOwner::Queryable, "distinct", NodeType::Distinct)
        .by_name(CallOwner::Queryable, "distinct", NodeType::Distinct);

    let err = Registry::builder().merge(&twice).map(|_| ()).unwrap_err();

    assert!(matches!(err, RegistryError::AmbiguousName { ref name, .. } if name == "distinct"));
}

#[test]
fn shape_cannot_shadow_a_name_entry() {
    let mut builder = Registry::builder();
    builder.merge(&RegistrySet::standard()).unwrap();

    let union = RegistrySet::new("ext").shape(
        CallShape::queryable("union", &[ArgKind::Operand]),
        NodeType::Take,
    );
    let err = builder.merge(&union).map(|_| ()).unwrap_err();

    assert_eq!(
        err,
        RegistryError::AmbiguousName {
            owner: CallOwner::Queryable,
            name: "union".to_string(),
            existing: NodeType::SetOp(crate::model::SetOpKind::Union),
            incoming: NodeType::Take,
        }
    );
}

#[test]
fn name_entry_cannot_shadow_a_shape() {
    let mut builder = Registry::builder();
    builder.merge(&RegistrySet::standard()).unwrap();

    let err = builder
        .register_name(CallOwner::Queryable, "take", NodeType::Distinct)
        .map(|_| ())
        .unwrap_err();

    assert!(matches!(
        err,
        RegistryError::AmbiguousName {
            ref name,
            existing: NodeType::Take,
            incoming: NodeType::Distinct,
            ..
        } if name == "take"
    ));
}

#[test]
fn replace_is_the_explicit_override() {
    let mut builder = Registry::builder();
    builder.merge(&RegistrySet::standard()).unwrap();
    builder.replace(CallShape::queryable("take", &[ArgKind::Operand]), NodeType::Skip);
    let registry = builder.build();

    let expr = Queryable::source("person").take(1).into_expr();
    assert_eq!(registry.lookup(call_of(&expr)), Some(NodeType::Skip));
}

#[test]
fn registry_is_shareable_across_workers() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Registry>();
}

#[test]
fn order_nodes_build_primary_and_refining_clauses() {
    let expr = Queryable::source("person")
        .then_by_desc(lambda(&["x"], param("x").member("name")))
        .into_expr();

    let clause = NodeType::ThenBy(OrderDirection::Desc)
        .clause(call_of(&expr), &no_subquery)
        .unwrap();

    assert!(matches!(
        clause,
        Clause::OrderBy {
            direction: OrderDirection::Desc,
            primary: false,
            ..
        }
    ));
}

#[test]
fn take_rejects_negative_constant_counts() {
    let expr = Queryable::source("person").take(-1).into_expr();

    let err = NodeType::Take.clause(call_of(&expr), &no_subquery).unwrap_err();

    assert!(matches!(err, CompileError::InvalidArguments { ref operation, .. } if operation == "take"));
}

#[test]
fn update_decomposes_setter_chain_in_call_order() {
    let setters = Setters::new()
        .set(lambda(&["p"], param("p").member("address").member("city")), "Oslo")
        .set(
            lambda(&["p"], param("p").member("visits")),
            lambda(&["p"], param("p").member("visits").add(1)),
        );
    let expr = Queryable::source("person").update_all(setters);

    let Clause::Update { assignments } = NodeType::Update
        .clause(call_of(&expr), &no_subquery)
        .unwrap()
    else {
        panic!("expected update clause");
    };

    assert_eq!(assignments.len(), 2);
    assert_eq!(assignments[0].member, vec!["address", "city"]);
    assert!(matches!(assignments[0].value, AssignedValue::Operand(_)));
    assert_eq!(assignments[1].member, vec!["visits"]);
    assert!(matches!(assignments[1].value, AssignedValue::Row(_)));
}

#[test]
fn update_without_assignments_is_invalid() {
    let expr = Queryable::source("person").update_all(Setters::new());

    let err = NodeType::Update.clause(call_of(&expr), &no_subquery).unwrap_err();

    assert!(matches!(err, CompileError::InvalidArguments { .. }));
}

#[test]
fn set_operand_must_be_a_row_sequence() {
    let expr = Queryable::source("person")
        .union(Queryable::source("pet"))
        .into_expr();
    let scalar = |_: &Expr| {
        QueryModel::new(
            QuerySource::Named("pet".to_string()),
            vec![Clause::Result(ResultOp::Count)],
        )
    };

    let err = NodeType::SetOp(crate::model::SetOpKind::Union)
        .clause(call_of(&expr), &scalar)
        .unwrap_err();

    assert!(matches!(err, CompileError::InvalidArguments { ref operation, .. } if operation == "union"));
}

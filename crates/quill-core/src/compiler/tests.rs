use super::*;
use crate::{
    compiler::cache::{self, builds_on_current_worker, instance_for_current_worker},
    eval::EvalError,
    expr::{Queryable, Setters, lambda, lit, param},
    model::{AssignedValue, OrderDirection, QueryKind, ResultOp, SetOpKind},
    obs::{metrics_report, metrics_reset_all},
    registry::{ArgKind, NodeType, RegistryError},
    value::Value,
};
use std::{
    cell::OnceCell,
    rc::Rc,
    sync::{Arc, Barrier},
    thread,
};

fn compiler() -> QueryCompiler {
    QueryCompiler::standard().unwrap()
}

fn people() -> Queryable {
    Queryable::source("person")
}

fn x(member: &str) -> Expr {
    param("x").member(member)
}

fn names(model: &QueryModel) -> Vec<&'static str> {
    model.clauses().iter().map(Clause::name).collect()
}

#[test]
fn clauses_follow_call_order() {
    let expr = people()
        .filter(lambda(&["x"], x("age").gt(30)))
        .order_by(lambda(&["x"], x("name")))
        .skip(5)
        .take(10)
        .into_expr();

    let model = compiler().compile(&expr).unwrap();

    assert_eq!(names(&model), vec!["filter", "order_by", "skip", "take"]);
    assert_eq!(model.source(), &QuerySource::Named("person".to_string()));
    assert_eq!(model.kind(), QueryKind::Select);
}

#[test]
fn closed_operand_is_folded_before_recognition() {
    let expr = people()
        .filter(lambda(&["x"], x("field").eq(lit(2).add(3))))
        .into_expr();

    let model = compiler().compile(&expr).unwrap();

    let Clause::Filter { predicate } = &model.clauses()[0] else {
        panic!("expected filter clause");
    };
    assert_eq!(*predicate.body, x("field").eq(5));
}

#[test]
fn failing_fold_is_a_fault_carrying_the_cause() {
    let expr = people()
        .filter(lambda(&["x"], x("age").gt(lit(i64::MAX).add(1))))
        .into_expr();

    let err = compiler().compile(&expr).unwrap_err();

    assert!(matches!(
        err,
        CompileError::Evaluation {
            source: EvalError::Overflow { .. },
            ..
        }
    ));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn unknown_operation_names_its_shape() {
    let expr = people()
        .call("shuffle", vec![lit(42)])
        .take(3)
        .into_expr();

    let err = compiler().compile(&expr).unwrap_err();

    let CompileError::UnsupportedOperation { shape } = &err else {
        panic!("expected unsupported operation");
    };
    assert_eq!(shape.to_string(), "queryable::shuffle(operand)");
    assert_eq!(err.class(), crate::error::ErrorClass::Unsupported);
}

#[test]
fn terminal_operators_set_the_query_kind() {
    let count = compiler().compile(&people().count()).unwrap();
    assert_eq!(count.kind(), QueryKind::Scalar);
    assert_eq!(count.terminal(), Some(&Clause::Result(ResultOp::Count)));

    let delete = compiler()
        .compile(&people().delete_where(lambda(&["x"], x("banned"))))
        .unwrap();
    assert_eq!(delete.kind(), QueryKind::Delete);
    assert!(matches!(
        delete.terminal(),
        Some(Clause::Delete { filter: Some(_) })
    ));
}

#[test]
fn predicate_overload_compiles_as_filter_then_terminal() {
    let expr = people().first_where(lambda(&["x"], x("admin")));

    let model = compiler().compile(&expr).unwrap();

    assert_eq!(names(&model), vec!["filter", "first"]);
}

#[test]
fn operation_after_terminal_is_rejected() {
    let expr = Queryable::over(people().first()).take(1).into_expr();

    let err = compiler().compile(&expr).unwrap_err();

    assert!(matches!(
        err,
        CompileError::MisplacedTerminal {
            terminal: "first",
            next: "take"
        }
    ));
}

#[test]
fn then_by_without_ordering_is_rejected() {
    let expr = people().then_by(lambda(&["x"], x("name"))).into_expr();

    assert!(matches!(
        compiler().compile(&expr),
        Err(CompileError::UnorderedThenBy)
    ));
}

#[test]
fn join_compiles_the_inner_sequence() {
    let pets = Queryable::source("pet").filter(lambda(&["p"], param("p").member("alive")));
    let expr = people()
        .join(
            pets,
            lambda(&["x"], x("id")),
            lambda(&["p"], param("p").member("owner_id")),
            lambda(
                &["x", "p"],
                Expr::record([("owner", x("name")), ("pet", param("p").member("name"))]),
            ),
        )
        .into_expr();

    let model = compiler().compile(&expr).unwrap();

    let Clause::Join { inner, result, .. } = &model.clauses()[0] else {
        panic!("expected join clause");
    };
    assert_eq!(inner.source(), &QuerySource::Named("pet".to_string()));
    assert_eq!(names(inner), vec!["filter"]);
    assert_eq!(result.arity(), 2);
}

#[test]
fn set_operations_nest_the_other_sequence() {
    let expr = people()
        .except(people().filter(lambda(&["x"], x("banned"))))
        .distinct()
        .into_expr();

    let model = compiler().compile(&expr).unwrap();

    assert!(matches!(
        &model.clauses()[0],
        Clause::SetOp {
            op: SetOpKind::Except,
            ..
        }
    ));
    assert_eq!(model.clauses()[1], Clause::Distinct);
}

#[test]
fn update_folds_assigned_operands() {
    let setters = Setters::new()
        .set(lambda(&["p"], param("p").member("score")), lit(10).mul(10))
        .set(
            lambda(&["p"], param("p").member("visits")),
            lambda(&["p"], param("p").member("visits").add(1)),
        );
    let expr = people()
        .filter(lambda(&["x"], x("active")))
        .update_all(setters);

    let model = compiler().compile(&expr).unwrap();

    assert_eq!(model.kind(), QueryKind::Update);
    let Some(Clause::Update { assignments }) = model.terminal() else {
        panic!("expected update clause");
    };
    assert_eq!(
        assignments[0].value,
        AssignedValue::Operand(lit(Value::Int(100)))
    );
    assert!(matches!(assignments[1].value, AssignedValue::Row(_)));
}

#[test]
fn inline_sequence_becomes_the_source() {
    let expr = Queryable::over(Expr::list(vec![lit(1), lit(2).add(1)]))
        .order_by_desc(lambda(&["n"], param("n")))
        .into_expr();

    let model = compiler().compile(&expr).unwrap();

    assert_eq!(
        model.source(),
        &QuerySource::Inline(lit(Value::from(vec![1, 3])))
    );
    assert!(matches!(
        model.clauses()[0],
        Clause::OrderBy {
            direction: OrderDirection::Desc,
            primary: true,
            ..
        }
    ));
}

#[test]
fn caller_tree_is_left_untouched() {
    let expr = people()
        .filter(lambda(&["x"], lit(1).lt(x("age"))))
        .into_expr();
    let before = expr.clone();

    compiler().compile(&expr).unwrap();

    assert_eq!(expr, before);
}

#[test]
fn extension_sets_add_operations() {
    let top = RegistrySet::new("top").shape(
        CallShape::queryable("top", &[ArgKind::Operand]),
        NodeType::Take,
    );
    let compiler = QueryCompiler::builder().with_extension(top).build().unwrap();

    let model = compiler
        .compile(&people().call("top", vec![lit(5)]).into_expr())
        .unwrap();

    assert_eq!(names(&model), vec!["take"]);
}

#[test]
fn colliding_extension_fails_before_any_compile() {
    let clash = RegistrySet::new("clash").shape(
        CallShape::queryable("take", &[ArgKind::Operand]),
        NodeType::Skip,
    );

    let err = QueryCompiler::builder()
        .with_extension(clash)
        .build()
        .map(|_| ())
        .unwrap_err();

    assert!(matches!(err, CompileError::Registry(_)));
}

#[test]
fn extension_cannot_take_over_a_name_registered_operation() {
    let union = RegistrySet::new("ext").shape(
        CallShape::queryable("union", &[ArgKind::Operand]),
        NodeType::Take,
    );

    let err = QueryCompiler::builder()
        .with_extension(union)
        .build()
        .map(|_| ())
        .unwrap_err();

    assert!(matches!(
        err,
        CompileError::Registry(RegistryError::AmbiguousName { ref name, .. }) if name == "union"
    ));

    // the standard compiler still recognizes union as a set operation
    let model = compiler().compile(&people().union(people()).into_expr()).unwrap();
    assert_eq!(names(&model), vec!["union"]);
}

#[test]
fn closed_projection_keeps_field_order() {
    let expr = people()
        .select(lambda(
            &["x"],
            Expr::record([("b", lit(1)), ("a", lit(1).add(1))]),
        ))
        .into_expr();

    let model = compiler().compile(&expr).unwrap();

    let Clause::Select { selector } = &model.clauses()[0] else {
        panic!("expected select clause");
    };
    assert_eq!(
        *selector.body,
        lit(Value::record([("b", Value::Int(1)), ("a", Value::Int(2))]))
    );
}

#[test]
fn closed_projection_with_repeated_member_is_a_fault() {
    let expr = people()
        .select(lambda(&["x"], Expr::record([("a", lit(1)), ("a", lit(2))])))
        .into_expr();

    let err = compiler().compile(&expr).unwrap_err();

    assert!(matches!(
        err,
        CompileError::Evaluation {
            source: EvalError::DuplicateMember { .. },
            ..
        }
    ));
}

#[test]
fn compile_records_metrics() {
    metrics_reset_all();
    let compiler = compiler();

    compiler.compile(&people().take(1).into_expr()).unwrap();
    compiler
        .compile(&people().call("shuffle", vec![]).into_expr())
        .unwrap_err();

    let report = metrics_report();
    assert_eq!(report.compilers_built, 1);
    assert_eq!(report.compiles_started, 2);
    assert_eq!(report.compiles_finished, 1);
    assert_eq!(report.compiles_failed, 1);
    assert_eq!(report.clauses_emitted, 1);
    assert_eq!(report.rewrite_runs, 2);
}

#[test]
fn same_worker_reuses_one_instance() {
    let first = instance_for_current_worker().unwrap();
    let second = instance_for_current_worker().unwrap();

    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(builds_on_current_worker(), 1);
}

#[test]
fn concurrent_workers_build_their_own_instance() {
    const WORKERS: usize = 4;
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles = (0..WORKERS)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let compiler = instance_for_current_worker().unwrap();
                let again = instance_for_current_worker().unwrap();
                let address = Rc::as_ptr(&compiler) as usize;
                let same = Rc::ptr_eq(&compiler, &again);

                // keep every instance alive until all workers have one
                barrier.wait();
                (address, same, builds_on_current_worker())
            })
        })
        .collect::<Vec<_>>();

    let results = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();

    let mut addresses = results.iter().map(|(a, _, _)| *a).collect::<Vec<_>>();
    addresses.sort_unstable();
    addresses.dedup();

    assert_eq!(addresses.len(), WORKERS);
    assert!(results.iter().all(|(_, same, builds)| *same && *builds == 1));
    assert!(cache::total_builds() >= WORKERS as u64);
}

#[test]
fn failed_build_is_not_cached() {
    let slot: OnceCell<Rc<u32>> = OnceCell::new();

    let err = cache::get_or_try_build(&slot, || Err(CompileError::RegistryClosed));
    assert!(err.is_err());
    assert!(slot.get().is_none());

    let built = cache::get_or_try_build(&slot, || Ok(7)).unwrap();
    let cached = cache::get_or_try_build(&slot, || Ok(8)).unwrap();

    assert_eq!((*built, *cached), (7, 7));
    assert!(Rc::ptr_eq(&built, &cached));
}


use super::*;
use crate::{
    eval::{EvalError, evaluate},
    expr::{Queryable, lambda, lit, param},
    value::{Value, ValueKind},
};

fn pipeline() -> RewritePipeline {
    RewritePipeline::standard()
}

fn rewrite(expr: &Expr) -> Expr {
    pipeline().apply(expr).unwrap().into_owned()
}

fn normalize(expr: &Expr) -> Expr {
    Normalization::standard().apply(expr).unwrap().into_owned()
}

#[test]
fn closed_sub_tree_inside_lambda_is_folded() {
    let expr = lambda(&["x"], param("x").member("age").eq(lit(2).add(3)));

    assert_eq!(rewrite(&expr).to_string(), "x => (x.age == 5)");
}

#[test]
fn captured_record_member_is_folded() {
    let captured = lit(Value::record([("min", Value::Int(18))])).member("min");
    let expr = lambda(&["x"], param("x").member("age").gte(captured));

    assert_eq!(rewrite(&expr).to_string(), "x => (x.age >= 18)");
}

#[test]
fn failing_closed_sub_tree_is_a_fault_with_cause() {
    let expr = lambda(&["x"], param("x").member("age").gt(lit(1).div(0)));

    let err = pipeline().apply(&expr).unwrap_err();

    let CompileError::Evaluation { expr, source } = err else {
        panic!("expected evaluation fault");
    };
    assert_eq!(expr, "(1 / 0)");
    assert_eq!(source, EvalError::DivisionByZero);
}

#[test]
fn opaque_calls_are_left_for_the_translator() {
    let expr = lambda(
        &["x"],
        lit("a").host("geo", "distance", vec![param("x").member("pos")]),
    );

    assert!(matches!(
        PartialEvaluation::default().apply(&expr),
        Ok(Cow::Borrowed(_))
    ));
}

#[test]
fn normal_tree_is_shared_not_copied() {
    let expr = Queryable::source("person")
        .take(10)
        .into_expr();

    assert!(matches!(pipeline().apply(&expr), Ok(Cow::Borrowed(_))));
}

#[test]
fn predicate_overload_is_lowered_to_filter() {
    let expr = Queryable::source("person").count_where(lambda(&["x"], param("x").member("active")));

    assert_eq!(
        normalize(&expr).to_string(),
        "source(person).filter(x => x.active).count()"
    );
}

#[test]
fn aliases_become_canonical_names() {
    let expr = Queryable::source("person")
        .call("where", vec![lambda(&["x"], param("x").member("active"))])
        .call("limit", vec![lit(3)])
        .into_expr();

    assert_eq!(
        normalize(&expr).to_string(),
        "source(person).filter(x => x.active).take(3)"
    );
}

#[test]
fn constant_moves_to_the_right_of_comparisons() {
    let expr = lit(5).lt(param("x").member("age"));

    assert_eq!(normalize(&expr).to_string(), "(x.age > 5)");

    // non-comparisons keep their operand order
    let sum = lit(5).sub(param("x"));
    assert_eq!(normalize(&sum), sum);
}

#[test]
fn negation_folds_into_equality_only() {
    let eq = param("x").member("a").eq(1).not();
    let lt = param("x").member("a").lt(1).not();
    let double = param("x").member("a").lt(1).not().not();

    assert_eq!(normalize(&eq).to_string(), "(x.a != 1)");
    assert_eq!(normalize(&lt), lt);
    assert_eq!(normalize(&double).to_string(), "(x.a < 1)");
}

#[test]
fn double_negation_of_untyped_operand_is_kept() {
    // `x.name` may be text; `!!x.name` must still fail where `x.name` would not
    let member = param("x").member("name").not().not();
    let closed = lit("text").not().not();

    assert_eq!(normalize(&member), member);
    assert_eq!(normalize(&closed), closed);
    assert!(evaluate(&normalize(&closed)).is_err());
}

#[test]
fn conversions_collapse() {
    let any = param("x").convert(ValueKind::Any);
    let nested = param("x").convert(ValueKind::Int).convert(ValueKind::Int);
    let widening = param("x").convert(ValueKind::Int).convert(ValueKind::Float);

    assert_eq!(normalize(&any), param("x"));
    assert_eq!(normalize(&nested), param("x").convert(ValueKind::Int));
    assert_eq!(normalize(&widening), widening);
}

#[test]
fn invocation_is_inlined_then_folded() {
    let double = lambda(&["y"], param("y").mul(2));
    let expr = double.invoke(vec![lit(21)]);

    assert_eq!(rewrite(&expr), lit(42));
}

#[test]
fn inlining_refuses_to_capture() {
    // (y => x => x + y)(x): inlining would bind the outer x
    let curried = lambda(&["y"], lambda(&["x"], param("x").add(param("y"))));
    let expr = curried.invoke(vec![param("x")]);

    assert_eq!(normalize(&expr), expr);
}

#[test]
fn pipeline_reports_passes_in_order() {
    assert_eq!(
        pipeline().pass_names(),
        vec!["partial_evaluation", "normalization"]
    );
}

#[test]
fn non_terminating_pass_is_reported() {
    struct Flip;

    impl TreePass for Flip {
        fn name(&self) -> &'static str {
            "flip"
        }

        fn apply<'a>(&self, expr: &'a Expr) -> Result<Cow<'a, Expr>, CompileError> {
            Ok(Cow::Owned(expr.clone().not()))
        }
    }

    let pipeline = RewritePipeline::new(vec![Box::new(Flip)]);
    let err = pipeline.apply(&lit(true)).unwrap_err();

    assert!(matches!(
        err,
        CompileError::NoFixedPoint {
            pass: "flip",
            rounds: MAX_REWRITE_ROUNDS
        }
    ));
}

mod common;

use quill::{
    compile,
    core::{
        compiler::cache,
        model::{Clause, ResultOp},
        registry::{ArgKind, CallShape, NodeType, RegistrySet, ResultKind},
    },
    install_extensions,
    prelude::*,
};
use std::thread;

fn vendor_set() -> RegistrySet {
    RegistrySet::new("vendor")
        .shape(
            CallShape::queryable("top", &[ArgKind::Operand]),
            NodeType::Take,
        )
        .shape(
            CallShape::queryable("exists", &[]),
            NodeType::Result(ResultKind::Any),
        )
}

// One test per binary: the extension list is process-wide and sealed by
// the first build.
#[test]
fn installed_extensions_reach_every_worker() {
    common::init_tracing();
    install_extensions(vec![vendor_set()]).unwrap();

    let handles = (0..3)
        .map(|_| {
            thread::spawn(|| {
                let expr = Queryable::source("person")
                    .call("top", vec![lit(3)])
                    .call("exists", vec![])
                    .into_expr();
                let model = compile(&expr).unwrap();

                (model, cache::builds_on_current_worker())
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        let (model, builds) = handle.join().unwrap();

        assert_eq!(builds, 1);
        assert!(matches!(model.clauses()[0], Clause::Take { .. }));
        assert_eq!(model.terminal(), Some(&Clause::Result(ResultOp::Any)));
        assert_eq!(model.kind(), QueryKind::Scalar);
    }

    assert!(cache::total_builds() >= 3);
    assert!(install_extensions(vec![vendor_set()]).is_err());
}

use crate::{
    expr::CallOwner,
    model::{OrderDirection, SetOpKind},
    registry::{ArgKind, CallShape, NodeType, RegistrySet, ResultKind},
};

const LAMBDA: ArgKind = ArgKind::Lambda(1);
const LAMBDA2: ArgKind = ArgKind::Lambda(2);
const OPERAND: ArgKind = ArgKind::Operand;

impl RegistrySet {
    /// The standard query operators.
    #[must_use]
    pub fn standard() -> Self {
        let q = CallShape::queryable;
        let mut set = Self::new("standard")
            .shape(q("filter", &[LAMBDA]), NodeType::Filter)
            .shape(q("select", &[LAMBDA]), NodeType::Select)
            .shape(q("order_by", &[LAMBDA]), NodeType::OrderBy(OrderDirection::Asc))
            .shape(q("order_by_desc", &[LAMBDA]), NodeType::OrderBy(OrderDirection::Desc))
            .shape(q("then_by", &[LAMBDA]), NodeType::ThenBy(OrderDirection::Asc))
            .shape(q("then_by_desc", &[LAMBDA]), NodeType::ThenBy(OrderDirection::Desc))
            .shape(q("skip", &[OPERAND]), NodeType::Skip)
            .shape(q("take", &[OPERAND]), NodeType::Take)
            .shape(q("group_by", &[LAMBDA]), NodeType::GroupBy)
            .shape(
                q("join", &[OPERAND, LAMBDA, LAMBDA, LAMBDA2]),
                NodeType::Join,
            )
            .shape(q("all", &[LAMBDA]), NodeType::Result(ResultKind::All))
            .shape(q("contains", &[OPERAND]), NodeType::Result(ResultKind::Contains))
            .by_name(CallOwner::Queryable, "distinct", NodeType::Distinct)
            .by_name(CallOwner::Queryable, "union", NodeType::SetOp(SetOpKind::Union))
            .by_name(
                CallOwner::Queryable,
                "intersect",
                NodeType::SetOp(SetOpKind::Intersect),
            )
            .by_name(CallOwner::Queryable, "except", NodeType::SetOp(SetOpKind::Except));

        // element and count operators take no arguments once predicate
        // overloads are lowered to a filter
        for kind in [
            ResultKind::Count,
            ResultKind::LongCount,
            ResultKind::Any,
            ResultKind::First,
            ResultKind::FirstOrDefault,
            ResultKind::Single,
            ResultKind::SingleOrDefault,
            ResultKind::Last,
        ] {
            set = set.shape(q(kind.name(), &[]), NodeType::Result(kind));
        }

        // aggregates over the rows themselves or over a selected value
        for kind in [
            ResultKind::Sum,
            ResultKind::Min,
            ResultKind::Max,
            ResultKind::Average,
        ] {
            set = set
                .shape(q(kind.name(), &[]), NodeType::Result(kind))
                .shape(q(kind.name(), &[LAMBDA]), NodeType::Result(kind));
        }

        set
    }

    /// Bulk delete and update.
    #[must_use]
    pub fn dml() -> Self {
        Self::new("dml")
            .shape(CallShape::dml("delete_all", &[]), NodeType::Delete)
            .shape(CallShape::dml("delete_all", &[LAMBDA]), NodeType::Delete)
            .shape(CallShape::dml("update_all", &[LAMBDA]), NodeType::Update)
    }
}

//! Operation recognizer registry.
//!
//! Maps the call shapes found in a query chain to the node types that know
//! how to decompose them into clauses. Built once, then frozen; lookups are
//! plain table reads.

mod node;
mod sets;
#[cfg(test)]
mod tests;

pub use node::{NodeType, ResultKind};

use crate::expr::{Call, CallOwner, Expr};
use derive_more::Display;
use std::{
    collections::HashMap,
    fmt::{self, Display},
};
use thiserror::Error as ThisError;
use tracing::debug;

///
/// ArgKind
/// Argument pattern element of a call shape.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ArgKind {
    /// A lambda (quoted or bare) of the given arity.
    #[display("lambda/{_0}")]
    Lambda(usize),

    /// Anything else: constants, sub-queries, dynamic operands.
    #[display("operand")]
    Operand,
}

impl ArgKind {
    #[must_use]
    pub fn of(expr: &Expr) -> Self {
        expr.as_lambda()
            .map_or(Self::Operand, |lambda| Self::Lambda(lambda.arity()))
    }
}

///
/// CallShape
/// Recognition key: owning family, operation name and argument pattern.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CallShape {
    pub owner: CallOwner,
    pub name: String,
    pub args: Vec<ArgKind>,
}

impl CallShape {
    #[must_use]
    pub fn new(owner: CallOwner, name: impl Into<String>, args: &[ArgKind]) -> Self {
        Self {
            owner,
            name: name.into(),
            args: args.to_vec(),
        }
    }

    #[must_use]
    pub fn queryable(name: impl Into<String>, args: &[ArgKind]) -> Self {
        Self::new(CallOwner::Queryable, name, args)
    }

    #[must_use]
    pub fn dml(name: impl Into<String>, args: &[ArgKind]) -> Self {
        Self::new(CallOwner::Dml, name, args)
    }

    /// Shape of a call node as it appears in the tree.
    #[must_use]
    pub fn of(call: &Call) -> Self {
        Self {
            owner: call.owner.clone(),
            name: call.method.clone(),
            args: call.args.iter().map(ArgKind::of).collect(),
        }
    }
}

impl Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.owner, self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

///
/// RegistryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RegistryError {
    #[error("call shape {shape} is already registered as {existing}; refusing {incoming}")]
    AmbiguousShape {
        shape: CallShape,
        existing: NodeType,
        incoming: NodeType,
    },

    #[error("operation {owner}::{name} is already registered as {existing}; refusing {incoming}")]
    AmbiguousName {
        owner: CallOwner,
        name: String,
        existing: NodeType,
        incoming: NodeType,
    },
}

///
/// Registry
///
/// Frozen recognition tables. The builder keeps the two tables disjoint by
/// operation; only [`RegistryBuilder::replace`] can put an exact shape over
/// a name entry, and then the exact shape wins.
///

#[derive(Clone, Debug, Default)]
pub struct Registry {
    shapes: HashMap<CallShape, NodeType>,
    names: HashMap<(CallOwner, String), NodeType>,
}

impl Registry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Standard query operators plus bulk delete/update.
    pub fn standard() -> Result<Self, RegistryError> {
        let mut builder = Self::builder();
        builder
            .merge(&RegistrySet::standard())?
            .merge(&RegistrySet::dml())?;

        Ok(builder.build())
    }

    #[must_use]
    pub fn lookup(&self, call: &Call) -> Option<NodeType> {
        self.shapes
            .get(&CallShape::of(call))
            .or_else(|| {
                self.names
                    .get(&(call.owner.clone(), call.method.clone()))
            })
            .copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len() + self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

///
/// RegistryBuilder
///

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    shapes: HashMap<CallShape, NodeType>,
    names: HashMap<(CallOwner, String), NodeType>,
}

impl RegistryBuilder {
    /// Register an exact shape.
    ///
    /// Fails if the shape is already taken, or if a name entry already
    /// claims the same operation; either way one call would match two
    /// node types.
    pub fn register(&mut self, shape: CallShape, node: NodeType) -> Result<&mut Self, RegistryError> {
        if let Some(existing) = self.shapes.get(&shape) {
            return Err(RegistryError::AmbiguousShape {
                shape,
                existing: *existing,
                incoming: node,
            });
        }
        if let Some(existing) = self.names.get(&(shape.owner.clone(), shape.name.clone())) {
            return Err(RegistryError::AmbiguousName {
                owner: shape.owner,
                name: shape.name,
                existing: *existing,
                incoming: node,
            });
        }
        self.shapes.insert(shape, node);

        Ok(self)
    }

    /// Register a name-only entry.
    ///
    /// Fails if the name is already taken in either table.
    pub fn register_name(
        &mut self,
        owner: CallOwner,
        name: impl Into<String>,
        node: NodeType,
    ) -> Result<&mut Self, RegistryError> {
        let key = (owner, name.into());
        let existing = self.names.get(&key).copied().or_else(|| {
            self.shapes
                .iter()
                .find(|(shape, _)| shape.owner == key.0 && shape.name == key.1)
                .map(|(_, node)| *node)
        });
        if let Some(existing) = existing {
            let (owner, name) = key;
            return Err(RegistryError::AmbiguousName {
                owner,
                name,
                existing,
                incoming: node,
            });
        }
        self.names.insert(key, node);

        Ok(self)
    }

    /// Explicit override of an exact shape. Also the only way to give one
    /// shape of a name-registered operation its own node type.
    pub fn replace(&mut self, shape: CallShape, node: NodeType) -> &mut Self {
        if let Some(previous) = self.shapes.insert(shape.clone(), node) {
            debug!(%shape, %previous, %node, "registry entry replaced");
        }

        self
    }

    /// Compose an independently authored set, failing on the first collision.
    pub fn merge(&mut self, set: &RegistrySet) -> Result<&mut Self, RegistryError> {
        for (shape, node) in &set.shapes {
            self.register(shape.clone(), *node)?;
        }
        for (owner, name, node) in &set.names {
            self.register_name(owner.clone(), name.clone(), *node)?;
        }
        debug!(set = set.name(), entries = set.len(), "registry set merged");

        Ok(self)
    }

    #[must_use]
    pub fn build(self) -> Registry {
        Registry {
            shapes: self.shapes,
            names: self.names,
        }
    }
}

///
/// RegistrySet
///
/// A named bundle of registrations authored together (the standard
/// operators, the bulk DML extension, a caller's own extension).
///

#[derive(Clone, Debug)]
pub struct RegistrySet {
    name: String,
    shapes: Vec<(CallShape, NodeType)>,
    names: Vec<(CallOwner, String, NodeType)>,
}

impl RegistrySet {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shapes: Vec::new(),
            names: Vec::new(),
        }
    }

    #[must_use]
    pub fn shape(mut self, shape: CallShape, node: NodeType) -> Self {
        self.shapes.push((shape, node));
        self
    }

    #[must_use]
    pub fn by_name(mut self, owner: CallOwner, name: impl Into<String>, node: NodeType) -> Self {
        self.names.push((owner, name.into(), node));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len() + self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

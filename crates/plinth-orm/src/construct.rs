//! Custom construction strategy.
//!
//! Some entities cannot be built through default construction because they
//! need collaborators injected at creation time. A module can register an
//! [`EntityFactory`] for such a type; at composition time the schema
//! composer fixes a [`Materializer`] per entity — factory if one was
//! registered, default construction otherwise — and stores it in the
//! table binding. Materialization always consults the factory first and
//! never falls back once a factory exists: a broken factory is a
//! configuration bug, so its panic propagates to the caller.

use std::sync::Arc;

use crate::entity::EntityInstance;

/// A per-entity capability that creates instances without relying on
/// default construction.
pub trait EntityFactory: Send + Sync {
    /// Creates a fresh, unpopulated entity instance. Never returns an
    /// absent value; the surrounding machinery populates persisted fields
    /// afterwards.
    fn create(&self) -> EntityInstance;
}

/// The construction path selected for one entity at composition time.
#[derive(Clone)]
pub enum Materializer {
    /// Default construction, the platform's no-argument path.
    DefaultConstruct(fn() -> EntityInstance),
    /// A module-registered construction factory.
    Factory(Arc<dyn EntityFactory>),
}

impl Materializer {
    /// Produces a new instance via the selected construction path.
    pub fn materialize(&self) -> EntityInstance {
        match self {
            Materializer::DefaultConstruct(construct) => construct(),
            Materializer::Factory(factory) => factory.create(),
        }
    }

    /// The registered factory, if this entity has one.
    pub fn factory(&self) -> Option<&Arc<dyn EntityFactory>> {
        match self {
            Materializer::DefaultConstruct(_) => None,
            Materializer::Factory(factory) => Some(factory),
        }
    }
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Materializer::DefaultConstruct(_) => f.write_str("Materializer::DefaultConstruct"),
            Materializer::Factory(_) => f.write_str("Materializer::Factory"),
        }
    }
}

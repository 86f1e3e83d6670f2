//! Groups of objects sharing one database handle.
//!
//! A [`Family`] holds several members (typically cost functions of different
//! kinds) built on the same `Rc` database, so model outputs computed for one
//! member are cache hits for the others. Member sets are looked up by data
//! kind in a [`FamilyRegistry`].
use crate::database::errors::{DataBaseError, DataBaseResult};
use std::collections::BTreeMap;
use std::rc::Rc;

type MemberConstructor<D, M> = Box<dyn Fn(Rc<D>) -> M>;

/// Member constructors per data kind, keyed case-insensitively.
pub struct FamilyRegistry<D: ?Sized, M> {
    constructors: BTreeMap<String, Vec<MemberConstructor<D, M>>>,
}

impl<D: ?Sized, M> FamilyRegistry<D, M> {
    pub fn new() -> Self {
        FamilyRegistry { constructors: BTreeMap::new() }
    }

    /// Append a member constructor for `data_kind`.
    pub fn register(&mut self, data_kind: &str, constructor: impl Fn(Rc<D>) -> M + 'static) {
        self.constructors.entry(data_kind.to_uppercase()).or_default().push(Box::new(constructor));
    }

    /// Registered kinds in sorted order.
    pub fn data_kinds(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl<D: ?Sized, M> Default for FamilyRegistry<D, M> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Family<D: ?Sized, M> {
    data_base: Rc<D>,
    members: Vec<M>,
}

impl<D: ?Sized, M> Family<D, M> {
    /// Panics
    /// ------
    /// - If `members` is empty.
    pub fn new(data_base: Rc<D>, members: Vec<M>) -> Self {
        assert!(!members.is_empty(), "a family needs at least one member");
        Family { data_base, members }
    }

    /// Build the members registered for `data_kind` on `data_base`.
    ///
    /// Errors
    /// ------
    /// - [`DataBaseError::UnknownDataKind`] naming the registered kinds.
    pub fn from_registry(
        data_kind: &str, registry: &FamilyRegistry<D, M>, data_base: Rc<D>,
    ) -> DataBaseResult<Self> {
        let constructors = registry
            .constructors
            .get(&data_kind.to_uppercase())
            .filter(|constructors| !constructors.is_empty())
            .ok_or_else(|| DataBaseError::UnknownDataKind {
                value: data_kind.to_string(),
                allowed: registry.data_kinds().collect::<Vec<_>>().join(", "),
            })?;
        let members = constructors.iter().map(|build| build(Rc::clone(&data_base))).collect();
        Ok(Family { data_base, members })
    }

    pub fn data_base(&self) -> &Rc<D> {
        &self.data_base
    }

    pub fn members(&self) -> &[M] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Run `op` on the first member, then on the remaining ones.
    ///
    /// The first call fills the shared caches; the results of all members are
    /// returned in member order. Stops at the first error.
    pub fn apply<R>(&self, mut op: impl FnMut(&M) -> DataBaseResult<R>) -> DataBaseResult<Vec<R>> {
        let mut results = Vec::with_capacity(self.members.len());
        for member in &self.members {
            results.push(op(member)?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Members sharing one handle.
    // - Case-insensitive registry lookup and the unknown-kind error.
    // - `apply` ordering and error short-circuit.
    // -------------------------------------------------------------------------

    struct Member {
        shared: Rc<Cell<u32>>,
        weight: u32,
    }

    fn registry() -> FamilyRegistry<Cell<u32>, Member> {
        let mut registry = FamilyRegistry::new();
        registry.register("wod", |shared| Member { shared, weight: 1 });
        registry.register("WOD", |shared| Member { shared, weight: 2 });
        registry.register("woa", |shared| Member { shared, weight: 10 });
        registry
    }

    #[test]
    // Purpose
    // -------
    // Every member sees state written through any other member.
    //
    // Given
    // -----
    // - Two members registered for "WOD" on one counter.
    //
    // Expect
    // ------
    // - Both members hold the same `Rc`; results come back in member order.
    fn members_share_one_handle() {
        // Arrange
        let family = Family::from_registry("Wod", &registry(), Rc::new(Cell::new(0))).unwrap();

        // Act
        let results = family
            .apply(|member| {
                member.shared.set(member.shared.get() + member.weight);
                Ok(member.shared.get())
            })
            .unwrap();

        // Assert
        assert_eq!(family.len(), 2);
        assert!(Rc::ptr_eq(&family.members()[0].shared, family.data_base()));
        assert_eq!(results, vec![1, 3]);
        assert_eq!(Rc::strong_count(family.data_base()), 3);
    }

    #[test]
    fn unknown_kind_names_registered_kinds() {
        match Family::from_registry("ARGO", &registry(), Rc::new(Cell::new(0))) {
            Err(DataBaseError::UnknownDataKind { value, allowed }) => {
                assert_eq!(value, "ARGO");
                assert_eq!(allowed, "WOA, WOD");
            }
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("unknown kind accepted"),
        }
    }

    #[test]
    fn apply_stops_at_first_error() {
        let family = Family::from_registry("WOD", &registry(), Rc::new(Cell::new(0))).unwrap();
        let mut calls = 0;
        let result = family.apply(|_| -> DataBaseResult<()> {
            calls += 1;
            Err(DataBaseError::Collaborator("model failed".into()))
        });
        assert_eq!(result, Err(DataBaseError::Collaborator("model failed".into())));
        assert_eq!(calls, 1);
    }
}

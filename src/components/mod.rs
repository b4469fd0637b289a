//! Sprite components.
//!
//! Behavior composes onto sprites through an explicit per-sprite registry:
//! an ordered list of (name, state) entries plus event-bus subscriptions.
//! Attaching a component stores its state, registers its `fn` handlers on
//! the sprite's events, and indexes the sprite into the stage's category
//! list for the component name; detaching reverses all three. Capability
//! checks go through [`Sprite::has_component`](crate::sprites::Sprite::has_component) —
//! nothing ever rewrites a sprite's method table at runtime.
//!
//! Submodules overview:
//! - [`platformer`] – velocity/gravity integration with sub-stepping, and
//!   contact resolution (separation, velocity zeroing, `bump.*` events)
//! - [`aibounce`] – turn around on side bumps
//! - [`viewport`] – stage camera with sprite follow and soft centering

pub mod aibounce;
pub mod platformer;
pub mod viewport;

use std::any::Any;

/// Ordered component registry: name → boxed component state.
#[derive(Default)]
pub struct ComponentSet {
    entries: Vec<(&'static str, Box<dyn Any>)>,
}

impl ComponentSet {
    /// Append a component's state. Re-adding an existing name replaces the
    /// state in place, keeping its position in the order.
    pub fn add(&mut self, name: &'static str, state: Box<dyn Any>) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = state;
        } else {
            self.entries.push((name, state));
        }
    }

    /// Remove a component's state.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Any>> {
        let idx = self.entries.iter().position(|(n, _)| *n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| *n == name)
    }

    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, state)| state.downcast_ref())
    }

    pub fn get_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|(n, _)| *n == name)
            .and_then(|(_, state)| state.downcast_mut())
    }

    /// Component names in attach order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Foo(i32);
    struct Bar;

    #[test]
    fn registry_keeps_attach_order() {
        let mut set = ComponentSet::default();
        set.add("foo", Box::new(Foo(1)));
        set.add("bar", Box::new(Bar));
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["foo", "bar"]);

        // Replacing keeps position.
        set.add("foo", Box::new(Foo(2)));
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["foo", "bar"]);
        assert_eq!(set.get::<Foo>("foo").unwrap().0, 2);
    }

    #[test]
    fn remove_and_capability_query() {
        let mut set = ComponentSet::default();
        set.add("foo", Box::new(Foo(1)));
        assert!(set.has("foo"));
        assert!(set.remove("foo").is_some());
        assert!(!set.has("foo"));
        assert!(set.remove("foo").is_none());
    }
}

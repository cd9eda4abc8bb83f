//! Shape matching and specialization.
//!
//! A rule is a candidate for a goal when its (possibly polymorphic)
//! consequent can be *specialized* to the monomorphic goal: every `Param` in
//! the consequent is bound to a concrete sub-shape of the goal, and repeated
//! params bind the same sub-shape. The resulting [`Substitution`] is then
//! applied to the rule's antecedents to turn them into concrete sub-goals.
//!
//! Matching is one-way: the target is always monomorphic, so there is no
//! occurs check and no variable-variable case. A failed match leaves no
//! partial substitution visible to callers because the caller discards the
//! scratch `Substitution` on failure.

use crate::Shape;

/// Bindings accumulated while matching a rule consequent against a goal.
///
/// Binding sets are small (one entry per distinct param in a consequent), so
/// a linear vector beats a hash map here.
#[derive(Debug, Clone, Default)]
pub(crate) struct Substitution {
    bindings: Vec<(&'static str, Shape)>,
}

impl Substitution {
    pub(crate) fn lookup(&self, name: &str) -> Option<&Shape> {
        self.bindings.iter().find(|(n, _)| *n == name).map(|(_, s)| s)
    }

    /// Bind `name` to `shape`. Returns false when `name` is already bound to
    /// a different shape: the substitution is inconsistent and the candidate
    /// must be rejected.
    fn bind(&mut self, name: &'static str, shape: &Shape) -> bool {
        match self.lookup(name) {
            Some(bound) => bound == shape,
            None => {
                self.bindings.push((name, shape.clone()));
                true
            }
        }
    }

    /// Specialize `shape` by replacing bound params. Unbound params survive;
    /// callers check [`Shape::is_monomorphic`] on the result before using it
    /// as a sub-goal.
    pub(crate) fn apply(&self, shape: &Shape) -> Shape {
        match shape {
            Shape::Atom(_) => shape.clone(),
            Shape::Param(name) => self.lookup(name).cloned().unwrap_or_else(|| shape.clone()),
            Shape::Apply { head, args } => {
                Shape::Apply { head, args: args.iter().map(|a| self.apply(a)).collect() }
            }
            Shape::Deferred(inner) => Shape::deferred(self.apply(inner)),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// One-way match of `pattern` (a rule consequent, possibly polymorphic)
/// against `target` (monomorphic). On success the bindings needed to
/// specialize the pattern have been added to `subst`.
pub(crate) fn match_shape(pattern: &Shape, target: &Shape, subst: &mut Substitution) -> bool {
    match (pattern, target) {
        (Shape::Param(name), _) => subst.bind(name, target),
        (Shape::Atom(a), Shape::Atom(b)) => a == b,
        (Shape::Apply { head: ph, args: pa }, Shape::Apply { head: th, args: ta }) => {
            ph == th
                && pa.len() == ta.len()
                && pa.iter().zip(ta).all(|(p, t)| match_shape(p, t, subst))
        }
        (Shape::Deferred(p), Shape::Deferred(t)) => match_shape(p, t, subst),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atoms_match_structurally() {
        let mut subst = Substitution::default();
        assert!(match_shape(&shape!(int), &shape!(int), &mut subst));
        assert!(subst.is_empty());
        assert!(!match_shape(&shape!(int), &shape!(text), &mut subst));
    }

    #[test]
    fn params_bind_and_specialize() {
        let pattern = shape!(list[shape!(? T)]);
        let target = shape!(list[shape!(int)]);

        let mut subst = Substitution::default();
        assert!(match_shape(&pattern, &target, &mut subst));
        assert_eq!(subst.lookup("T"), Some(&shape!(int)));
        assert_eq!(subst.apply(&shape!(? T)), shape!(int));
        assert_eq!(subst.apply(&shape!(pair[shape!(? T), shape!(? T)])), shape!(pair[shape!(int), shape!(int)]));
    }

    #[test]
    fn repeated_params_must_bind_the_same_shape() {
        let pattern = shape!(pair[shape!(? T), shape!(? T)]);

        let mut subst = Substitution::default();
        assert!(match_shape(&pattern, &shape!(pair[shape!(int), shape!(int)]), &mut subst));

        let mut subst = Substitution::default();
        assert!(!match_shape(&pattern, &shape!(pair[shape!(int), shape!(text)]), &mut subst));
    }

    #[test]
    fn arity_and_head_gate_applications() {
        let mut subst = Substitution::default();
        assert!(!match_shape(&shape!(list[shape!(? T)]), &shape!(set[shape!(int)]), &mut subst));
        assert!(!match_shape(
            &shape!(pair[shape!(? A), shape!(? B)]),
            &shape!(pair[shape!(int)]),
            &mut subst
        ));
    }

    #[test]
    fn deferred_matches_recursively() {
        let mut subst = Substitution::default();
        let pattern = crate::Shape::deferred(shape!(? T));
        let target = crate::Shape::deferred(shape!(node));
        assert!(match_shape(&pattern, &target, &mut subst));
        assert_eq!(subst.lookup("T"), Some(&shape!(node)));

        // A deferred pattern never matches the bare inner shape.
        let mut subst = Substitution::default();
        assert!(!match_shape(&crate::Shape::deferred(shape!(node)), &shape!(node), &mut subst));
    }

    #[test]
    fn unbound_params_survive_application() {
        let subst = Substitution::default();
        let open = subst.apply(&shape!(list[shape!(? T)]));
        assert!(!open.is_monomorphic());
    }
}

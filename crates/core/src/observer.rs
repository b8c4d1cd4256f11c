/// Watches a driver's iterations and optionally steers them.
///
/// A driver hands each iteration event to its observer. Returning
/// `Some(action)` asks the driver to act on it, such as stopping early;
/// returning `None` leaves the iteration alone.
///
/// Closures implement `Observer`, and `()` is an observer that never acts.
pub trait Observer<E, A> {
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_observe_events() {
        let mut seen = Vec::new();
        let mut stop_after_two = |n: &usize| {
            seen.push(*n);
            (*n >= 2).then_some("stop")
        };

        assert_eq!(stop_after_two.observe(&1), None);
        assert_eq!(stop_after_two.observe(&2), Some("stop"));
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn unit_never_acts() {
        let mut observer = ();
        assert_eq!(Observer::<usize, ()>::observe(&mut observer, &3), None);
    }
}

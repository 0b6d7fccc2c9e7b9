/// Handle returned by [`DataTable::subscribe`](super::DataTable::subscribe).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub(crate) type ChangeCallback = Box<dyn FnMut(&[String])>;

/// Change listeners, called in subscription order.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, ChangeCallback)>,
}

impl Subscribers {
    pub(crate) fn add(&mut self, callback: ChangeCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, callback));
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.len() != before
    }

    pub(crate) fn notify(&mut self, changed: &[String]) {
        if changed.is_empty() {
            return;
        }
        for (_, callback) in self.callbacks.iter_mut() {
            callback(changed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_notify_and_remove() {
        let seen: Rc<RefCell<Vec<Vec<String>>>> = Rc::default();
        let mut subs = Subscribers::default();
        let sink = Rc::clone(&seen);
        let id = subs.add(Box::new(move |changed| sink.borrow_mut().push(changed.to_vec())));

        subs.notify(&["a".to_string(), "b".to_string()]);
        subs.notify(&[]);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0], vec!["a", "b"]);

        assert!(subs.remove(id));
        assert!(!subs.remove(id));
        subs.notify(&["a".to_string()]);
        assert_eq!(seen.borrow().len(), 1);
        assert!(subs.callbacks.is_empty());
    }
}

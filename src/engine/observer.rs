use super::Engine;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener = Rc<RefCell<dyn FnMut(&Engine)>>;

#[derive(Default)]
struct ListenerList {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Registered change listeners.
#[derive(Default, Clone)]
pub(crate) struct Listeners {
    list: Rc<RefCell<ListenerList>>,
}

impl Listeners {
    pub(crate) fn add<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&Engine) + 'static,
    {
        let mut list = self.list.borrow_mut();
        list.next_id += 1;
        let id = list.next_id;
        let listener: Listener = Rc::new(RefCell::new(listener));
        list.entries.push((id, listener));
        Subscription {
            id,
            list: Rc::downgrade(&self.list),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.list.borrow().entries.len()
    }

    /// Calls every listener. The list is copied first so listeners may
    /// dispose subscriptions while being notified.
    pub(crate) fn notify(&self, engine: &Engine) {
        let listeners: Vec<Listener> = self
            .list
            .borrow()
            .entries
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            if let Ok(mut f) = listener.try_borrow_mut() {
                (&mut *f)(engine);
            }
        }
    }
}

/// Keeps a listener registered until dropped or disposed.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    id: u64,
    list: Weak<RefCell<ListenerList>>,
}

impl Subscription {
    pub fn dispose(self) {}

    pub fn is_active(&self) -> bool {
        self.list
            .upgrade()
            .is_some_and(|list| list.borrow().entries.iter().any(|(id, _)| *id == self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(list) = self.list.upgrade() {
            list.borrow_mut().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

//! Object substrate shared by every engine entity
//!
//! Each entity embeds an [`Object`] carrying its type tag, a process-unique
//! id, the nick/name/description triple and an optional lock. Shared
//! ownership is expressed with `Arc`; the strong count is the reference
//! count, so copying a handle is `Arc::clone` and releasing it is a drop.
//!
//! Locking is opt-in. A process installs [`LockHooks`] once at startup;
//! until then [`Object::lock`] is a no-op.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::message::report;

/// Type tag of an engine object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Profile,
    Module,
    Filter,
    FilterNode,
    Plug,
    Socket,
    Conversion,
    Image,
    PixelAccess,
    ColorLink,
}

/// Which of the three names to address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// Short identifier, e.g. a module code
    Nick,
    /// Human readable name
    Name,
    /// Longer description
    Description,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Names {
    nick: Option<String>,
    name: Option<String>,
    description: Option<String>,
}

impl Names {
    fn slot(&mut self, kind: NameKind) -> &mut Option<String> {
        match kind {
            NameKind::Nick => &mut self.nick,
            NameKind::Name => &mut self.name,
            NameKind::Description => &mut self.description,
        }
    }

    fn get(&self, kind: NameKind) -> Option<&String> {
        match kind {
            NameKind::Nick => self.nick.as_ref(),
            NameKind::Name => self.name.as_ref(),
            NameKind::Description => self.description.as_ref(),
        }
    }
}

/// Opaque lock created by [`LockHooks::create`]
pub type LockToken = Box<dyn Any + Send + Sync>;

/// Pluggable locking used by [`Object::lock`].
///
/// `marker` and `line` identify the call site for lock debugging.
pub trait LockHooks: Send + Sync {
    fn create(&self, kind: ObjectKind, id: u32) -> LockToken;
    fn lock(&self, token: &LockToken, marker: &str, line: u32);
    fn unlock(&self, token: &LockToken, marker: &str, line: u32);
    fn release(&self, token: LockToken);
}

static LOCK_HOOKS: Lazy<RwLock<Option<Arc<dyn LockHooks>>>> = Lazy::new(|| RwLock::new(None));

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Install lock hooks, replacing the previous set.
///
/// Objects that already created a lock keep using the hooks that created it.
pub fn set_lock_hooks(hooks: Option<Arc<dyn LockHooks>>) {
    *LOCK_HOOKS.write() = hooks;
}

/// Base object embedded in every entity
pub struct Object {
    id: u32,
    kind: ObjectKind,
    parent_kind: Option<ObjectKind>,
    names: RwLock<Names>,
    lock: OnceCell<(Arc<dyn LockHooks>, LockToken)>,
}

impl Object {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            parent_kind: None,
            names: RwLock::new(Names::default()),
            lock: OnceCell::new(),
        }
    }

    /// Construct an object inheriting the names of `parent`.
    pub fn with_parent(kind: ObjectKind, parent: &Object) -> Self {
        let mut object = Self::new(kind);
        object.parent_kind = Some(parent.kind);
        *object.names.get_mut() = parent.names.read().clone();
        object
    }

    /// Fresh object of the same kind and names, used by deep copies.
    pub fn duplicate(&self) -> Self {
        let mut object = Self::new(self.kind);
        object.parent_kind = self.parent_kind;
        *object.names.get_mut() = self.names.read().clone();
        object
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Kind of the object this one was derived from, if any
    pub fn parent_kind(&self) -> Option<ObjectKind> {
        self.parent_kind
    }

    pub fn set_name(&self, kind: NameKind, text: impl Into<String>) {
        *self.names.write().slot(kind) = Some(text.into());
    }

    pub fn name(&self, kind: NameKind) -> Option<String> {
        self.names.read().get(kind).cloned()
    }

    /// Reject use of this object as a different kind.
    pub fn check_kind(&self, expected: ObjectKind) -> Result<()> {
        if self.kind == expected {
            return Ok(());
        }
        report!(
            Error,
            Some(self),
            "object used as {:?} but carries type tag {:?}",
            expected,
            self.kind
        );
        Err(Error::WrongObjectKind {
            expected,
            actual: self.kind,
        })
    }

    /// Enter the object's critical section.
    ///
    /// The lock is created on first use through the installed hooks. The
    /// returned guard unlocks on drop.
    pub fn lock(&self, marker: &'static str, line: u32) -> ObjectGuard<'_> {
        let hooks = LOCK_HOOKS.read().clone();
        let entry = match (self.lock.get(), hooks) {
            (Some(entry), _) => Some(entry),
            (None, Some(hooks)) => Some(self.lock.get_or_init(|| {
                let token = hooks.create(self.kind, self.id);
                (hooks, token)
            })),
            (None, None) => None,
        };
        if let Some((hooks, token)) = entry {
            hooks.lock(token, marker, line);
        }
        ObjectGuard {
            object: self,
            locked: entry.is_some(),
            marker,
            line,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("names", &*self.names.read())
            .finish()
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        if let Some((hooks, token)) = self.lock.take() {
            hooks.release(token);
        }
    }
}

/// Held while an object is locked
pub struct ObjectGuard<'a> {
    object: &'a Object,
    locked: bool,
    marker: &'static str,
    line: u32,
}

impl Drop for ObjectGuard<'_> {
    fn drop(&mut self) {
        if !self.locked {
            return;
        }
        if let Some((hooks, token)) = self.object.lock.get() {
            hooks.unlock(token, self.marker, self.line);
        }
    }
}

#[doc(hidden)]
pub trait AsAnyArc {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// An entity that embeds an [`Object`]
pub trait Struct: AsAnyArc + Send + Sync {
    fn object(&self) -> &Object;
}

/// Copy with independent storage, as opposed to sharing through `Arc`.
pub trait DeepCopy: Sized {
    fn deep_copy(&self) -> Self;
}

/// Take a typed reference out of a type-erased handle.
///
/// The type tag is checked first; a mismatch is logged and rejected.
pub fn copy_as<T: Struct + 'static>(handle: &Arc<dyn Struct>, expected: ObjectKind) -> Result<Arc<T>> {
    handle.object().check_kind(expected)?;
    let actual = handle.object().kind();
    handle
        .clone()
        .as_any_arc()
        .downcast::<T>()
        .map_err(|_| Error::WrongObjectKind { expected, actual })
}

/// Release a handle slot, returning the remaining reference count.
///
/// Releasing an empty slot is a no-op returning 0. Teardown runs when the
/// last reference goes away.
pub fn release<T: ?Sized>(slot: &mut Option<Arc<T>>) -> usize {
    match slot.take() {
        Some(handle) => Arc::strong_count(&handle) - 1,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Dummy {
        object: Object,
    }

    impl Struct for Dummy {
        fn object(&self) -> &Object {
            &self.object
        }
    }

    #[derive(Default)]
    struct CountingHooks {
        events: Mutex<Vec<(u32, &'static str)>>,
    }

    fn token_id(token: &LockToken) -> u32 {
        token.downcast_ref::<u32>().copied().unwrap_or(0)
    }

    impl LockHooks for CountingHooks {
        fn create(&self, _kind: ObjectKind, id: u32) -> LockToken {
            self.events.lock().push((id, "create"));
            Box::new(id)
        }
        fn lock(&self, token: &LockToken, _marker: &str, _line: u32) {
            self.events.lock().push((token_id(token), "lock"));
        }
        fn unlock(&self, token: &LockToken, _marker: &str, _line: u32) {
            self.events.lock().push((token_id(token), "unlock"));
        }
        fn release(&self, token: LockToken) {
            self.events.lock().push((token_id(&token), "release"));
        }
    }

    #[test]
    fn test_names_inherited_from_parent() {
        let parent = Object::new(ObjectKind::Filter);
        parent.set_name(NameKind::Nick, "lcm2");
        parent.set_name(NameKind::Description, "color filter");

        let child = Object::with_parent(ObjectKind::FilterNode, &parent);
        assert_eq!(child.name(NameKind::Nick).as_deref(), Some("lcm2"));
        assert_eq!(child.name(NameKind::Name), None);
        assert_eq!(child.parent_kind(), Some(ObjectKind::Filter));
        assert_ne!(child.id(), parent.id());
    }

    #[test]
    fn test_check_kind_rejects_mismatch() {
        let obj = Object::new(ObjectKind::Image);
        assert!(obj.check_kind(ObjectKind::Image).is_ok());
        let err = obj.check_kind(ObjectKind::Profile).unwrap_err();
        assert!(matches!(
            err,
            Error::WrongObjectKind {
                expected: ObjectKind::Profile,
                actual: ObjectKind::Image
            }
        ));
    }

    #[test]
    fn test_copy_as() {
        let dummy: Arc<dyn Struct> = Arc::new(Dummy {
            object: Object::new(ObjectKind::ColorLink),
        });
        let typed = copy_as::<Dummy>(&dummy, ObjectKind::ColorLink).unwrap();
        assert_eq!(Arc::strong_count(&typed), 2);
        assert!(copy_as::<Dummy>(&dummy, ObjectKind::Image).is_err());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut slot = Some(Arc::new(5u8));
        let other = slot.clone();
        assert_eq!(release(&mut slot), 1);
        assert_eq!(release(&mut slot), 0);
        assert_eq!(other.map(|v| *v), Some(5));
    }

    #[test]
    fn test_lock_without_hooks_is_noop() {
        let _guard = crate::message::tests::HOOK_GUARD.lock();
        let obj = Object::new(ObjectKind::Profile);
        let guard = obj.lock("test", line!());
        assert!(!guard.locked);
        assert!(obj.lock.get().is_none());
    }

    #[test]
    fn test_lock_hooks_sequence() {
        let _guard = crate::message::tests::HOOK_GUARD.lock();
        let hooks = Arc::new(CountingHooks::default());
        set_lock_hooks(Some(hooks.clone()));
        let id;
        {
            let obj = Object::new(ObjectKind::Profile);
            id = obj.id();
            {
                let _g = obj.lock("test", line!());
            }
            {
                let _g = obj.lock("test", line!());
            }
        }
        set_lock_hooks(None);
        let events: Vec<&str> = hooks
            .events
            .lock()
            .iter()
            .filter(|(owner, _)| *owner == id)
            .map(|(_, event)| *event)
            .collect();
        assert_eq!(
            events,
            vec!["create", "lock", "unlock", "lock", "unlock", "release"]
        );
    }
}

//! Per-request context objects and the parent chain that links them.
//!
//! Every router declares a context type. For each request, dispatch allocates
//! one context per router between the root and the router owning the matched
//! route:
//!
//! ```text
//! routers:   root(App) ── admin(Admin) ── tickets(Admin) ── audit(Audit)
//! contexts:  Rc<App>  ←── Rc<Admin> ═════ (same Rc) ←─────── Rc<Audit>
//! ```
//!
//! A child router either shares its parent's type, in which case the parent's
//! instance is reused, or declares a [`SubContext`] whose `Parent` is the
//! parent router's type, in which case a new instance is built around an `Rc`
//! of the parent instance. Handlers receive `&C`; fields that middleware
//! mutates for later handlers use interior mutability (`Cell`, `RefCell`).

use std::any::{Any, TypeId};
use std::rc::Rc;

/// A context type that wraps the context of its parent router.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use arbor::SubContext;
///
/// #[derive(Default)]
/// struct App { user: RefCell<Option<String>> }
///
/// struct Admin { app: Rc<App> }
///
/// impl SubContext for Admin {
///     type Parent = App;
///     fn from_parent(app: Rc<App>) -> Self { Admin { app } }
///     fn parent(&self) -> &App { &self.app }
/// }
/// ```
pub trait SubContext: 'static {
    type Parent: 'static;

    /// Builds a fresh instance linked to `parent`.
    fn from_parent(parent: Rc<Self::Parent>) -> Self;

    fn parent(&self) -> &Self::Parent;
}

pub(crate) type ErasedContext = Rc<dyn Any>;

/// Identity of a router's context type plus how to build it from the context
/// one level up.
#[derive(Clone, Copy)]
pub(crate) struct ContextType {
    id: TypeId,
    name: &'static str,
    build: Build,
}

#[derive(Clone, Copy)]
enum Build {
    Root(fn() -> ErasedContext),
    Derived(fn(&ErasedContext) -> ErasedContext),
    Shared,
}

impl ContextType {
    pub(crate) fn root<C: Default + 'static>() -> Self {
        Self::new::<C>(Build::Root(new_root::<C>))
    }

    pub(crate) fn derived<D: SubContext>() -> Self {
        Self::new::<D>(Build::Derived(new_derived::<D>))
    }

    /// The type of a child router that reuses its parent's context instance.
    pub(crate) fn shared(self) -> Self {
        Self { build: Build::Shared, ..self }
    }

    fn new<C: 'static>(build: Build) -> Self {
        Self { id: TypeId::of::<C>(), name: std::any::type_name::<C>(), build }
    }

    pub(crate) fn id(&self) -> TypeId { self.id }

    pub(crate) fn name(&self) -> &'static str { self.name }

    /// Allocates the root instance. Only meaningful on the root router.
    pub(crate) fn instantiate(&self) -> ErasedContext {
        match self.build {
            Build::Root(new) => new(),
            Build::Derived(_) | Build::Shared => {
                panic!("`{}` is not a root context type", self.name)
            }
        }
    }
}

/// Extends `contexts` (which holds the root instance) with one instance per
/// remaining router type in `types`, root to leaf.
///
/// Consecutive routers with the same type share one instance; otherwise a new
/// instance is derived from the previous one.
pub(crate) fn build_chain(types: &[ContextType], contexts: &mut Vec<ErasedContext>) {
    debug_assert_eq!(contexts.len(), 1);

    for pair in types.windows(2) {
        let (parent, child) = (&pair[0], &pair[1]);
        let previous = &contexts[contexts.len() - 1];

        let next = if child.id == parent.id {
            Rc::clone(previous)
        } else {
            match child.build {
                Build::Derived(derive) => derive(previous),
                Build::Root(_) | Build::Shared => panic!(
                    "context chain broken: `{}` cannot follow `{}`",
                    child.name, parent.name,
                ),
            }
        };
        contexts.push(next);
    }
}

/// Borrows a type-erased context as the concrete type a handler was
/// registered with.
pub(crate) fn downcast<C: 'static>(ctx: &dyn Any) -> &C {
    ctx.downcast_ref::<C>().unwrap_or_else(|| {
        panic!("context chain out of sync: expected `{}`", std::any::type_name::<C>())
    })
}

pub(crate) fn type_of(ctx: &ErasedContext) -> TypeId {
    (**ctx).type_id()
}

fn new_root<C: Default + 'static>() -> ErasedContext {
    Rc::new(C::default())
}

fn new_derived<D: SubContext>(parent: &ErasedContext) -> ErasedContext {
    let parent = Rc::clone(parent).downcast::<D::Parent>().unwrap_or_else(|_| {
        panic!(
            "context chain out of sync: `{}` needs a `{}` parent",
            std::any::type_name::<D>(),
            std::any::type_name::<D::Parent>(),
        )
    });
    Rc::new(D::from_parent(parent))
}

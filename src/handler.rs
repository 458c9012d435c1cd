//! Call-signature contracts for everything a router can hold, and type erasure.
//!
//! # Two kinds of function per slot
//!
//! Every slot (route handler, middleware, error handler, options handler)
//! accepts two shapes: a *generic* function that does not care about the
//! router's context, and a *contextual* one that takes `&C` first:
//!
//! ```text
//! fn handler(rw: &mut ResponseWriter, req: &mut Request)
//! fn handler(ctx: &Ctx, rw: &mut ResponseWriter, req: &mut Request)
//!
//! fn middleware(rw: &mut ResponseWriter, req: &mut Request, next: Next<'_>)
//! fn middleware(ctx: &Ctx, rw: &mut ResponseWriter, req: &mut Request, next: Next<'_>)
//!
//! fn error_handler(rw: &mut ResponseWriter, req: &mut Request, err: &Panic)
//! fn error_handler(ctx: &Ctx, rw: &mut ResponseWriter, req: &mut Request, err: &Panic)
//!
//! fn options_handler(rw: &mut ResponseWriter, req: &mut Request, methods: &[Method])
//! fn options_handler(ctx: &Ctx, rw: &mut ResponseWriter, req: &mut Request, methods: &[Method])
//! ```
//!
//! The kind is picked by the compiler at the registration call site through
//! the `Kind` type parameter ([`Generic`] or [`Contextual`]) and stored as an
//! enum variant, so dispatch never inspects a function's shape per request.
//! A function that fits neither shape, or takes a context other than the
//! router's own `C`, does not compile; the error lists the accepted
//! signatures.
//!
//! # Storage
//!
//! ```text
//! fn show(ctx: &Ctx, rw, req) { … }            ← user writes this
//!        ↓ router.get("/", show)
//! show.into_boxed()                            ← blanket impl for Kind = Contextual
//!        ↓
//! BoxedHandler::Contextual(Arc::new(WithContext(show)))
//!        ↓ at request time
//! boxed.call(&*ctx_rc, rw, req)                ← one downcast + one vtable call
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::downcast;
use crate::dispatch::Next;
use crate::method::Method;
use crate::panic::Panic;
use crate::request::Request;
use crate::response::ResponseWriter;

/// Marks a function that takes no context argument.
pub enum Generic {}

/// Marks a function whose first argument is `&C`.
pub enum Contextual {}

/// Holds a contextual function together with the context type it expects.
struct WithContext<C, F> {
    f: F,
    _ctx: PhantomData<fn(&C)>,
}

impl<C, F> WithContext<C, F> {
    fn new(f: F) -> Self {
        Self { f, _ctx: PhantomData }
    }
}

macro_rules! signature {
    (
        $(#[$attr:meta])*
        pub trait $Trait:ident, enum $Boxed:ident, trait $Erased:ident, mod $sealed:ident;
        ($($arg:ident: $ty:ty),*)
    ) => {
        // Only the blanket impls below can satisfy the public trait.
        mod $sealed {
            pub trait Sealed<C, Kind> {}
        }

        $(#[$attr])*
        pub trait $Trait<C, Kind>: $sealed::Sealed<C, Kind> + Send + Sync + 'static {
            #[doc(hidden)]
            fn into_boxed(self) -> $Boxed;
        }

        #[doc(hidden)]
        pub trait $Erased: Send + Sync {
            fn call(&self, ctx: &dyn Any, rw: &mut ResponseWriter, req: &mut Request $(, $arg: $ty)*);
        }

        /// Type-erased registration, tagged with its kind.
        #[doc(hidden)]
        #[derive(Clone)]
        pub enum $Boxed {
            Generic(Arc<dyn Fn(&mut ResponseWriter, &mut Request $(, $ty)*) + Send + Sync>),
            Contextual(Arc<dyn $Erased>),
        }

        impl $Boxed {
            pub(crate) fn call(
                &self,
                ctx: &dyn Any,
                rw: &mut ResponseWriter,
                req: &mut Request
                $(, $arg: $ty)*
            ) {
                match self {
                    Self::Generic(f) => f(rw, req $(, $arg)*),
                    Self::Contextual(f) => f.call(ctx, rw, req $(, $arg)*),
                }
            }
        }

        impl<C, F> $sealed::Sealed<C, Generic> for F
        where
            F: Fn(&mut ResponseWriter, &mut Request $(, $ty)*) + Send + Sync + 'static,
        {
        }

        impl<C, F> $Trait<C, Generic> for F
        where
            F: Fn(&mut ResponseWriter, &mut Request $(, $ty)*) + Send + Sync + 'static,
        {
            fn into_boxed(self) -> $Boxed {
                $Boxed::Generic(Arc::new(self))
            }
        }

        impl<C, F> $sealed::Sealed<C, Contextual> for F
        where
            C: 'static,
            F: Fn(&C, &mut ResponseWriter, &mut Request $(, $ty)*) + Send + Sync + 'static,
        {
        }

        impl<C, F> $Trait<C, Contextual> for F
        where
            C: 'static,
            F: Fn(&C, &mut ResponseWriter, &mut Request $(, $ty)*) + Send + Sync + 'static,
        {
            fn into_boxed(self) -> $Boxed {
                $Boxed::Contextual(Arc::new(WithContext::<C, F>::new(self)))
            }
        }

        impl<C, F> $Erased for WithContext<C, F>
        where
            C: 'static,
            F: Fn(&C, &mut ResponseWriter, &mut Request $(, $ty)*) + Send + Sync,
        {
            fn call(&self, ctx: &dyn Any, rw: &mut ResponseWriter, req: &mut Request $(, $arg: $ty)*) {
                (self.f)(downcast::<C>(ctx), rw, req $(, $arg)*)
            }
        }
    };
}

signature! {
    /// A route handler, or the root router's not-found handler.
    ///
    /// Implemented for every `Fn(&mut ResponseWriter, &mut Request)` and every
    /// `Fn(&C, &mut ResponseWriter, &mut Request)` where `C` is the router's
    /// context type. You never implement it yourself.
    #[diagnostic::on_unimplemented(
        message = "`{Self}` is not a valid handler for a router with context `{C}`",
        label = "invalid handler signature",
        note = "a handler is `fn(rw: &mut ResponseWriter, req: &mut Request)`",
        note = "or, to receive the context, `fn(ctx: &{C}, rw: &mut ResponseWriter, req: &mut Request)`",
        note = "handlers return `()`; closures need their argument types annotated"
    )]
    pub trait Handler, enum BoxedHandler, trait ErasedHandler, mod sealed_handler;
    ()
}

signature! {
    /// Middleware: runs before the handler and decides whether to continue by
    /// calling [`Next::run`].
    #[diagnostic::on_unimplemented(
        message = "`{Self}` is not valid middleware for a router with context `{C}`",
        label = "invalid middleware signature",
        note = "middleware is `fn(rw: &mut ResponseWriter, req: &mut Request, next: Next<'_>)`",
        note = "or, to receive the context, `fn(ctx: &{C}, rw: &mut ResponseWriter, req: &mut Request, next: Next<'_>)`",
        note = "middleware returns `()`"
    )]
    pub trait Middleware, enum BoxedMiddleware, trait ErasedMiddleware, mod sealed_middleware;
    (next: Next<'_>)
}

signature! {
    /// An error handler, invoked with the payload of a recovered panic.
    #[diagnostic::on_unimplemented(
        message = "`{Self}` is not a valid error handler for a router with context `{C}`",
        label = "invalid error handler signature",
        note = "an error handler is `fn(rw: &mut ResponseWriter, req: &mut Request, err: &Panic)`",
        note = "or, to receive the context, `fn(ctx: &{C}, rw: &mut ResponseWriter, req: &mut Request, err: &Panic)`",
        note = "error handlers return `()`"
    )]
    pub trait ErrorHandler, enum BoxedErrorHandler, trait ErasedErrorHandler, mod sealed_error_handler;
    (err: &Panic)
}

signature! {
    /// The root router's OPTIONS responder, invoked with the methods that have
    /// a route for the requested path.
    #[diagnostic::on_unimplemented(
        message = "`{Self}` is not a valid options handler for a router with context `{C}`",
        label = "invalid options handler signature",
        note = "an options handler is `fn(rw: &mut ResponseWriter, req: &mut Request, methods: &[Method])`",
        note = "or, to receive the context, `fn(ctx: &{C}, rw: &mut ResponseWriter, req: &mut Request, methods: &[Method])`",
        note = "options handlers return `()`"
    )]
    pub trait OptionsHandler, enum BoxedOptionsHandler, trait ErasedOptionsHandler, mod sealed_options_handler;
    (methods: &[Method])
}

//! Method descriptors: resolve once, call many
//!
//! A [`MethodDescriptor`] is an immutable handle to a method in the target
//! runtime, tagged with the dispatch kind that decides its calling
//! convention. Resolution runs once per (class, method, signature, kind)
//! tuple; the descriptor is then safe to share read-only across threads for
//! any number of calls, until it is released.

use crate::error::{BridgeError, BridgeResult};
use crate::translate::wrap_exception;
use gantry_core::{MethodId, ObjRef, Runtime, ScopedRef, CONSTRUCTOR_NAME};

/// Dispatch kind: decides the calling convention, independent of the
/// receiver's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodKind {
    /// No resolution has happened; calling is a usage error
    #[default]
    Uninitialized,
    /// Allocate and initialize a new instance
    Constructor,
    /// Static invocation through the descriptor's class
    Static,
    /// Dynamic dispatch on the receiver's runtime type
    Virtual,
    /// Dispatch on the descriptor's class, bypassing the receiver's type
    NonVirtual,
}

impl MethodKind {
    /// Whether this kind dispatches through the descriptor's own class and
    /// therefore needs a long-lived class reference.
    pub(crate) fn needs_class_ref(self) -> bool {
        !matches!(self, MethodKind::Virtual | MethodKind::Uninitialized)
    }
}

/// An immutable, resolved reference to a callable method.
///
/// Either fully resolved or fully unresolved; partial resolution is never
/// observable. The long-lived class reference (present for kinds that
/// dispatch through the descriptor's class) is owned exclusively by the
/// descriptor and released exactly once, by [`MethodDescriptor::release`];
/// release consumes the descriptor, so a second release does not compile.
#[derive(Debug)]
pub struct MethodDescriptor {
    kind: MethodKind,
    class_ref: Option<ObjRef>,
    method: Option<MethodId>,
}

impl Default for MethodDescriptor {
    fn default() -> Self {
        Self::unresolved()
    }
}

impl MethodDescriptor {
    /// An unresolved descriptor. Calling it fails with
    /// [`BridgeError::Misuse`] before anything reaches the runtime.
    pub fn unresolved() -> Self {
        Self {
            kind: MethodKind::Uninitialized,
            class_ref: None,
            method: None,
        }
    }

    /// Resolve a method in the target runtime.
    ///
    /// For `MethodKind::Constructor` the supplied method name is ignored
    /// and the runtime's constructor marker is used instead. Kinds other
    /// than `Virtual` promote the class reference to a long-lived one owned
    /// by the returned descriptor.
    ///
    /// The transient local class reference is released on every exit path;
    /// a global reference acquired before a failed method lookup is
    /// released before the error returns.
    pub fn resolve(
        rt: &Runtime,
        class_name: &str,
        method_name: &str,
        signature: &str,
        kind: MethodKind,
    ) -> BridgeResult<Self> {
        if kind == MethodKind::Uninitialized {
            return Err(BridgeError::Misuse(
                "cannot resolve with kind Uninitialized".to_string(),
            ));
        }
        if class_name.is_empty() || signature.is_empty() {
            return Err(BridgeError::Misuse(
                "class name and signature must be non-empty".to_string(),
            ));
        }

        let class_local = match rt.find_class(class_name) {
            Ok(r) => ScopedRef::new(rt, r),
            Err(exc) => {
                return Err(BridgeError::ClassNotFound {
                    class: class_name.to_string(),
                    source: wrap_exception(exc, format!("could not find class {}", class_name)),
                })
            }
        };

        let method_name = if kind == MethodKind::Constructor {
            CONSTRUCTOR_NAME
        } else {
            method_name
        };

        let class_global = if kind.needs_class_ref() {
            match rt.new_global_ref(class_local.get()) {
                Ok(r) => Some(r),
                Err(exc) => {
                    return Err(BridgeError::ResourceExhausted {
                        message: format!("failed creating global reference for {}", class_name),
                        source: exc,
                    })
                }
            }
        } else {
            None
        };

        let lookup = if kind == MethodKind::Static {
            rt.get_static_method_id(class_local.get(), method_name, signature)
        } else {
            rt.get_method_id(class_local.get(), method_name, signature)
        };

        let method = match lookup {
            Ok(m) => m,
            Err(exc) => {
                if let Some(global) = class_global {
                    let _ = rt.delete_global_ref(global);
                }
                return Err(BridgeError::MethodNotFound {
                    class: class_name.to_string(),
                    method: method_name.to_string(),
                    signature: signature.to_string(),
                    source: wrap_exception(
                        exc,
                        format!(
                            "could not find method {}.{}{}",
                            class_name, method_name, signature
                        ),
                    ),
                });
            }
        };

        Ok(Self {
            kind,
            class_ref: class_global,
            method: Some(method),
        })
    }

    /// The dispatch kind.
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Whether this descriptor has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.kind != MethodKind::Uninitialized
    }

    pub(crate) fn class_ref(&self) -> Option<ObjRef> {
        self.class_ref
    }

    pub(crate) fn method(&self) -> Option<MethodId> {
        self.method
    }

    /// Release the descriptor, dropping the owned class reference.
    ///
    /// Consumes the descriptor: the "exactly once" ownership invariant is
    /// enforced by the type system rather than checked at runtime.
    pub fn release(self, rt: &Runtime) -> BridgeResult<()> {
        if let Some(class_ref) = self.class_ref {
            rt.delete_global_ref(class_ref)?;
        }
        Ok(())
    }
}

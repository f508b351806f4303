//! Render surface binding
//!
//! Hosts bind surfaces in different ways (a texture entry that lives as long
//! as the player, a producer that can drop and recreate its surface, a
//! builder-injected view). All of them reduce to [`RenderSurface`]: acquire
//! the current drawable, report loss and recreation, and give the binding
//! back on release. The session never destroys the surface itself.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Opaque reference to a host drawable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceHandle(pub u64);

impl std::fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Notified when the host destroys or recreates the drawable
pub trait SurfaceLifecycleListener: Send + Sync {
    /// The drawable is already gone when this runs
    fn on_surface_destroyed(&self);

    /// A new drawable can be acquired
    fn on_surface_available(&self);
}

/// Host surface binding capability
pub trait RenderSurface: Send + Sync {
    /// Current drawable, `None` while destroyed
    fn acquire_surface(&self) -> Option<SurfaceHandle>;

    /// Register (or clear) the loss/recreate listener
    fn set_lifecycle_listener(&self, listener: Option<Arc<dyn SurfaceLifecycleListener>>);

    /// Hand the binding back to its owner
    fn release(&self);
}

#[derive(Default)]
struct ManualSurfaceState {
    current: Option<SurfaceHandle>,
    next_id: u64,
    listener: Option<Arc<dyn SurfaceLifecycleListener>>,
    released: bool,
}

/// Surface binding driven explicitly by the host.
///
/// `destroy` and `recreate` notify the registered listener after the internal
/// lock is dropped, so the listener may call back into `acquire_surface`.
#[derive(Default)]
pub struct ManualSurface {
    state: Mutex<ManualSurfaceState>,
}

impl ManualSurface {
    /// A binding with one live drawable
    pub fn new() -> Self {
        let surface = Self::default();
        {
            let mut state = surface.state.lock();
            state.next_id = 1;
            state.current = Some(SurfaceHandle(0));
        }
        surface
    }

    /// Drop the current drawable and tell the listener
    pub fn destroy(&self) {
        let listener = {
            let mut state = self.state.lock();
            if state.current.take().is_none() {
                return;
            }
            debug!("Surface destroyed");
            state.listener.clone()
        };
        if let Some(listener) = listener {
            listener.on_surface_destroyed();
        }
    }

    /// Create a fresh drawable and tell the listener
    pub fn recreate(&self) -> SurfaceHandle {
        let (handle, listener) = {
            let mut state = self.state.lock();
            let handle = SurfaceHandle(state.next_id);
            state.next_id += 1;
            state.current = Some(handle);
            debug!(surface = %handle, "Surface recreated");
            (handle, state.listener.clone())
        };
        if let Some(listener) = listener {
            listener.on_surface_available();
        }
        handle
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    pub fn has_listener(&self) -> bool {
        self.state.lock().listener.is_some()
    }
}

impl RenderSurface for ManualSurface {
    fn acquire_surface(&self) -> Option<SurfaceHandle> {
        self.state.lock().current
    }

    fn set_lifecycle_listener(&self, listener: Option<Arc<dyn SurfaceLifecycleListener>>) {
        self.state.lock().listener = listener;
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.released = true;
        state.listener = None;
    }
}

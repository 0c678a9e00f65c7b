use std::fmt;

use anyhow::Result;

/// Identifier value meaning "no backend object".
pub const INVALID_RESOURCE_ID: u64 = 0;

type DestroyFn = Box<dyn FnOnce(u64)>;

/// Owning handle to a backend object.
///
/// The backend supplies two closures: one that creates the object and writes
/// its identifier, and one that destroys it. Creation runs immediately in
/// [`GpuResource::create`]; destruction runs exactly once, when the handle is
/// released or dropped, and only if creation succeeded with a non-sentinel id.
pub struct GpuResource {
    id: u64,
    destroy: Option<DestroyFn>,
}

impl GpuResource {
    /// Runs `creation` against a zeroed id slot and keeps `destruction` for
    /// later.
    ///
    /// If `creation` fails the error is returned and `destruction` is
    /// dropped unused. If it succeeds but leaves the id at
    /// [`INVALID_RESOURCE_ID`], an invalid handle is returned whose drop is a
    /// no-op.
    pub fn create<C, D>(creation: C, destruction: D) -> Result<Self>
    where
        C: FnOnce(&mut u64) -> Result<()>,
        D: FnOnce(u64) + 'static,
    {
        let mut id = INVALID_RESOURCE_ID;

        if let Err(e) = creation(&mut id) {
            if id != INVALID_RESOURCE_ID {
                log::warn!("resource creation failed after assigning id {id}; object is not destroyed");
            }
            return Err(e);
        }

        if id == INVALID_RESOURCE_ID {
            log::warn!("resource creation left the id at the sentinel value");
            return Ok(Self::default());
        }

        Ok(Self {
            id,
            destroy: Some(Box::new(destruction)),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        self.id != INVALID_RESOURCE_ID
    }

    /// Destroys the backend object now. Later calls and the eventual drop do
    /// nothing.
    pub fn release(&mut self) {
        let id = std::mem::replace(&mut self.id, INVALID_RESOURCE_ID);
        if let Some(destroy) = self.destroy.take() {
            if id != INVALID_RESOURCE_ID {
                destroy(id);
            }
        }
    }
}

impl Default for GpuResource {
    /// An empty handle that owns nothing.
    fn default() -> Self {
        Self {
            id: INVALID_RESOURCE_ID,
            destroy: None,
        }
    }
}

impl Drop for GpuResource {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for GpuResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuResource")
            .field("id", &self.id)
            .field("owns_destructor", &self.destroy.is_some())
            .finish()
    }
}

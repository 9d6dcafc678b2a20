//! HLS front-end collaborator

use crate::path::PathHandle;

/// Front-end that needs to know which paths are ready
///
/// Called from the registry loop: implementations must not block and must
/// not call back into the registry synchronously.
pub trait HlsServer: Send + Sync + 'static {
    fn path_ready(&self, path: &PathHandle);

    fn path_not_ready(&self, path: &PathHandle);
}

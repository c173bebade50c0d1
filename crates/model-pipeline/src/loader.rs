//! ShapeLoader: raw exchange-document bytes to a composite solid.

use shape_kernel::{Kernel, ReadStatus, SolidHandle};
use tracing::{debug, info, instrument, warn};

use crate::types::{LoadError, LoadRequest};

/// A file staged in the kernel's working area, removed on drop.
struct StagedFile<'k> {
    kernel: &'k mut dyn Kernel,
    name: String,
}

impl<'k> StagedFile<'k> {
    fn stage(kernel: &'k mut dyn Kernel, bytes: &[u8]) -> Result<Self, shape_kernel::KernelError> {
        let name = format!("stage-{}.step", uuid::Uuid::new_v4());
        kernel.stage_file(&name, bytes)?;
        Ok(Self { kernel, name })
    }
}

impl Drop for StagedFile<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.kernel.remove_staged(&self.name) {
            warn!(name = %self.name, error = %e, "failed to remove staged file");
        }
    }
}

/// Load a document into kernel space.
///
/// Each call stages under its own unique name, so loads never share
/// transient kernel state. The staged file is gone by the time this
/// returns. A document with no transferable roots loads as an empty solid.
#[instrument(skip(kernel, bytes), fields(bytes = bytes.len()))]
pub fn load(
    kernel: &mut dyn Kernel,
    identifier: &str,
    bytes: &[u8],
) -> Result<SolidHandle, LoadError> {
    let staged = StagedFile::stage(kernel, bytes).map_err(|e| {
        warn!(error = %e, "staging failed");
        LoadError {
            identifier: identifier.to_string(),
            status: ReadStatus::Void,
        }
    })?;

    let (status, document) = staged.kernel.read_document(&staged.name);
    if !status.is_done() {
        staged.kernel.close_document(document);
        warn!(%status, "document not read");
        return Err(LoadError {
            identifier: identifier.to_string(),
            status,
        });
    }

    let transfer = staged.kernel.transfer_roots(document).map_err(|e| {
        warn!(error = %e, "root transfer failed");
        LoadError {
            identifier: identifier.to_string(),
            status: ReadStatus::Error,
        }
    })?;

    if transfer.roots_transferred == 0 {
        debug!("document has no transferable roots");
    }
    info!(roots = transfer.roots_transferred, "loaded");
    Ok(transfer.solid)
}

/// [`load`] for a [`LoadRequest`].
pub fn load_request(kernel: &mut dyn Kernel, request: LoadRequest) -> Result<SolidHandle, LoadError> {
    load(kernel, &request.source_identifier, &request.raw_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shape_kernel::{MockKernel, MockShape};

    #[test]
    fn load_registered_document() {
        let mut kernel = MockKernel::new();
        kernel.register_document(b"cube".to_vec(), vec![MockShape::block([0.0; 3], [1.0; 3])]);

        let solid = load(&mut kernel, "cube.step", b"cube").unwrap();
        assert_eq!(kernel.volume_of(&solid).unwrap(), 1.0);
        assert!(kernel.staged_names().is_empty());
        assert_eq!(kernel.open_documents(), 0);
    }

    #[test]
    fn unreadable_bytes_report_status() {
        let mut kernel = MockKernel::new();
        let err = load(&mut kernel, "junk.step", b"junk").unwrap_err();
        assert_eq!(err.identifier, "junk.step");
        assert_eq!(err.status, ReadStatus::Fail);
        assert_eq!(err.status_code(), 3);
        assert_eq!(kernel.live_solids(), 0);
        assert_eq!(kernel.open_documents(), 0);
        assert!(kernel.staged_names().is_empty());
    }

    #[test]
    fn each_load_stages_under_a_fresh_name() {
        let mut kernel = MockKernel::new();
        kernel.register_document(b"cube".to_vec(), vec![MockShape::block([0.0; 3], [1.0; 3])]);

        let a = load(&mut kernel, "a", b"cube").unwrap();
        let b = load(&mut kernel, "b", b"cube").unwrap();
        let history = kernel.staging_history();
        assert_eq!(history.len(), 2);
        assert_ne!(history[0], history[1]);
        assert!(history.iter().all(|n| n.starts_with("stage-") && n.ends_with(".step")));
        kernel.release(a);
        kernel.release(b);
    }

    #[test]
    fn empty_document_loads_as_empty_solid() {
        let mut kernel = MockKernel::new();
        kernel.register_document(b"empty".to_vec(), Vec::new());

        let solid = load_request(&mut kernel, LoadRequest::new("empty.step", b"empty".to_vec())).unwrap();
        assert_eq!(kernel.volume_of(&solid).unwrap(), 0.0);
        assert_eq!(kernel.surface_area_of(&solid).unwrap(), 0.0);
    }
}

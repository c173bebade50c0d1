use crate::types::*;

/// Geometry kernel capability interface.
///
/// Passed explicitly into every pipeline invocation as `&mut dyn Kernel`.
/// Implemented by TruckKernel (wraps real truck) and MockKernel (deterministic test double).
pub trait Kernel {
    /// Write raw bytes into the kernel's working namespace under `name`.
    fn stage_file(&mut self, name: &str, bytes: &[u8]) -> Result<(), KernelError>;

    /// Remove a staged file. Removing a name that is not staged is not an error.
    fn remove_staged(&mut self, name: &str) -> Result<(), KernelError>;

    /// Run the exchange-document reader over a staged file.
    ///
    /// A document handle is always returned; only a `Done` document may be
    /// passed to [`Kernel::transfer_roots`], anything else must be closed.
    fn read_document(&mut self, name: &str) -> (ReadStatus, DocumentHandle);

    /// Discard a document without transferring it.
    fn close_document(&mut self, document: DocumentHandle);

    /// Transfer every readable top-level entity of a document into one composite solid.
    fn transfer_roots(&mut self, document: DocumentHandle) -> Result<RootTransfer, KernelError>;

    /// Volume enclosed by the solid's boundary.
    fn volume_of(&self, solid: &SolidHandle) -> Result<f64, KernelError>;

    /// Total area of the solid's boundary surfaces.
    fn surface_area_of(&self, solid: &SolidHandle) -> Result<f64, KernelError>;

    /// Axis-aligned bounds of the solid. Empty solids return [`BoundingBox::empty`].
    fn bounding_box(&self, solid: &SolidHandle) -> Result<BoundingBox, KernelError>;

    /// A rigidly displaced copy of the solid. The input is left untouched.
    fn translate(&mut self, solid: &SolidHandle, vector: [f64; 3])
        -> Result<SolidHandle, KernelError>;

    /// Boolean union (fuse) of two solids, built to completion before returning.
    fn boolean_union(
        &mut self,
        a: &SolidHandle,
        b: &SolidHandle,
    ) -> Result<BooleanBuild, KernelError>;

    /// Tessellate a solid to a triangle mesh.
    fn tessellate(&self, solid: &SolidHandle, tolerance: f64) -> Result<RenderMesh, KernelError>;

    /// Destroy a solid. The handle is consumed.
    fn release(&mut self, solid: SolidHandle);
}

/// Staged names are plain file names inside the kernel's working area.
pub(crate) fn validate_staged_name(name: &str) -> Result<(), KernelError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(|c: char| c == '/' || c == '\\' || c == '\0');
    if invalid {
        return Err(KernelError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

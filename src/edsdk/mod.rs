//! Seam over the Canon EDSDK.
//!
//! The tool never calls the vendor library directly; everything goes through
//! the [`CameraSdk`] trait. [`dynamic::DynamicSdk`] resolves the real entry
//! points out of the EDSDK dynamic library at runtime, and [`mock::MockSdk`]
//! is a scripted in-memory stand-in for tests and cameraless development.
//!
//! Calls keep the C API's shape: a status code plus an out-value. Policy
//! (fail fast vs. log and continue) lives one layer up in the session, not
//! here.

pub mod dynamic;
pub mod mock;
pub mod status;

use std::path::Path;

pub use status::EdsStatus;

// Property IDs from EDSDKTypes.h.
pub const PROP_IMAGE_QUALITY: u32 = 0x0000_0100;
pub const PROP_ISO_SPEED: u32 = 0x0000_0402;
pub const PROP_AV: u32 = 0x0000_0405;
pub const PROP_TV: u32 = 0x0000_0406;
pub const PROP_EVF_OUTPUT_DEVICE: u32 = 0x0000_0500;

/// EVF output routed nowhere (camera default).
pub const EVF_OUTPUT_DEVICE_OFF: u32 = 0;
/// EVF output routed to the host computer.
pub const EVF_OUTPUT_DEVICE_PC: u32 = 2;

pub const CMD_TAKE_PICTURE: u32 = 0;

/// kEdsImageQuality_LR: RAW, large.
pub const IMAGE_QUALITY_RAW_LARGE: u32 = 0x0064_FF0F;

// EdsCreateFileStream arguments.
pub const FILE_CREATE_ALWAYS: u32 = 1;
pub const ACCESS_READ_WRITE: u32 = 2;

/// Opaque reference to an SDK object (camera, stream, directory item, ...).
///
/// A plain value copy of the underlying pointer; ownership bookkeeping is
/// done by [`crate::session::Handle`], not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdsRef(pub u64);

impl EdsRef {
    pub const NULL: EdsRef = EdsRef(0);

    #[must_use]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Metadata for one entry of the camera's storage tree.
#[derive(Debug, Clone, Default)]
pub struct DirItemInfo {
    pub name: String,
    pub is_folder: bool,
    pub size: u64,
}

/// The slice of the EDSDK this tool uses.
///
/// Methods mirror the C entry points one to one: the status comes back
/// verbatim and out-parameters become the second tuple element (a null ref /
/// zero / empty value when the call failed).
pub trait CameraSdk {
    fn initialize(&self) -> EdsStatus;
    fn terminate(&self) -> EdsStatus;

    fn camera_list(&self) -> (EdsStatus, EdsRef);
    fn child_count(&self, parent: EdsRef) -> (EdsStatus, u32);
    fn child_at(&self, parent: EdsRef, index: u32) -> (EdsStatus, EdsRef);
    fn device_name(&self, camera: EdsRef) -> (EdsStatus, String);
    fn release(&self, object: EdsRef) -> EdsStatus;

    fn open_session(&self, camera: EdsRef) -> EdsStatus;
    fn close_session(&self, camera: EdsRef) -> EdsStatus;

    /// Read a 32-bit property value.
    fn get_property(&self, object: EdsRef, prop: u32) -> (EdsStatus, u32);
    /// Write a 32-bit property value.
    fn set_property(&self, object: EdsRef, prop: u32, value: u32) -> EdsStatus;

    fn create_memory_stream(&self, capacity: u64) -> (EdsStatus, EdsRef);
    fn create_file_stream(
        &self,
        path: &Path,
        disposition: u32,
        access: u32,
    ) -> (EdsStatus, EdsRef);

    fn create_evf_image(&self, stream: EdsRef) -> (EdsStatus, EdsRef);
    fn download_evf_image(&self, camera: EdsRef, image: EdsRef) -> EdsStatus;
    /// Base pointer of a memory stream's buffer. The SDK owns the bytes; the
    /// pointer stays valid until the stream is released.
    fn stream_pointer(&self, stream: EdsRef) -> (EdsStatus, *const u8);
    fn stream_length(&self, stream: EdsRef) -> (EdsStatus, u64);

    fn dir_item_info(&self, item: EdsRef) -> (EdsStatus, DirItemInfo);
    fn download(&self, item: EdsRef, size: u64, stream: EdsRef) -> EdsStatus;
    fn download_complete(&self, item: EdsRef) -> EdsStatus;
    fn delete_dir_item(&self, item: EdsRef) -> EdsStatus;

    fn send_command(&self, camera: EdsRef, command: u32, param: i32) -> EdsStatus;
}

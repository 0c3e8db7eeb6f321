//! Production [`CameraSdk`] backend over the real EDSDK dynamic library.
//!
//! The vendor ships EDSDK as a plain dynamic library, so the entry points are
//! resolved at runtime with `libloading` instead of linking against an import
//! library. A symbol that fails to resolve is reported as
//! `EDS_ERR_NOT_SUPPORTED` rather than aborting, which keeps the session's
//! error policy in charge.

use std::ffi::{c_char, c_void, CString};
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use log::error;

use super::status::EdsStatus;
use super::{CameraSdk, DirItemInfo, EdsRef};

/// EDSDK_MAX_NAME.
const MAX_NAME: usize = 256;

#[repr(C)]
struct EdsDeviceInfo {
    sz_port_name: [c_char; MAX_NAME],
    sz_device_description: [c_char; MAX_NAME],
    device_sub_type: u32,
    reserved: u32,
}

#[repr(C)]
struct EdsDirectoryItemInfo {
    size: u64,
    is_folder: i32,
    group_id: u32,
    option: u32,
    sz_file_name: [c_char; MAX_NAME],
    format: u32,
    date_time: u32,
}

/// Default library file name for the current platform.
#[must_use]
pub fn default_library_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "EDSDK.dll"
    } else if cfg!(target_os = "macos") {
        "libEDSDK.dylib"
    } else {
        "libEDSDK.so"
    }
}

/// `CameraSdk` implementation backed by the loaded EDSDK library.
pub struct DynamicSdk {
    lib: Library,
    path: PathBuf,
}

impl DynamicSdk {
    /// Load the EDSDK library from `path`.
    pub fn load(path: &Path) -> Result<Self, libloading::Error> {
        let lib = unsafe { Library::new(path) }?;
        Ok(Self {
            lib,
            path: path.to_path_buf(),
        })
    }

    /// Path the library was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve `name`, logging a miss once per call site.
    unsafe fn sym<T>(&self, name: &'static [u8]) -> Option<Symbol<'_, T>> {
        match self.lib.get(name) {
            Ok(sym) => Some(sym),
            Err(e) => {
                error!(
                    "EDSDK symbol {} missing from {}: {e}",
                    String::from_utf8_lossy(&name[..name.len() - 1]),
                    self.path.display()
                );
                None
            }
        }
    }
}

fn name_field(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn to_ref(ptr: *mut c_void) -> EdsRef {
    EdsRef(ptr as usize as u64)
}

fn from_ref(r: EdsRef) -> *mut c_void {
    r.0 as usize as *mut c_void
}

impl CameraSdk for DynamicSdk {
    fn initialize(&self) -> EdsStatus {
        unsafe {
            match self.sym::<unsafe extern "system" fn() -> u32>(b"EdsInitializeSDK\0") {
                Some(f) => EdsStatus(f()),
                None => EdsStatus::NOT_SUPPORTED,
            }
        }
    }

    fn terminate(&self) -> EdsStatus {
        unsafe {
            match self.sym::<unsafe extern "system" fn() -> u32>(b"EdsTerminateSDK\0") {
                Some(f) => EdsStatus(f()),
                None => EdsStatus::NOT_SUPPORTED,
            }
        }
    }

    fn camera_list(&self) -> (EdsStatus, EdsRef) {
        unsafe {
            let Some(f) = self
                .sym::<unsafe extern "system" fn(*mut *mut c_void) -> u32>(b"EdsGetCameraList\0")
            else {
                return (EdsStatus::NOT_SUPPORTED, EdsRef::NULL);
            };
            let mut out: *mut c_void = std::ptr::null_mut();
            let status = EdsStatus(f(&mut out));
            (status, to_ref(out))
        }
    }

    fn child_count(&self, parent: EdsRef) -> (EdsStatus, u32) {
        unsafe {
            let Some(f) = self
                .sym::<unsafe extern "system" fn(*mut c_void, *mut u32) -> u32>(
                    b"EdsGetChildCount\0",
                )
            else {
                return (EdsStatus::NOT_SUPPORTED, 0);
            };
            let mut count: u32 = 0;
            let status = EdsStatus(f(from_ref(parent), &mut count));
            (status, count)
        }
    }

    fn child_at(&self, parent: EdsRef, index: u32) -> (EdsStatus, EdsRef) {
        unsafe {
            let Some(f) = self
                .sym::<unsafe extern "system" fn(*mut c_void, i32, *mut *mut c_void) -> u32>(
                    b"EdsGetChildAtIndex\0",
                )
            else {
                return (EdsStatus::NOT_SUPPORTED, EdsRef::NULL);
            };
            let mut out: *mut c_void = std::ptr::null_mut();
            let status = EdsStatus(f(from_ref(parent), index as i32, &mut out));
            (status, to_ref(out))
        }
    }

    fn device_name(&self, camera: EdsRef) -> (EdsStatus, String) {
        unsafe {
            let Some(f) = self
                .sym::<unsafe extern "system" fn(*mut c_void, *mut EdsDeviceInfo) -> u32>(
                    b"EdsGetDeviceInfo\0",
                )
            else {
                return (EdsStatus::NOT_SUPPORTED, String::new());
            };
            let mut info: EdsDeviceInfo = std::mem::zeroed();
            let status = EdsStatus(f(from_ref(camera), &mut info));
            (status, name_field(&info.sz_device_description))
        }
    }

    fn release(&self, object: EdsRef) -> EdsStatus {
        unsafe {
            let Some(f) =
                self.sym::<unsafe extern "system" fn(*mut c_void) -> u32>(b"EdsRelease\0")
            else {
                return EdsStatus::NOT_SUPPORTED;
            };
            // EdsRelease returns the remaining reference count, or
            // 0xFFFFFFFF on failure.
            if f(from_ref(object)) == u32::MAX {
                EdsStatus::INTERNAL_ERROR
            } else {
                EdsStatus::OK
            }
        }
    }

    fn open_session(&self, camera: EdsRef) -> EdsStatus {
        unsafe {
            match self.sym::<unsafe extern "system" fn(*mut c_void) -> u32>(b"EdsOpenSession\0") {
                Some(f) => EdsStatus(f(from_ref(camera))),
                None => EdsStatus::NOT_SUPPORTED,
            }
        }
    }

    fn close_session(&self, camera: EdsRef) -> EdsStatus {
        unsafe {
            match self.sym::<unsafe extern "system" fn(*mut c_void) -> u32>(b"EdsCloseSession\0") {
                Some(f) => EdsStatus(f(from_ref(camera))),
                None => EdsStatus::NOT_SUPPORTED,
            }
        }
    }

    fn get_property(&self, object: EdsRef, prop: u32) -> (EdsStatus, u32) {
        unsafe {
            let Some(f) = self
                .sym::<unsafe extern "system" fn(*mut c_void, u32, i32, u32, *mut c_void) -> u32>(
                    b"EdsGetPropertyData\0",
                )
            else {
                return (EdsStatus::NOT_SUPPORTED, 0);
            };
            let mut value: u32 = 0;
            let status = EdsStatus(f(
                from_ref(object),
                prop,
                0,
                std::mem::size_of::<u32>() as u32,
                (&mut value as *mut u32).cast(),
            ));
            (status, value)
        }
    }

    fn set_property(&self, object: EdsRef, prop: u32, value: u32) -> EdsStatus {
        unsafe {
            let Some(f) = self
                .sym::<unsafe extern "system" fn(*mut c_void, u32, i32, u32, *const c_void) -> u32>(
                    b"EdsSetPropertyData\0",
                )
            else {
                return EdsStatus::NOT_SUPPORTED;
            };
            EdsStatus(f(
                from_ref(object),
                prop,
                0,
                std::mem::size_of::<u32>() as u32,
                (&value as *const u32).cast(),
            ))
        }
    }

    fn create_memory_stream(&self, capacity: u64) -> (EdsStatus, EdsRef) {
        unsafe {
            let Some(f) = self
                .sym::<unsafe extern "system" fn(u64, *mut *mut c_void) -> u32>(
                    b"EdsCreateMemoryStream\0",
                )
            else {
                return (EdsStatus::NOT_SUPPORTED, EdsRef::NULL);
            };
            let mut out: *mut c_void = std::ptr::null_mut();
            let status = EdsStatus(f(capacity, &mut out));
            (status, to_ref(out))
        }
    }

    fn create_file_stream(
        &self,
        path: &Path,
        disposition: u32,
        access: u32,
    ) -> (EdsStatus, EdsRef) {
        let Ok(c_path) = CString::new(path.to_string_lossy().as_bytes()) else {
            return (EdsStatus::FILE_OPEN_ERROR, EdsRef::NULL);
        };
        unsafe {
            let Some(f) = self
                .sym::<unsafe extern "system" fn(*const c_char, u32, u32, *mut *mut c_void) -> u32>(
                    b"EdsCreateFileStream\0",
                )
            else {
                return (EdsStatus::NOT_SUPPORTED, EdsRef::NULL);
            };
            let mut out: *mut c_void = std::ptr::null_mut();
            let status = EdsStatus(f(c_path.as_ptr(), disposition, access, &mut out));
            (status, to_ref(out))
        }
    }

    fn create_evf_image(&self, stream: EdsRef) -> (EdsStatus, EdsRef) {
        unsafe {
            let Some(f) = self
                .sym::<unsafe extern "system" fn(*mut c_void, *mut *mut c_void) -> u32>(
                    b"EdsCreateEvfImageRef\0",
                )
            else {
                return (EdsStatus::NOT_SUPPORTED, EdsRef::NULL);
            };
            let mut out: *mut c_void = std::ptr::null_mut();
            let status = EdsStatus(f(from_ref(stream), &mut out));
            (status, to_ref(out))
        }
    }

    fn download_evf_image(&self, camera: EdsRef, image: EdsRef) -> EdsStatus {
        unsafe {
            match self.sym::<unsafe extern "system" fn(*mut c_void, *mut c_void) -> u32>(
                b"EdsDownloadEvfImage\0",
            ) {
                Some(f) => EdsStatus(f(from_ref(camera), from_ref(image))),
                None => EdsStatus::NOT_SUPPORTED,
            }
        }
    }

    fn stream_pointer(&self, stream: EdsRef) -> (EdsStatus, *const u8) {
        unsafe {
            let Some(f) = self
                .sym::<unsafe extern "system" fn(*mut c_void, *mut *mut c_void) -> u32>(
                    b"EdsGetPointer\0",
                )
            else {
                return (EdsStatus::NOT_SUPPORTED, std::ptr::null());
            };
            let mut out: *mut c_void = std::ptr::null_mut();
            let status = EdsStatus(f(from_ref(stream), &mut out));
            (status, out as *const u8)
        }
    }

    fn stream_length(&self, stream: EdsRef) -> (EdsStatus, u64) {
        unsafe {
            let Some(f) = self
                .sym::<unsafe extern "system" fn(*mut c_void, *mut u64) -> u32>(b"EdsGetLength\0")
            else {
                return (EdsStatus::NOT_SUPPORTED, 0);
            };
            let mut len: u64 = 0;
            let status = EdsStatus(f(from_ref(stream), &mut len));
            (status, len)
        }
    }

    fn dir_item_info(&self, item: EdsRef) -> (EdsStatus, DirItemInfo) {
        unsafe {
            let Some(f) = self
                .sym::<unsafe extern "system" fn(*mut c_void, *mut EdsDirectoryItemInfo) -> u32>(
                    b"EdsGetDirectoryItemInfo\0",
                )
            else {
                return (EdsStatus::NOT_SUPPORTED, DirItemInfo::default());
            };
            let mut info: EdsDirectoryItemInfo = std::mem::zeroed();
            let status = EdsStatus(f(from_ref(item), &mut info));
            let out = DirItemInfo {
                name: name_field(&info.sz_file_name),
                is_folder: info.is_folder != 0,
                size: info.size,
            };
            (status, out)
        }
    }

    fn download(&self, item: EdsRef, size: u64, stream: EdsRef) -> EdsStatus {
        unsafe {
            match self.sym::<unsafe extern "system" fn(*mut c_void, u64, *mut c_void) -> u32>(
                b"EdsDownload\0",
            ) {
                Some(f) => EdsStatus(f(from_ref(item), size, from_ref(stream))),
                None => EdsStatus::NOT_SUPPORTED,
            }
        }
    }

    fn download_complete(&self, item: EdsRef) -> EdsStatus {
        unsafe {
            match self
                .sym::<unsafe extern "system" fn(*mut c_void) -> u32>(b"EdsDownloadComplete\0")
            {
                Some(f) => EdsStatus(f(from_ref(item))),
                None => EdsStatus::NOT_SUPPORTED,
            }
        }
    }

    fn delete_dir_item(&self, item: EdsRef) -> EdsStatus {
        unsafe {
            match self
                .sym::<unsafe extern "system" fn(*mut c_void) -> u32>(b"EdsDeleteDirectoryItem\0")
            {
                Some(f) => EdsStatus(f(from_ref(item))),
                None => EdsStatus::NOT_SUPPORTED,
            }
        }
    }

    fn send_command(&self, camera: EdsRef, command: u32, param: i32) -> EdsStatus {
        unsafe {
            match self.sym::<unsafe extern "system" fn(*mut c_void, u32, i32) -> u32>(
                b"EdsSendCommand\0",
            ) {
                Some(f) => EdsStatus(f(from_ref(camera), command, param)),
                None => EdsStatus::NOT_SUPPORTED,
            }
        }
    }
}

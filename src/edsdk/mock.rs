//! Scripted in-memory [`CameraSdk`] for tests and cameraless development.
//!
//! The mock keeps a little object tree (camera list, camera, volumes, folders,
//! files), a property store, and a call log. Individual entry points can be
//! scripted to fail so teardown and error-policy behavior is testable.
//! Downloading a remote file writes a real local file through the file-stream
//! path, which lets the verify-before-delete ordering be asserted against the
//! actual filesystem.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use super::status::EdsStatus;
use super::{CameraSdk, DirItemInfo, EdsRef};
use crate::session::Clock;

const CAMERA_LIST: u64 = 1;
const CAMERA: u64 = 2;

#[derive(Debug)]
enum Object {
    Folder { name: String, children: Vec<u64> },
    File { name: String, data: Vec<u8> },
    MemoryStream { buf: Box<[u8]> },
    FileStream { path: PathBuf },
    EvfImage { stream: u64 },
}

#[derive(Default)]
struct State {
    next_id: u64,
    objects: HashMap<u64, Object>,
    volumes: Vec<u64>,
    camera_count: u32,
    device_name: String,
    props: HashMap<u32, u32>,
    frame: Vec<u8>,
    fail: HashMap<&'static str, EdsStatus>,
    calls: Vec<&'static str>,
    set_calls: Vec<(u32, u32)>,
    released: Vec<EdsRef>,
    deleted: Vec<String>,
    local_writes: bool,
}

/// Scripted EDSDK stand-in.
pub struct MockSdk {
    state: RefCell<State>,
}

impl Default for MockSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSdk {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                next_id: 3,
                camera_count: 1,
                device_name: "Canon EOS DIGITAL REBEL XSi".to_owned(),
                local_writes: true,
                ..State::default()
            }),
        }
    }

    /// Preload a property value (e.g. the EVF output device).
    #[must_use]
    pub fn with_prop(self, prop: u32, value: u32) -> Self {
        self.state.borrow_mut().props.insert(prop, value);
        self
    }

    /// Bytes delivered by every EVF download.
    #[must_use]
    pub fn with_frame(self, bytes: Vec<u8>) -> Self {
        self.state.borrow_mut().frame = bytes;
        self
    }

    #[must_use]
    pub fn with_device_name(self, name: &str) -> Self {
        self.state.borrow_mut().device_name = name.to_owned();
        self
    }

    /// Number of attached bodies reported by the camera list.
    #[must_use]
    pub fn with_camera_count(self, count: u32) -> Self {
        self.state.borrow_mut().camera_count = count;
        self
    }

    /// Script `call` to return `status` every time it is entered.
    #[must_use]
    pub fn with_failure(self, call: &'static str, status: EdsStatus) -> Self {
        self.state.borrow_mut().fail.insert(call, status);
        self
    }

    /// Make `EdsDownload` succeed without producing the local file, as a
    /// silently-broken transfer would.
    #[must_use]
    pub fn with_local_writes_disabled(self) -> Self {
        self.state.borrow_mut().local_writes = false;
        self
    }

    fn insert(&self, object: Object) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.objects.insert(id, object);
        id
    }

    /// Add a storage volume under the camera.
    pub fn add_volume(&self) -> EdsRef {
        let id = self.insert(Object::Folder {
            name: String::new(),
            children: Vec::new(),
        });
        self.state.borrow_mut().volumes.push(id);
        EdsRef(id)
    }

    pub fn add_folder(&self, parent: EdsRef, name: &str) -> EdsRef {
        let id = self.insert(Object::Folder {
            name: name.to_owned(),
            children: Vec::new(),
        });
        self.attach(parent, id);
        EdsRef(id)
    }

    pub fn add_file(&self, parent: EdsRef, name: &str, data: &[u8]) -> EdsRef {
        let id = self.insert(Object::File {
            name: name.to_owned(),
            data: data.to_vec(),
        });
        self.attach(parent, id);
        EdsRef(id)
    }

    fn attach(&self, parent: EdsRef, child: u64) {
        let mut state = self.state.borrow_mut();
        if let Some(Object::Folder { children, .. }) = state.objects.get_mut(&parent.0) {
            children.push(child);
        }
    }

    /// Replace the scripted EVF frame.
    pub fn set_frame(&self, bytes: Vec<u8>) {
        self.state.borrow_mut().frame = bytes;
    }

    // Inspection hooks for tests.

    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.borrow().calls.clone()
    }

    #[must_use]
    pub fn call_count(&self, name: &str) -> usize {
        self.state.borrow().calls.iter().filter(|c| **c == name).count()
    }

    #[must_use]
    pub fn released(&self) -> Vec<EdsRef> {
        self.state.borrow().released.clone()
    }

    #[must_use]
    pub fn release_count(&self, object: EdsRef) -> usize {
        self.state
            .borrow()
            .released
            .iter()
            .filter(|r| **r == object)
            .count()
    }

    /// `(property, value)` pairs in the order they were written.
    #[must_use]
    pub fn set_calls(&self) -> Vec<(u32, u32)> {
        self.state.borrow().set_calls.clone()
    }

    #[must_use]
    pub fn prop(&self, prop: u32) -> Option<u32> {
        self.state.borrow().props.get(&prop).copied()
    }

    /// Remote file names deleted so far.
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.state.borrow().deleted.clone()
    }

    /// Record the call and return its scripted status (OK by default).
    fn enter(&self, call: &'static str) -> EdsStatus {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        state.fail.get(call).copied().unwrap_or(EdsStatus::OK)
    }
}

impl CameraSdk for MockSdk {
    fn initialize(&self) -> EdsStatus {
        self.enter("EdsInitializeSDK")
    }

    fn terminate(&self) -> EdsStatus {
        self.enter("EdsTerminateSDK")
    }

    fn camera_list(&self) -> (EdsStatus, EdsRef) {
        let status = self.enter("EdsGetCameraList");
        if !status.is_ok() {
            return (status, EdsRef::NULL);
        }
        (EdsStatus::OK, EdsRef(CAMERA_LIST))
    }

    fn child_count(&self, parent: EdsRef) -> (EdsStatus, u32) {
        let status = self.enter("EdsGetChildCount");
        if !status.is_ok() {
            return (status, 0);
        }
        let state = self.state.borrow();
        let count = match parent.0 {
            CAMERA_LIST => state.camera_count,
            CAMERA => state.volumes.len() as u32,
            id => match state.objects.get(&id) {
                Some(Object::Folder { children, .. }) => children.len() as u32,
                _ => 0,
            },
        };
        (EdsStatus::OK, count)
    }

    fn child_at(&self, parent: EdsRef, index: u32) -> (EdsStatus, EdsRef) {
        let status = self.enter("EdsGetChildAtIndex");
        if !status.is_ok() {
            return (status, EdsRef::NULL);
        }
        let state = self.state.borrow();
        let child = match parent.0 {
            CAMERA_LIST => (index < state.camera_count).then_some(CAMERA),
            CAMERA => state.volumes.get(index as usize).copied(),
            id => match state.objects.get(&id) {
                Some(Object::Folder { children, .. }) => children.get(index as usize).copied(),
                _ => None,
            },
        };
        match child {
            Some(id) => (EdsStatus::OK, EdsRef(id)),
            None => (EdsStatus(0x0000_0042), EdsRef::NULL),
        }
    }

    fn device_name(&self, _camera: EdsRef) -> (EdsStatus, String) {
        let status = self.enter("EdsGetDeviceInfo");
        if !status.is_ok() {
            return (status, String::new());
        }
        (EdsStatus::OK, self.state.borrow().device_name.clone())
    }

    fn release(&self, object: EdsRef) -> EdsStatus {
        let status = self.enter("EdsRelease");
        if !status.is_ok() {
            return status;
        }
        self.state.borrow_mut().released.push(object);
        EdsStatus::OK
    }

    fn open_session(&self, _camera: EdsRef) -> EdsStatus {
        self.enter("EdsOpenSession")
    }

    fn close_session(&self, _camera: EdsRef) -> EdsStatus {
        self.enter("EdsCloseSession")
    }

    fn get_property(&self, _object: EdsRef, prop: u32) -> (EdsStatus, u32) {
        let status = self.enter("EdsGetPropertyData");
        if !status.is_ok() {
            return (status, 0);
        }
        match self.state.borrow().props.get(&prop) {
            Some(&value) => (EdsStatus::OK, value),
            None => (EdsStatus::PROPERTIES_UNAVAILABLE, 0),
        }
    }

    fn set_property(&self, _object: EdsRef, prop: u32, value: u32) -> EdsStatus {
        let status = self.enter("EdsSetPropertyData");
        if !status.is_ok() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        state.set_calls.push((prop, value));
        state.props.insert(prop, value);
        EdsStatus::OK
    }

    fn create_memory_stream(&self, capacity: u64) -> (EdsStatus, EdsRef) {
        let status = self.enter("EdsCreateMemoryStream");
        if !status.is_ok() {
            return (status, EdsRef::NULL);
        }
        let id = self.insert(Object::MemoryStream {
            buf: vec![0u8; capacity as usize].into_boxed_slice(),
        });
        (EdsStatus::OK, EdsRef(id))
    }

    fn create_file_stream(
        &self,
        path: &Path,
        _disposition: u32,
        _access: u32,
    ) -> (EdsStatus, EdsRef) {
        let status = self.enter("EdsCreateFileStream");
        if !status.is_ok() {
            return (status, EdsRef::NULL);
        }
        let id = self.insert(Object::FileStream {
            path: path.to_path_buf(),
        });
        (EdsStatus::OK, EdsRef(id))
    }

    fn create_evf_image(&self, stream: EdsRef) -> (EdsStatus, EdsRef) {
        let status = self.enter("EdsCreateEvfImageRef");
        if !status.is_ok() {
            return (status, EdsRef::NULL);
        }
        let id = self.insert(Object::EvfImage { stream: stream.0 });
        (EdsStatus::OK, EdsRef(id))
    }

    fn download_evf_image(&self, _camera: EdsRef, image: EdsRef) -> EdsStatus {
        let status = self.enter("EdsDownloadEvfImage");
        if !status.is_ok() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        let frame = state.frame.clone();
        let stream = match state.objects.get(&image.0) {
            Some(Object::EvfImage { stream }) => *stream,
            _ => return EdsStatus::INTERNAL_ERROR,
        };
        match state.objects.get_mut(&stream) {
            Some(Object::MemoryStream { buf }) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                EdsStatus::OK
            }
            _ => EdsStatus::INTERNAL_ERROR,
        }
    }

    fn stream_pointer(&self, stream: EdsRef) -> (EdsStatus, *const u8) {
        let status = self.enter("EdsGetPointer");
        if !status.is_ok() {
            return (status, std::ptr::null());
        }
        match self.state.borrow().objects.get(&stream.0) {
            Some(Object::MemoryStream { buf }) => (EdsStatus::OK, buf.as_ptr()),
            _ => (EdsStatus::INTERNAL_ERROR, std::ptr::null()),
        }
    }

    fn stream_length(&self, stream: EdsRef) -> (EdsStatus, u64) {
        let status = self.enter("EdsGetLength");
        if !status.is_ok() {
            return (status, 0);
        }
        match self.state.borrow().objects.get(&stream.0) {
            Some(Object::MemoryStream { buf }) => (EdsStatus::OK, buf.len() as u64),
            _ => (EdsStatus::INTERNAL_ERROR, 0),
        }
    }

    fn dir_item_info(&self, item: EdsRef) -> (EdsStatus, DirItemInfo) {
        let status = self.enter("EdsGetDirectoryItemInfo");
        if !status.is_ok() {
            return (status, DirItemInfo::default());
        }
        let state = self.state.borrow();
        match state.objects.get(&item.0) {
            Some(Object::Folder { name, .. }) => (
                EdsStatus::OK,
                DirItemInfo {
                    name: name.clone(),
                    is_folder: true,
                    size: 0,
                },
            ),
            Some(Object::File { name, data }) => (
                EdsStatus::OK,
                DirItemInfo {
                    name: name.clone(),
                    is_folder: false,
                    size: data.len() as u64,
                },
            ),
            _ => (EdsStatus::INTERNAL_ERROR, DirItemInfo::default()),
        }
    }

    fn download(&self, item: EdsRef, _size: u64, stream: EdsRef) -> EdsStatus {
        let status = self.enter("EdsDownload");
        if !status.is_ok() {
            return status;
        }
        let state = self.state.borrow();
        if !state.local_writes {
            return EdsStatus::OK;
        }
        let data = match state.objects.get(&item.0) {
            Some(Object::File { data, .. }) => data.clone(),
            _ => return EdsStatus::INTERNAL_ERROR,
        };
        let path = match state.objects.get(&stream.0) {
            Some(Object::FileStream { path }) => path.clone(),
            _ => return EdsStatus::INTERNAL_ERROR,
        };
        drop(state);
        match std::fs::write(&path, data) {
            Ok(()) => EdsStatus::OK,
            Err(_) => EdsStatus(0x0000_0020),
        }
    }

    fn download_complete(&self, _item: EdsRef) -> EdsStatus {
        self.enter("EdsDownloadComplete")
    }

    fn delete_dir_item(&self, item: EdsRef) -> EdsStatus {
        let status = self.enter("EdsDeleteDirectoryItem");
        if !status.is_ok() {
            return status;
        }
        let mut state = self.state.borrow_mut();
        let name = match state.objects.get(&item.0) {
            Some(Object::File { name, .. }) => name.clone(),
            Some(Object::Folder { name, .. }) => name.clone(),
            _ => return EdsStatus::INTERNAL_ERROR,
        };
        state.deleted.push(name);
        EdsStatus::OK
    }

    fn send_command(&self, _camera: EdsRef, _command: u32, _param: i32) -> EdsStatus {
        self.enter("EdsSendCommand")
    }
}

/// Clock that records sleeps instead of blocking. Clones share the log.
#[derive(Clone, Default)]
pub struct FakeClock {
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl FakeClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edsdk::PROP_ISO_SPEED;

    #[test]
    fn test_camera_list_reports_one_body() {
        let sdk = MockSdk::new();
        let (status, list) = sdk.camera_list();
        assert!(status.is_ok());
        let (status, count) = sdk.child_count(list);
        assert!(status.is_ok());
        assert_eq!(count, 1);
    }

    #[test]
    fn test_camera_count_zero() {
        let sdk = MockSdk::new().with_camera_count(0);
        let (_, list) = sdk.camera_list();
        let (_, count) = sdk.child_count(list);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_scripted_failure() {
        let sdk = MockSdk::new().with_failure("EdsOpenSession", EdsStatus::DEVICE_BUSY);
        let (_, list) = sdk.camera_list();
        let (_, camera) = sdk.child_at(list, 0);
        assert_eq!(sdk.open_session(camera), EdsStatus::DEVICE_BUSY);
    }

    #[test]
    fn test_property_round_trip() {
        let sdk = MockSdk::new().with_prop(PROP_ISO_SPEED, 0x48);
        let (_, list) = sdk.camera_list();
        let (_, camera) = sdk.child_at(list, 0);
        let (status, value) = sdk.get_property(camera, PROP_ISO_SPEED);
        assert!(status.is_ok());
        assert_eq!(value, 0x48);

        assert!(sdk.set_property(camera, PROP_ISO_SPEED, 0x50).is_ok());
        assert_eq!(sdk.prop(PROP_ISO_SPEED), Some(0x50));
        assert_eq!(sdk.set_calls(), vec![(PROP_ISO_SPEED, 0x50)]);
    }

    #[test]
    fn test_unknown_property_unavailable() {
        let sdk = MockSdk::new();
        let (_, list) = sdk.camera_list();
        let (_, camera) = sdk.child_at(list, 0);
        let (status, _) = sdk.get_property(camera, 0x9999);
        assert_eq!(status, EdsStatus::PROPERTIES_UNAVAILABLE);
    }

    #[test]
    fn test_evf_download_fills_stream() {
        let sdk = MockSdk::new().with_frame(vec![0xAA, 0xBB, 0xCC]);
        let (_, stream) = sdk.create_memory_stream(8);
        let (_, image) = sdk.create_evf_image(stream);
        assert!(sdk.download_evf_image(EdsRef(CAMERA), image).is_ok());

        let (_, ptr) = sdk.stream_pointer(stream);
        let (_, len) = sdk.stream_length(stream);
        assert_eq!(len, 8);
        let bytes = unsafe { std::slice::from_raw_parts(ptr, len as usize) };
        assert_eq!(&bytes[..3], &[0xAA, 0xBB, 0xCC]);
        assert_eq!(bytes[3], 0);
    }

    #[test]
    fn test_remote_tree_walk() {
        let sdk = MockSdk::new();
        let volume = sdk.add_volume();
        let dcim = sdk.add_folder(volume, "DCIM");
        sdk.add_file(dcim, "IMG_0001.CR2", b"raw");

        let (_, count) = sdk.child_count(volume);
        assert_eq!(count, 1);
        let (_, item) = sdk.child_at(volume, 0);
        let (_, info) = sdk.dir_item_info(item);
        assert!(info.is_folder);
        assert_eq!(info.name, "DCIM");

        let (_, file) = sdk.child_at(item, 0);
        let (_, info) = sdk.dir_item_info(file);
        assert!(!info.is_folder);
        assert_eq!(info.size, 3);
    }

    #[test]
    fn test_fake_clock_records() {
        let clock = FakeClock::new();
        let handle = clock.clone();
        clock.sleep(Duration::from_secs(2));
        assert_eq!(handle.sleeps(), vec![Duration::from_secs(2)]);
    }
}

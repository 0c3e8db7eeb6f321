//! Session lifecycle management for the camera connection.
//!
//! One [`Session`] owns the single SDK connection for the process lifetime:
//! runtime init, camera selection, live-view output routing, the reusable
//! preview stream, and the teardown sequence. Teardown always attempts every
//! remaining step and aggregates failures instead of aborting mid-sequence.

use std::time::Duration;

use log::{debug, error, warn};

use crate::edsdk::{
    CameraSdk, EdsRef, EdsStatus, EVF_OUTPUT_DEVICE_OFF, EVF_OUTPUT_DEVICE_PC, PROP_AV,
    PROP_EVF_OUTPUT_DEVICE, PROP_ISO_SPEED, PROP_TV,
};
use crate::exposure::ExposureState;

/// Errors surfaced by the camera pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CamError {
    #[error("{call} failed: {status}")]
    Sdk { call: &'static str, status: EdsStatus },
    #[error("no camera attached")]
    NoCamera,
    #[error("session not initialized")]
    NotInitialized,
    #[error("teardown incomplete: {}", .failures.join("; "))]
    Teardown { failures: Vec<String> },
    #[error("DCIM folder not found on camera ({})", EdsStatus::DIR_NOT_FOUND)]
    DcimNotFound,
    #[error("no image found on camera ({})", EdsStatus::FILE_NOT_FOUND)]
    NoImageFound,
    #[error("no decodable preview frame arrived")]
    NoPreviewFrame,
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("display error: {0}")]
    Display(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What to do when an SDK call reports a non-zero status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Abort the operation (process exits non-zero). The default.
    FailFast,
    /// Log and keep going with whatever state is left; for poking at a
    /// half-broken setup under `--debug`.
    Continue,
}

/// Sleep seam so settle/capture waits are observable under test.
pub trait Clock {
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation.
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Ownership-tagged SDK handle. Acquire and release are one-shot; a released
/// handle cannot be released again by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handle {
    #[default]
    Unacquired,
    Active(EdsRef),
    Released,
}

impl Handle {
    pub fn acquire(&mut self, object: EdsRef) {
        *self = Handle::Active(object);
    }

    /// The live reference, if any. A null ref counts as absent, matching the
    /// SDK's out-parameter convention on failure.
    #[must_use]
    pub fn get(&self) -> Option<EdsRef> {
        match self {
            Handle::Active(object) if !object.is_null() => Some(*object),
            _ => None,
        }
    }

    /// Move to `Released`, handing out the reference exactly once.
    pub fn take(&mut self) -> Option<EdsRef> {
        let out = self.get();
        if matches!(self, Handle::Active(_)) {
            *self = Handle::Released;
        }
        out
    }
}

/// Fixed parameters of a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Wait after routing live output to the host, for the mirror to flip up.
    pub settle_delay: Duration,
    /// Wait after the capture command; there is no completion event wired up.
    pub capture_delay: Duration,
    /// Preview stream capacity: channels x max sensor width x max height.
    pub buffer_capacity: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        // Maximums for the Canon Rebel XSi.
        Self {
            settle_delay: Duration::from_secs(2),
            capture_delay: Duration::from_secs(6),
            buffer_capacity: 3 * 4272 * 2848,
        }
    }
}

/// The one live connection to the camera.
pub struct Session<S: CameraSdk> {
    pub(crate) sdk: S,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) options: SessionOptions,
    policy: ErrorPolicy,
    sdk_up: bool,
    pub(crate) camera: Handle,
    pub(crate) stream: Handle,
    pub(crate) evf_image: Handle,
    pub exposure: ExposureState,
}

impl<S: CameraSdk> Session<S> {
    #[must_use]
    pub fn new(sdk: S, options: SessionOptions) -> Self {
        Self {
            sdk,
            clock: Box::new(SystemClock),
            options,
            policy: ErrorPolicy::FailFast,
            sdk_up: false,
            camera: Handle::default(),
            stream: Handle::default(),
            evf_image: Handle::default(),
            exposure: ExposureState::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Borrow the SDK backend (mainly for test inspection).
    #[must_use]
    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    /// Apply the error policy to one call's status.
    pub(crate) fn check(&self, call: &'static str, status: EdsStatus) -> Result<(), CamError> {
        if status.is_ok() {
            debug!("{call}: ok");
            return Ok(());
        }
        match self.policy {
            ErrorPolicy::FailFast => {
                error!("{call}: {status}");
                Err(CamError::Sdk { call, status })
            }
            ErrorPolicy::Continue => {
                warn!("{call}: {status} (continuing)");
                Ok(())
            }
        }
    }

    pub(crate) fn camera(&self) -> Result<EdsRef, CamError> {
        self.camera.get().ok_or(CamError::NotInitialized)
    }

    /// Bring the connection up: SDK runtime, first attached body, session,
    /// live-view routing, preview stream, exposure readback.
    pub fn initialize(&mut self) -> Result<(), CamError> {
        self.check("EdsInitializeSDK", self.sdk.initialize())?;
        self.sdk_up = true;

        let (status, list) = self.sdk.camera_list();
        self.check("EdsGetCameraList", status)?;
        let (status, count) = self.sdk.child_count(list);
        self.check("EdsGetChildCount", status)?;
        if count == 0 {
            let _ = self.sdk.release(list);
            return Err(CamError::NoCamera);
        }
        // One camera on the desk; take the first entry.
        let (status, camera) = self.sdk.child_at(list, 0);
        self.check("EdsGetChildAtIndex", status)?;
        self.camera.acquire(camera);
        self.check("EdsRelease camera list", self.sdk.release(list))?;

        self.check("EdsOpenSession", self.sdk.open_session(camera))?;

        // Route the live stream to us, but only write the property if it is
        // not already set; a write moves the mirror and needs settle time.
        let (status, device) = self.sdk.get_property(camera, PROP_EVF_OUTPUT_DEVICE);
        self.check("Check output device", status)?;
        if device != EVF_OUTPUT_DEVICE_PC {
            self.check(
                "Route output device to host",
                self.sdk
                    .set_property(camera, PROP_EVF_OUTPUT_DEVICE, EVF_OUTPUT_DEVICE_PC),
            )?;
            self.clock.sleep(self.options.settle_delay);
        }

        let (status, stream) = self.sdk.create_memory_stream(self.options.buffer_capacity);
        self.check("EdsCreateMemoryStream", status)?;
        self.stream.acquire(stream);

        self.exposure = self.read_exposure()?;
        Ok(())
    }

    fn read_exposure(&self) -> Result<ExposureState, CamError> {
        let camera = self.camera()?;
        let (status, iso) = self.sdk.get_property(camera, PROP_ISO_SPEED);
        self.check("Get ISO setting", status)?;
        let (status, av) = self.sdk.get_property(camera, PROP_AV);
        self.check("Get aperture setting", status)?;
        let (status, tv) = self.sdk.get_property(camera, PROP_TV);
        self.check("Get shutter setting", status)?;

        let state = ExposureState::from_codes(iso, av, tv);
        for (name, code, scale) in [
            ("ISO", iso, &crate::exposure::ISO_SCALE),
            ("aperture", av, &crate::exposure::AV_SCALE),
            ("shutter", tv, &crate::exposure::TV_SCALE),
        ] {
            match scale.index_of(code) {
                Some(index) => debug!("{name} = {}", scale.labels[index]),
                None => warn!("{name} code 0x{code:02X} not in the table; showing {}", scale.labels[0]),
            }
        }
        Ok(state)
    }

    /// Push one exposure property to the camera.
    pub fn update_setting(&mut self, prop: u32, code: u32) -> Result<(), CamError> {
        let camera = self.camera()?;
        self.check(
            "EdsSetPropertyData",
            self.sdk.set_property(camera, prop, code),
        )
    }

    /// Name of the connected body, if it can be read.
    #[must_use]
    pub fn camera_name(&self) -> Option<String> {
        let camera = self.camera.get()?;
        let (status, name) = self.sdk.device_name(camera);
        status.is_ok().then_some(name)
    }

    /// Tear everything down in reverse acquisition order. Every remaining
    /// step is attempted even when an earlier one fails; failures are
    /// collected and reported together.
    pub fn cleanup(&mut self) -> Result<(), CamError> {
        let mut failures: Vec<String> = Vec::new();

        if let Some(stream) = self.stream.take() {
            record_step(&mut failures, "EdsRelease stream", self.sdk.release(stream));
        }
        if let Some(image) = self.evf_image.take() {
            record_step(
                &mut failures,
                "EdsRelease evf image",
                self.sdk.release(image),
            );
        }
        if let Some(camera) = self.camera.get() {
            record_step(
                &mut failures,
                "Reset output device",
                self.sdk
                    .set_property(camera, PROP_EVF_OUTPUT_DEVICE, EVF_OUTPUT_DEVICE_OFF),
            );
            record_step(&mut failures, "EdsCloseSession", self.sdk.close_session(camera));
        }
        if let Some(camera) = self.camera.take() {
            record_step(&mut failures, "EdsRelease camera", self.sdk.release(camera));
        }
        if self.sdk_up {
            record_step(&mut failures, "EdsTerminateSDK", self.sdk.terminate());
            self.sdk_up = false;
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CamError::Teardown { failures })
        }
    }
}

fn record_step(failures: &mut Vec<String>, call: &'static str, status: EdsStatus) {
    if status.is_ok() {
        debug!("{call}: ok");
    } else {
        warn!("{call}: {status}");
        failures.push(format!("{call}: {status}"));
    }
}

/// Enumerate attached bodies by name. Opens and tears down its own SDK
/// runtime; independent of any live session.
pub fn list_cameras<S: CameraSdk>(sdk: &S) -> Result<Vec<String>, CamError> {
    let status = sdk.initialize();
    if !status.is_ok() {
        return Err(CamError::Sdk {
            call: "EdsInitializeSDK",
            status,
        });
    }

    let mut names = Vec::new();
    let (status, list) = sdk.camera_list();
    if status.is_ok() {
        let (status, count) = sdk.child_count(list);
        if status.is_ok() {
            for index in 0..count {
                let (status, camera) = sdk.child_at(list, index);
                if !status.is_ok() {
                    continue;
                }
                let (status, name) = sdk.device_name(camera);
                names.push(if status.is_ok() {
                    name
                } else {
                    format!("camera {index} (name unavailable)")
                });
                let _ = sdk.release(camera);
            }
        }
        let _ = sdk.release(list);
    }

    let status = sdk.terminate();
    if !status.is_ok() {
        warn!("EdsTerminateSDK: {status}");
    }
    Ok(names)
}

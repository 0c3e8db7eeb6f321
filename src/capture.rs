//! Still-capture commands and image download.
//!
//! Capturing has no completion event wired up, so a fixed wait stands in for
//! the shutter/write cycle. Downloading walks the camera's storage tree to
//! the newest file and only deletes the remote copy once the local file is
//! confirmed on disk.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::edsdk::{
    CameraSdk, ACCESS_READ_WRITE, CMD_TAKE_PICTURE, FILE_CREATE_ALWAYS, IMAGE_QUALITY_RAW_LARGE,
    PROP_IMAGE_QUALITY,
};
use crate::session::{CamError, Session};

impl<S: CameraSdk> Session<S> {
    /// Fire the shutter, then wait out the capture cycle.
    pub fn take_picture(&mut self) -> Result<(), CamError> {
        let camera = self.camera()?;
        self.check(
            "EdsSendCommand TakePicture",
            self.sdk.send_command(camera, CMD_TAKE_PICTURE, 0),
        )?;
        // No completion callback; give the camera time to finish its
        // business before the next SDK call.
        self.clock.sleep(self.options.capture_delay);
        Ok(())
    }

    /// Capture a RAW (bayer) still.
    ///
    /// The image-quality property is read first and only written when it is
    /// not already RAW, so repeated captures skip the redundant write.
    /// Switching the picture style to monochrome is deliberately not done:
    /// it would only affect the embedded JPEG, the bayer data is unchanged.
    pub fn take_raw(&mut self) -> Result<(), CamError> {
        let camera = self.camera()?;
        let (status, quality) = self.sdk.get_property(camera, PROP_IMAGE_QUALITY);
        self.check("Get image quality", status)?;
        if quality != IMAGE_QUALITY_RAW_LARGE {
            self.check(
                "Set image quality RAW",
                self.sdk
                    .set_property(camera, PROP_IMAGE_QUALITY, IMAGE_QUALITY_RAW_LARGE),
            )?;
        }
        self.take_picture()
    }

    /// Find the newest image on the card, stream it into `images_dir`, and
    /// delete the remote copy once the local file is verified.
    ///
    /// The walk goes first volume -> DCIM -> the highest-index entry of each
    /// folder until a non-folder shows up; cameras append, so the last entry
    /// is the most recent.
    pub fn download_last_image(&mut self, images_dir: &Path) -> Result<PathBuf, CamError> {
        let camera = self.camera()?;

        let (status, volume) = self.sdk.child_at(camera, 0);
        self.check("Get volume", status)?;
        let (status, count) = self.sdk.child_count(volume);
        self.check("Get volume count", status)?;

        let mut dcim = None;
        for index in 0..count {
            let (status, item) = self.sdk.child_at(volume, index);
            self.check("Get volume entry", status)?;
            let (status, info) = self.sdk.dir_item_info(item);
            self.check("Get entry info", status)?;
            if info.is_folder && info.name == "DCIM" {
                dcim = Some(item);
                break;
            }
            let _ = self.sdk.release(item);
        }
        let _ = self.sdk.release(volume);
        let Some(mut dir) = dcim else {
            return Err(CamError::DcimNotFound);
        };

        let (file_item, file_info) = loop {
            let (status, count) = self.sdk.child_count(dir);
            self.check("Get folder count", status)?;
            if count == 0 {
                let _ = self.sdk.release(dir);
                return Err(CamError::NoImageFound);
            }
            let (status, child) = self.sdk.child_at(dir, count - 1);
            self.check("Get newest entry", status)?;
            let (status, info) = self.sdk.dir_item_info(child);
            self.check("Get entry info", status)?;
            let _ = self.sdk.release(dir);
            if info.is_folder {
                dir = child;
            } else {
                break (child, info);
            }
        };

        let local_path = images_dir.join(&file_info.name);
        let (status, file_stream) =
            self.sdk
                .create_file_stream(&local_path, FILE_CREATE_ALWAYS, ACCESS_READ_WRITE);
        self.check("EdsCreateFileStream", status)?;
        self.check(
            "EdsDownload",
            self.sdk.download(file_item, file_info.size, file_stream),
        )?;
        self.check("EdsDownloadComplete", self.sdk.download_complete(file_item))?;

        // Verify-before-delete: the remote copy is the only copy until the
        // local file is actually there.
        if local_path.is_file() {
            self.check(
                "EdsDeleteDirectoryItem",
                self.sdk.delete_dir_item(file_item),
            )?;
            info!("downloaded {}", local_path.display());
        } else {
            warn!(
                "{} did not appear locally; keeping the copy on the camera",
                local_path.display()
            );
        }

        self.check("EdsRelease file item", self.sdk.release(file_item))?;
        self.check("EdsRelease file stream", self.sdk.release(file_stream))?;
        Ok(local_path)
    }

    /// Capture a RAW still and immediately pull it off the card.
    pub fn capture_and_download(&mut self, images_dir: &Path) -> Result<PathBuf, CamError> {
        self.take_raw()?;
        self.download_last_image(images_dir)
    }
}

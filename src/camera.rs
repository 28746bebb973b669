use async_trait::async_trait;

use crate::error::CaptureError;
use crate::types::{RgbFrame, VideoMetadata};

/// Live frame source. `open` resolves once the stream's size is known.
#[async_trait(?Send)]
pub trait VideoCapture {
    fn name(&self) -> String;
    async fn open(&mut self) -> Result<VideoMetadata, CaptureError>;
    fn capture(&mut self) -> Result<RgbFrame, CaptureError>;
}

/// Moving gradient at a fixed size, for headless runs and tests.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    frame: u32,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame: 0,
        }
    }
}

#[async_trait(?Send)]
impl VideoCapture for SyntheticCamera {
    fn name(&self) -> String {
        format!("Synthetic {}x{}", self.width, self.height)
    }

    async fn open(&mut self) -> Result<VideoMetadata, CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::DeviceUnavailable("zero-sized synthetic camera".to_string()));
        }
        Ok(VideoMetadata {
            width: self.width,
            height: self.height,
        })
    }

    fn capture(&mut self) -> Result<RgbFrame, CaptureError> {
        let (w, h) = (self.width.max(1), self.height.max(1));
        let shift = self.frame % w;
        self.frame = self.frame.wrapping_add(1);
        Ok(RgbFrame::from_fn(self.width, self.height, |x, y| {
            image::Rgb([
                (((x + shift) % w) * 255 / w) as u8,
                (y * 255 / h) as u8,
                96,
            ])
        }))
    }
}

#[cfg(feature = "camera")]
pub use device::CameraSource;

#[cfg(feature = "camera")]
mod device {
    use super::*;
    use colored::*;
    use nokhwa::{
        pixel_format::RgbFormat,
        utils::{CameraIndex, RequestedFormat, RequestedFormatType},
        Camera,
    };

    pub struct CameraSource {
        index: u32,
        camera: Option<Camera>,
    }

    impl CameraSource {
        pub fn new(index: u32) -> Self {
            Self { index, camera: None }
        }
    }

    fn classify(err: nokhwa::NokhwaError) -> CaptureError {
        let msg = err.to_string();
        if msg.to_ascii_lowercase().contains("permission") {
            CaptureError::PermissionDenied(msg)
        } else {
            CaptureError::DeviceUnavailable(msg)
        }
    }

    #[async_trait(?Send)]
    impl VideoCapture for CameraSource {
        fn name(&self) -> String {
            match &self.camera {
                Some(c) => c.info().human_name(),
                None => format!("Camera {}", self.index),
            }
        }

        async fn open(&mut self) -> Result<VideoMetadata, CaptureError> {
            let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
            let mut camera = Camera::new(CameraIndex::Index(self.index), requested).map_err(classify)?;
            camera.open_stream().map_err(classify)?;

            println!("{}", format!("Opened camera: {}", camera.info().human_name()).green());
            log::info!("Format: {}", camera.camera_format());

            let meta = VideoMetadata {
                width: camera.resolution().width(),
                height: camera.resolution().height(),
            };
            self.camera = Some(camera);
            Ok(meta)
        }

        fn capture(&mut self) -> Result<RgbFrame, CaptureError> {
            let camera = self
                .camera
                .as_mut()
                .ok_or_else(|| CaptureError::DeviceUnavailable("camera not opened".to_string()))?;
            let frame = camera.frame().map_err(|e| CaptureError::Frame(e.to_string()))?;
            frame
                .decode_image::<RgbFormat>()
                .map_err(|e| CaptureError::Frame(e.to_string()))
        }
    }
}

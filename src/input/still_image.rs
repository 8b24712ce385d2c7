// 该文件是 Yanse （察言观色） 项目的一部分。
// src/input/still_image.rs - 把单张图片当作视频流
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Wareless Group

use std::{path::PathBuf, sync::Arc, time::Instant};

use image::{ImageReader, RgbImage};
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::VideoFrame,
  input::{InputError, MediaAccessError, MediaSource, StreamConstraints, VideoStream},
  utils::url_to_path,
};

enum ImageOrigin {
  File(PathBuf),
  Memory(Arc<RgbImage>),
}

/// 图片文件输入，打开后每次取帧都得到同一张图片。
pub struct StillImageSource {
  origin: ImageOrigin,
}

impl FromUrlWithScheme for StillImageSource {
  const SCHEME: &'static str = "image";
}

impl FromUrl for StillImageSource {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    let path = url_to_path(url);
    if path.as_os_str().is_empty() || path == PathBuf::from("/") {
      return Err(InputError::InvalidLocation(url.to_string()));
    }
    Ok(Self {
      origin: ImageOrigin::File(path),
    })
  }
}

impl StillImageSource {
  /// 直接使用内存中的图片
  pub fn from_image(image: RgbImage) -> Self {
    Self {
      origin: ImageOrigin::Memory(Arc::new(image)),
    }
  }

  fn load(&self) -> Result<Arc<RgbImage>, MediaAccessError> {
    let path = match &self.origin {
      ImageOrigin::Memory(image) => return Ok(image.clone()),
      ImageOrigin::File(path) => path,
    };
    let what = path.display().to_string();
    let reader = ImageReader::open(path).map_err(|e| MediaAccessError::from_io(e, &what))?;
    let image = reader
      .with_guessed_format()
      .map_err(|e| MediaAccessError::from_io(e, &what))?
      .decode()
      .map_err(|e| MediaAccessError::UnsupportedFormat(format!("{what}: {e}")))?;
    Ok(Arc::new(image.to_rgb8()))
  }
}

impl MediaSource for StillImageSource {
  type Stream = StillImageStream;

  fn open(&mut self, _constraints: &StreamConstraints) -> Result<Self::Stream, MediaAccessError> {
    let image = self.load()?;
    info!("打开图片输入，尺寸 {}x{}", image.width(), image.height());
    Ok(StillImageStream {
      image,
      started: Instant::now(),
      next_index: 0,
      active: true,
    })
  }
}

pub struct StillImageStream {
  image: Arc<RgbImage>,
  started: Instant,
  next_index: u64,
  active: bool,
}

impl VideoStream for StillImageStream {
  fn is_active(&self) -> bool {
    self.active
  }

  fn dimensions(&self) -> (u32, u32) {
    if self.active {
      self.image.dimensions()
    } else {
      (0, 0)
    }
  }

  fn current_frame(&mut self) -> Option<VideoFrame> {
    if !self.active {
      return None;
    }
    let frame = VideoFrame::from_shared(
      self.image.clone(),
      self.next_index,
      self.started.elapsed().as_millis() as u64,
    );
    self.next_index += 1;
    Some(frame)
  }

  fn stop(&mut self) {
    self.active = false;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn serves_same_image_repeatedly() {
    let mut source = StillImageSource::from_image(RgbImage::from_pixel(4, 3, Rgb([9, 9, 9])));
    let mut stream = source.open(&StreamConstraints::default()).unwrap();
    assert!(stream.is_active());
    assert_eq!(stream.dimensions(), (4, 3));

    let first = stream.current_frame().unwrap();
    let second = stream.current_frame().unwrap();
    assert_eq!((first.index, second.index), (0, 1));
    assert_eq!(second.dimensions(), (4, 3));
  }

  #[test]
  fn stopped_stream_has_no_frames() {
    let mut source = StillImageSource::from_image(RgbImage::new(2, 2));
    let mut stream = source.open(&StreamConstraints::default()).unwrap();
    stream.stop();
    stream.stop();
    assert!(!stream.is_active());
    assert_eq!(stream.dimensions(), (0, 0));
    assert!(stream.current_frame().is_none());
  }

  #[test]
  fn reads_png_from_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("face.png");
    RgbImage::from_pixel(6, 5, Rgb([200, 10, 10])).save(&path).unwrap();

    let url = Url::from_file_path(&path).unwrap();
    let url = Url::parse(&format!("image://{}", url.path())).unwrap();
    let mut source = StillImageSource::from_url(&url).unwrap();
    let mut stream = source.open(&StreamConstraints::default()).unwrap();
    assert_eq!(stream.dimensions(), (6, 5));
    assert_eq!(stream.current_frame().unwrap().image().get_pixel(0, 0), &Rgb([200, 10, 10]));
  }

  #[test]
  fn missing_file_is_no_device() {
    let url = Url::parse("image:///definitely/not/here.png").unwrap();
    let mut source = StillImageSource::from_url(&url).unwrap();
    assert!(matches!(
      source.open(&StreamConstraints::default()),
      Err(MediaAccessError::NoDevice(_))
    ));
  }

  #[test]
  fn garbage_file_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noise.png");
    std::fs::write(&path, b"not an image").unwrap();
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let mut source = StillImageSource::from_url(&url).unwrap();
    assert!(matches!(
      source.open(&StreamConstraints::default()),
      Err(MediaAccessError::UnsupportedFormat(_))
    ));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("folder:///tmp").unwrap();
    assert!(matches!(
      StillImageSource::from_url(&url),
      Err(InputError::SchemeMismatch(_))
    ));
  }
}

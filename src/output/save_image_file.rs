// 该文件是 Yanse （察言观色） 项目的一部分。
// src/output/save_image_file.rs - 保存预览图像
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

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Present, Scene},
  utils::url_to_path,
};

/// 每次检测后覆盖写同一个文件，保存带叠加层的最新画面。
pub struct SaveImageFileOutput {
  path: PathBuf,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: url_to_path(uri),
    })
  }
}

impl SaveImageFileOutput {
  pub fn path(&self) -> &PathBuf {
    &self.path
  }
}

impl Present for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn present(&mut self, scene: &Scene<'_>) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    scene.composite().save(&self.path)?;
    debug!("保存第 {} 帧到文件: {}", scene.frame.index, self.path.display());

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    detection::DetectionFrame, frame::VideoFrame, stats::EmotionCounts, surface::RgbaSurface,
  };
  use image::{Rgb, RgbImage};

  #[test]
  fn writes_composited_preview() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nested").join("preview.png");
    let url = Url::parse(&format!("image://{}", target.display())).unwrap();
    let mut output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.path(), &target);

    let frame = VideoFrame::new(RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])), 3, 0);
    let overlay = RgbaSurface::new(8, 8);
    let scene = Scene {
      frame: &frame,
      overlay: &overlay,
      detections: &DetectionFrame::empty(),
      counts: &EmotionCounts::default(),
    };
    output.present(&scene).unwrap();
    output.present(&scene).unwrap();

    let saved = image::open(&target).unwrap().to_rgb8();
    assert_eq!(saved.get_pixel(4, 4), &Rgb([10, 20, 30]));
  }

  #[test]
  fn rejects_other_scheme() {
    let url = Url::parse("folder:///tmp/out").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}

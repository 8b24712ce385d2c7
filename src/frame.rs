// 该文件是 Yanse （察言观色） 项目的一部分。
// src/frame.rs - 视频帧定义
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

use std::sync::Arc;

use image::RgbImage;

/// 视频流中的一帧，像素数据共享，克隆开销很小。
#[derive(Debug, Clone)]
pub struct VideoFrame {
  image: Arc<RgbImage>,
  /// 帧序号，从 0 开始
  pub index: u64,
  /// 相对于流开始的时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl VideoFrame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image: Arc::new(image),
      index,
      timestamp_ms,
    }
  }

  /// 复用已有的像素数据生成新的一帧
  pub fn from_shared(image: Arc<RgbImage>, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  /// 宽或高为 0 的帧不能送去推理
  pub fn is_empty(&self) -> bool {
    self.width() == 0 || self.height() == 0
  }
}

// 该文件是 Yanse （察言观色） 项目的一部分。
// src/input.rs - 视频输入
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{FromUrl, frame::VideoFrame};

/// 期望的摄像头朝向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
  #[default]
  User,
  Environment,
}

/// 打开视频流时的约束，尺寸只是期望值，实际尺寸以流为准。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConstraints {
  pub facing_mode: FacingMode,
  pub ideal_width: u32,
  pub ideal_height: u32,
}

impl Default for StreamConstraints {
  fn default() -> Self {
    Self {
      facing_mode: FacingMode::User,
      ideal_width: 640,
      ideal_height: 480,
    }
  }
}

/// 无法获得视频流，用户可以重新开始
#[derive(Error, Debug)]
pub enum MediaAccessError {
  #[error("没有访问摄像头的权限: {0}")]
  PermissionDenied(String),
  #[error("找不到视频设备: {0}")]
  NoDevice(String),
  #[error("不支持的视频格式: {0}")]
  UnsupportedFormat(String),
  #[error("视频流未能就绪")]
  NotReady,
  #[error("视频设备错误: {0}")]
  Device(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

impl MediaAccessError {
  /// 按 I/O 错误种类归类，`what` 描述出错的设备或文件
  pub fn from_io(err: std::io::Error, what: &str) -> Self {
    match err.kind() {
      std::io::ErrorKind::PermissionDenied => MediaAccessError::PermissionDenied(what.to_string()),
      std::io::ErrorKind::NotFound => MediaAccessError::NoDevice(what.to_string()),
      _ => MediaAccessError::Io(err),
    }
  }
}

/// 一路正在运行的视频流
pub trait VideoStream: Send + 'static {
  fn is_active(&self) -> bool;
  /// 原始尺寸，尚无画面时为 `(0, 0)`
  fn dimensions(&self) -> (u32, u32);
  /// 当前画面，没有可用画面时返回 `None`
  fn current_frame(&mut self) -> Option<VideoFrame>;
  /// 释放设备，可重复调用。可能阻塞到采集线程退出。
  fn stop(&mut self);
}

/// 可以打开视频流的设备
pub trait MediaSource: Send + 'static {
  type Stream: VideoStream;

  /// 打开视频流，可能阻塞到设备就绪，检测循环在阻塞线程池中调用。
  fn open(&mut self, constraints: &StreamConstraints) -> Result<Self::Stream, MediaAccessError>;
}

#[cfg(feature = "read_image_file")]
mod still_image;
#[cfg(feature = "read_image_file")]
pub use self::still_image::{StillImageSource, StillImageStream};

#[cfg(feature = "v4l_input")]
mod v4l2_camera;
#[cfg(feature = "v4l_input")]
pub use self::v4l2_camera::{V4l2Camera, V4l2Stream};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无效的输入位置: {0}")]
  InvalidLocation(String),
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  StillImage(StillImageSource),
  #[cfg(feature = "v4l_input")]
  V4l2Camera(V4l2Camera),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == StillImageSource::SCHEME {
        return Ok(InputWrapper::StillImage(StillImageSource::from_url(url)?));
      }
    }
    #[cfg(feature = "v4l_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == V4l2Camera::SCHEME {
        return Ok(InputWrapper::V4l2Camera(V4l2Camera::from_url(url)?));
      }
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

pub enum InputStream {
  #[cfg(feature = "read_image_file")]
  StillImage(StillImageStream),
  #[cfg(feature = "v4l_input")]
  V4l2Camera(V4l2Stream),
}

impl MediaSource for InputWrapper {
  type Stream = InputStream;

  fn open(&mut self, constraints: &StreamConstraints) -> Result<Self::Stream, MediaAccessError> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::StillImage(source) => source.open(constraints).map(InputStream::StillImage),
      #[cfg(feature = "v4l_input")]
      InputWrapper::V4l2Camera(source) => source.open(constraints).map(InputStream::V4l2Camera),
    }
  }
}

impl VideoStream for InputStream {
  fn is_active(&self) -> bool {
    match self {
      #[cfg(feature = "read_image_file")]
      InputStream::StillImage(stream) => stream.is_active(),
      #[cfg(feature = "v4l_input")]
      InputStream::V4l2Camera(stream) => stream.is_active(),
    }
  }

  fn dimensions(&self) -> (u32, u32) {
    match self {
      #[cfg(feature = "read_image_file")]
      InputStream::StillImage(stream) => stream.dimensions(),
      #[cfg(feature = "v4l_input")]
      InputStream::V4l2Camera(stream) => stream.dimensions(),
    }
  }

  fn current_frame(&mut self) -> Option<VideoFrame> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputStream::StillImage(stream) => stream.current_frame(),
      #[cfg(feature = "v4l_input")]
      InputStream::V4l2Camera(stream) => stream.current_frame(),
    }
  }

  fn stop(&mut self) {
    match self {
      #[cfg(feature = "read_image_file")]
      InputStream::StillImage(stream) => stream.stop(),
      #[cfg(feature = "v4l_input")]
      InputStream::V4l2Camera(stream) => stream.stop(),
    }
  }
}

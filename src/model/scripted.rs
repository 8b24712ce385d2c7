// 该文件是 Yanse （察言观色） 项目的一部分。
// src/model/scripted.rs - 按脚本返回结果的检测器
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

use std::{
  collections::VecDeque,
  sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use url::Url;

use crate::{
  detection::DetectionFrame,
  frame::VideoFrame,
  model::{AssetLoadError, DetectionError, DetectorOptions, FrameDetector},
};

/// 依次返回预先排好的结果或错误，脚本用完后返回空帧。
///
/// 可以设置推理延迟来模拟慢模型。
#[derive(Debug, Default)]
pub struct ScriptedDetector {
  script: Mutex<VecDeque<Result<DetectionFrame, String>>>,
  latency: Option<Duration>,
  load_latency: Option<Duration>,
  load_failure: Option<String>,
  loaded: AtomicBool,
  calls: AtomicUsize,
}

impl ScriptedDetector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_frames<I: IntoIterator<Item = DetectionFrame>>(self, frames: I) -> Self {
    for frame in frames {
      self.push_frame(frame);
    }
    self
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  pub fn with_load_latency(mut self, latency: Duration) -> Self {
    self.load_latency = Some(latency);
    self
  }

  pub fn with_load_failure(mut self, message: impl Into<String>) -> Self {
    self.load_failure = Some(message.into());
    self
  }

  pub fn push_frame(&self, frame: DetectionFrame) {
    self.script().push_back(Ok(frame));
  }

  pub fn push_failure(&self, message: impl Into<String>) {
    self.script().push_back(Err(message.into()));
  }

  /// `detect` 被调用的次数
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn remaining(&self) -> usize {
    self.script().len()
  }

  fn script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<DetectionFrame, String>>> {
    self.script.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl FrameDetector for ScriptedDetector {
  async fn load_models(&self, _base: &Url) -> Result<(), AssetLoadError> {
    if let Some(latency) = self.load_latency {
      tokio::time::sleep(latency).await;
    }
    if let Some(message) = &self.load_failure {
      return Err(AssetLoadError::Other(message.clone()));
    }
    self.loaded.store(true, Ordering::SeqCst);
    Ok(())
  }

  async fn detect(
    &self,
    frame: &VideoFrame,
    _options: &DetectorOptions,
  ) -> Result<DetectionFrame, DetectionError> {
    if !self.loaded.load(Ordering::SeqCst) {
      return Err(DetectionError::NotLoaded);
    }
    if frame.is_empty() {
      return Err(DetectionError::EmptyFrame);
    }
    self.calls.fetch_add(1, Ordering::SeqCst);

    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }

    let next = self.script().pop_front();
    match next {
      Some(Ok(frame)) => Ok(frame),
      Some(Err(message)) => Err(DetectionError::Inference(message)),
      None => Ok(DetectionFrame::empty()),
    }
  }
}

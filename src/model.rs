// 该文件是 Yanse （察言观色） 项目的一部分。
// src/model.rs - 人脸与表情检测接口
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

use std::{future::Future, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{detection::DetectionFrame, frame::VideoFrame};

pub const DEFAULT_INPUT_SIZE: u32 = 320;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

/// 检测器参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
  /// 网络输入边长，必须是 32 的正整数倍
  pub input_size: u32,
  /// 低于该分数的人脸被丢弃
  pub score_threshold: f32,
}

impl Default for DetectorOptions {
  fn default() -> Self {
    Self {
      input_size: DEFAULT_INPUT_SIZE,
      score_threshold: DEFAULT_SCORE_THRESHOLD,
    }
  }
}

#[derive(Error, Debug, PartialEq)]
pub enum DetectorOptionsError {
  #[error("输入尺寸 {0} 必须是 32 的正整数倍")]
  InputSize(u32),
  #[error("分数阈值 {0} 必须在 0 到 1 之间")]
  ScoreThreshold(f32),
}

impl DetectorOptions {
  pub fn validate(&self) -> Result<(), DetectorOptionsError> {
    if self.input_size == 0 || self.input_size % 32 != 0 {
      return Err(DetectorOptionsError::InputSize(self.input_size));
    }
    if !(0.0..=1.0).contains(&self.score_threshold) {
      return Err(DetectorOptionsError::ScoreThreshold(self.score_threshold));
    }
    Ok(())
  }
}

/// 模型加载失败，本次会话无法继续
#[derive(Error, Debug)]
pub enum AssetLoadError {
  #[error("不支持的模型位置: {0}")]
  UnsupportedLocation(String),
  #[error("找不到模型文件: {}", .0.display())]
  NotFound(PathBuf),
  #[error("读取模型文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("模型文件第 {line} 行格式错误: {source}")]
  Parse {
    line: usize,
    #[source]
    source: serde_json::Error,
  },
  #[error("模型文件 {} 中没有任何记录", .0.display())]
  Empty(PathBuf),
  #[error("模型加载超时（{0:?}）")]
  Timeout(Duration),
  #[error("模型加载失败: {0}")]
  Other(String),
}

/// 单帧推理失败，跳过该帧即可
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
  #[error("模型尚未加载")]
  NotLoaded,
  #[error("空帧无法推理")]
  EmptyFrame,
  #[error("推理失败: {0}")]
  Inference(String),
}

/// 人脸检测、关键点与表情分类能力。
///
/// 实现者只需保证 `detect` 可以在多个任务中并发调用；
/// 检测循环自己保证同一时刻最多一个调用。
pub trait FrameDetector: Send + Sync + 'static {
  /// 从 `base` 指向的位置加载模型，只调用一次。
  fn load_models(&self, base: &Url) -> impl Future<Output = Result<(), AssetLoadError>> + Send;

  fn detect(
    &self,
    frame: &VideoFrame,
    options: &DetectorOptions,
  ) -> impl Future<Output = Result<DetectionFrame, DetectionError>> + Send;
}

#[cfg(feature = "model_replay")]
mod replay;
#[cfg(feature = "model_replay")]
pub use self::replay::{REPLAY_FILE_NAME, ReplayDetector};

mod scripted;
pub use self::scripted::ScriptedDetector;

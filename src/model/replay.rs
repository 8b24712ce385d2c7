// 该文件是 Yanse （察言观色） 项目的一部分。
// src/model/replay.rs - 回放录制的检测结果
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
  path::{Path, PathBuf},
  sync::{
    OnceLock,
    atomic::{AtomicUsize, Ordering},
  },
};

use tracing::{debug, info};
use url::Url;

use crate::{
  detection::{Detection, DetectionFrame},
  frame::VideoFrame,
  model::{AssetLoadError, DetectionError, DetectorOptions, FrameDetector},
  utils::url_to_path,
};

/// 模型位置是目录时，在其中查找该文件
pub const REPLAY_FILE_NAME: &str = "detections.jsonl";

const SCHEMES: [&str; 2] = ["file", "replay"];

/// 按顺序循环回放 JSON Lines 文件中录制的检测结果，每行一个 JSON 数组代表一帧。
#[derive(Debug, Default)]
pub struct ReplayDetector {
  frames: OnceLock<Box<[DetectionFrame]>>,
  cursor: AtomicUsize,
}

impl ReplayDetector {
  pub fn new() -> Self {
    Self::default()
  }

  /// 已加载的帧数
  pub fn len(&self) -> usize {
    self.frames.get().map_or(0, |frames| frames.len())
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  async fn resolve(path: PathBuf) -> Result<PathBuf, AssetLoadError> {
    match tokio::fs::metadata(&path).await {
      Ok(meta) if meta.is_dir() => Ok(path.join(REPLAY_FILE_NAME)),
      Ok(_) => Ok(path),
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(AssetLoadError::NotFound(path)),
      Err(err) => Err(err.into()),
    }
  }

  fn parse(path: &Path, content: &str) -> Result<Box<[DetectionFrame]>, AssetLoadError> {
    let mut frames = Vec::new();
    for (i, line) in content.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() {
        continue;
      }
      let frame: DetectionFrame = serde_json::from_str(line)
        .map_err(|source| AssetLoadError::Parse { line: i + 1, source })?;
      frames.push(frame);
    }
    if frames.is_empty() {
      return Err(AssetLoadError::Empty(path.to_path_buf()));
    }
    Ok(frames.into_boxed_slice())
  }
}

impl FrameDetector for ReplayDetector {
  async fn load_models(&self, base: &Url) -> Result<(), AssetLoadError> {
    if !SCHEMES.contains(&base.scheme()) {
      return Err(AssetLoadError::UnsupportedLocation(base.to_string()));
    }

    let path = Self::resolve(url_to_path(base)).await?;
    let content = match tokio::fs::read_to_string(&path).await {
      Ok(content) => content,
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
        return Err(AssetLoadError::NotFound(path));
      }
      Err(err) => return Err(err.into()),
    };
    let frames = Self::parse(&path, &content)?;
    let count = frames.len();

    if self.frames.set(frames).is_err() {
      return Err(AssetLoadError::Other("模型已经加载过".to_string()));
    }
    info!("从 {} 加载了 {} 帧录制结果", path.display(), count);
    Ok(())
  }

  async fn detect(
    &self,
    frame: &VideoFrame,
    options: &DetectorOptions,
  ) -> Result<DetectionFrame, DetectionError> {
    let frames = self.frames.get().ok_or(DetectionError::NotLoaded)?;
    if frame.is_empty() {
      return Err(DetectionError::EmptyFrame);
    }

    let index = self.cursor.fetch_add(1, Ordering::Relaxed) % frames.len();
    let recorded = &frames[index];
    debug!("回放第 {} 帧录制结果（视频帧 {}）", index, frame.index);

    if recorded
      .iter()
      .all(|d| d.score >= options.score_threshold)
    {
      return Ok(recorded.clone());
    }

    let kept: Vec<Detection> = recorded
      .iter()
      .filter(|d| d.score >= options.score_threshold)
      .cloned()
      .collect();
    Ok(kept.into())
  }
}

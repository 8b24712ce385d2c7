// 该文件是 Yanse （察言观色） 项目的一部分。
// src/config.rs - 配置文件
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
  time::Duration,
};

use ab_glyph::FontArc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  history::DEFAULT_HISTORY_LENGTH, input::StreamConstraints, model::DetectorOptions,
  style::RenderStyle, task::LoopSettings,
};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("无法读取配置文件 {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("无法读取字体文件 {}: {source}", path.display())]
  FontIo {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("字体文件 {} 无法解析", .0.display())]
  FontParse(PathBuf),
  #[error("配置文件格式错误: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("配置无效: {0}")]
  Invalid(String),
}

/// TOML 配置，所有字段都有默认值。
///
/// ```toml
/// detection_interval_ms = 100
/// history_length = 5
///
/// [detector]
/// input_size = 320
/// score_threshold = 0.5
///
/// [style.palette]
/// happy = "#4CAF50"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub detection_interval_ms: u64,
  pub history_length: usize,
  pub ready_timeout_ms: u64,
  pub model_load_timeout_ms: u64,
  pub detector: DetectorOptions,
  pub camera: StreamConstraints,
  /// 标签字体（TTF/OTF），运行检测时必须设置
  pub font_path: Option<PathBuf>,
  pub style: RenderStyle,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      detection_interval_ms: 100,
      history_length: DEFAULT_HISTORY_LENGTH,
      ready_timeout_ms: 5_000,
      model_load_timeout_ms: 10_000,
      detector: DetectorOptions::default(),
      camera: StreamConstraints::default(),
      font_path: None,
      style: RenderStyle::default(),
    }
  }
}

impl Config {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_toml_str(&content)
  }

  pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.detection_interval_ms == 0 {
      return Err(ConfigError::Invalid("detection_interval_ms 必须大于 0".to_string()));
    }
    if self.history_length == 0 {
      return Err(ConfigError::Invalid("history_length 必须大于 0".to_string()));
    }
    if self.camera.ideal_width == 0 || self.camera.ideal_height == 0 {
      return Err(ConfigError::Invalid("摄像头期望尺寸必须大于 0".to_string()));
    }
    self
      .detector
      .validate()
      .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    let label = &self.style.label;
    if !(0.0..=1.0).contains(&label.secondary_threshold) {
      return Err(ConfigError::Invalid(format!(
        "次要标签阈值 {} 必须在 0 到 1 之间",
        label.secondary_threshold
      )));
    }
    if label.font_size <= 0.0 || self.style.metrics.font_size <= 0.0 {
      return Err(ConfigError::Invalid("字号必须大于 0".to_string()));
    }
    Ok(())
  }

  /// 加载标签和指标面板使用的字体，没有配置字体时报错。
  pub fn label_font(&self) -> Result<FontArc, ConfigError> {
    let path = self.font_path.as_ref().ok_or_else(|| {
      ConfigError::Invalid("未设置标签字体，请在配置中设置 font_path 或使用 --font".to_string())
    })?;
    let data = std::fs::read(path).map_err(|source| ConfigError::FontIo {
      path: path.clone(),
      source,
    })?;
    FontArc::try_from_vec(data).map_err(|_| ConfigError::FontParse(path.clone()))
  }

  pub fn loop_settings(&self) -> LoopSettings {
    LoopSettings {
      interval: Duration::from_millis(self.detection_interval_ms),
      detector: self.detector,
      constraints: self.camera,
      history_length: self.history_length,
      ready_timeout: Duration::from_millis(self.ready_timeout_ms),
      load_timeout: Duration::from_millis(self.model_load_timeout_ms),
      style: self.style,
    }
  }
}

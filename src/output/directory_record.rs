// 该文件是 Yanse （察言观色） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
  fs::File,
  io::BufWriter,
  path::{Path, PathBuf},
};

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detection::DetectionFrame,
  output::{Present, Scene},
  stats::EmotionCounts,
  utils::{has_query_key, url_to_path},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// `?record` 模式下与原始画面一同保存的检测报告
#[derive(Serialize)]
struct Report<'a> {
  frame: u64,
  timestamp_ms: u64,
  recorded_at: DateTime<Utc>,
  counts: &'a EmotionCounts,
  detections: &'a DetectionFrame,
}

/// 按日期分目录保存画面。
///
/// - 默认保存带叠加层的画面；
/// - `?record` 保存原始画面，另写一份同名 JSON 报告；
/// - `?always` 没有检测到人脸的帧也保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: bool,
  always: bool,
  frame_counter: u16,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    Ok(DirectoryRecordOutput {
      directory: url_to_path(uri),
      record: has_query_key(uri, "record"),
      always: has_query_key(uri, "always"),
      frame_counter: 0,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&mut self) -> u16 {
    self.frame_counter = self.frame_counter.wrapping_add(1);
    self.frame_counter
  }

  /// `<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.png`
  fn frame_path(&mut self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    let filename = format!("{}-{:04X}.png", now.format("%H-%M-%S"), self.frame_id());
    Ok(directory.join(filename))
  }

  fn write_report(
    path: &Path,
    scene: &Scene<'_>,
    now: DateTime<Utc>,
  ) -> Result<(), DirectoryRecordOutputError> {
    let report = Report {
      frame: scene.frame.index,
      timestamp_ms: scene.frame.timestamp_ms,
      recorded_at: now,
      counts: scene.counts,
      detections: scene.detections,
    };
    let writer = BufWriter::new(File::create(path.with_extension("json"))?);
    serde_json::to_writer_pretty(writer, &report)?;
    Ok(())
  }
}

impl Present for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn present(&mut self, scene: &Scene<'_>) -> Result<(), Self::Error> {
    if !self.always && scene.detections.is_empty() {
      return Ok(());
    }

    let now = Utc::now();
    let path = self.frame_path(now)?;
    if self.record {
      scene.frame.image().save(&path)?;
      Self::write_report(&path, scene, now)?;
    } else {
      scene.composite().save(&path)?;
    }
    debug!("记录第 {} 帧: {}", scene.frame.index, path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    detection::{BoundingBox, Detection},
    emotion::{Emotion, ExpressionDistribution},
    frame::VideoFrame,
    stats::count_dominant,
    surface::RgbaSurface,
  };
  use image::RgbImage;

  fn collect_files(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
      for entry in std::fs::read_dir(current).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          pending.push(path);
        } else if path.extension().is_some_and(|e| e == ext) {
          found.push(path);
        }
      }
    }
    found
  }

  fn output_for(dir: &Path, query: &str) -> DirectoryRecordOutput {
    let url = Url::parse(&format!("folder://{}{}", dir.display(), query)).unwrap();
    DirectoryRecordOutput::from_url(&url).unwrap()
  }

  fn one_face() -> DetectionFrame {
    vec![Detection::new(
      BoundingBox::new(1.0, 1.0, 4.0, 4.0),
      ExpressionDistribution::from_pairs([(Emotion::Happy, 0.9)]),
    )]
    .into()
  }

  #[test]
  fn parses_query_flags() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_for(dir.path(), "?record&always");
    assert!(output.record && output.always);
    let output = output_for(dir.path(), "");
    assert!(!output.record && !output.always);
    assert_eq!(output.directory, dir.path());
  }

  #[test]
  fn skips_frames_without_faces_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let frame = VideoFrame::new(RgbImage::new(8, 8), 0, 0);
    let overlay = RgbaSurface::new(8, 8);
    let empty = DetectionFrame::empty();
    let scene = Scene {
      frame: &frame,
      overlay: &overlay,
      detections: &empty,
      counts: &EmotionCounts::default(),
    };

    output_for(dir.path(), "").present(&scene).unwrap();
    assert!(collect_files(dir.path(), "png").is_empty());

    output_for(dir.path(), "?always").present(&scene).unwrap();
    assert_eq!(collect_files(dir.path(), "png").len(), 1);
  }

  #[test]
  fn record_mode_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let frame = VideoFrame::new(RgbImage::new(8, 8), 42, 1234);
    let overlay = RgbaSurface::new(8, 8);
    let detections = one_face();
    let counts = count_dominant(&detections);
    let scene = Scene {
      frame: &frame,
      overlay: &overlay,
      detections: &detections,
      counts: &counts,
    };

    let mut output = output_for(dir.path(), "?record");
    output.present(&scene).unwrap();
    output.present(&scene).unwrap();

    let images = collect_files(dir.path(), "png");
    assert_eq!(images.len(), 2);
    let name = images[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.ends_with("-0001.png") || name.ends_with("-0002.png"));

    let reports = collect_files(dir.path(), "json");
    assert_eq!(reports.len(), 2);
    let report: serde_json::Value =
      serde_json::from_reader(File::open(&reports[0]).unwrap()).unwrap();
    assert_eq!(report["frame"], 42);
    assert_eq!(report["timestamp_ms"], 1234);
    assert_eq!(report["counts"]["happy"], 1);
    assert_eq!(report["detections"].as_array().unwrap().len(), 1);
  }

  #[test]
  fn frame_ids_wrap_around() {
    let dir = tempfile::tempdir().unwrap();
    let mut output = output_for(dir.path(), "");
    output.frame_counter = u16::MAX;
    assert_eq!(output.frame_id(), 0);
    assert_eq!(output.frame_id(), 1);
  }
}

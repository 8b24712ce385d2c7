// 该文件是 Yanse （察言观色） 项目的一部分。
// src/detection.rs - 人脸检测结果数据模型
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

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::emotion::ExpressionDistribution;

pub const LANDMARK_COUNT: usize = 68;

/// 68 点模型中各部位的下标范围
pub const NOSE: Range<usize> = 27..36;
pub const LEFT_EYE: Range<usize> = 36..42;
pub const RIGHT_EYE: Range<usize> = 42..48;
pub const MOUTH: Range<usize> = 48..68;

/// 鼻尖、左眼外角、右眼外角
pub const NOSE_TIP: usize = 30;
pub const LEFT_EYE_OUTER: usize = 36;
pub const RIGHT_EYE_OUTER: usize = 45;

#[derive(Error, Debug, PartialEq)]
pub enum DetectionDataError {
  #[error("关键点数量必须为 68，实际为 {0}")]
  LandmarkCount(usize),
  #[error("边界框尺寸不能为负: {width}x{height}")]
  NegativeBox { width: f32, height: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub const fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

impl From<(f32, f32)> for Point {
  fn from((x, y): (f32, f32)) -> Self {
    Self { x, y }
  }
}

#[derive(Deserialize)]
struct BoxRepr {
  x: f32,
  y: f32,
  width: f32,
  height: f32,
}

/// 帧像素坐标下的边界框，宽高不为负。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "BoxRepr")]
pub struct BoundingBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl TryFrom<BoxRepr> for BoundingBox {
  type Error = DetectionDataError;

  fn try_from(repr: BoxRepr) -> Result<Self, Self::Error> {
    if repr.width < 0.0 || repr.height < 0.0 {
      return Err(DetectionDataError::NegativeBox {
        width: repr.width,
        height: repr.height,
      });
    }
    Ok(Self {
      x: repr.x,
      y: repr.y,
      width: repr.width,
      height: repr.height,
    })
  }
}

impl BoundingBox {
  /// 负的宽高被截断为 0
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width: width.max(0.0),
      height: height.max(0.0),
    }
  }

  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }

  pub fn center_x(&self) -> f32 {
    self.x + self.width / 2.0
  }
}

/// 恰好 68 个点的人脸关键点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct LandmarkSet {
  points: Box<[Point]>,
}

impl TryFrom<Vec<Point>> for LandmarkSet {
  type Error = DetectionDataError;

  fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
    if points.len() != LANDMARK_COUNT {
      return Err(DetectionDataError::LandmarkCount(points.len()));
    }
    Ok(Self {
      points: points.into_boxed_slice(),
    })
  }
}

impl From<LandmarkSet> for Vec<Point> {
  fn from(set: LandmarkSet) -> Self {
    set.points.into_vec()
  }
}

impl LandmarkSet {
  pub fn points(&self) -> &[Point] {
    &self.points
  }

  pub fn point(&self, index: usize) -> Point {
    self.points[index]
  }

  pub fn nose(&self) -> &[Point] {
    &self.points[NOSE]
  }

  pub fn left_eye(&self) -> &[Point] {
    &self.points[LEFT_EYE]
  }

  pub fn right_eye(&self) -> &[Point] {
    &self.points[RIGHT_EYE]
  }

  pub fn mouth(&self) -> &[Point] {
    &self.points[MOUTH]
  }
}

fn default_score() -> f32 {
  1.0
}

/// 单帧中的一个人脸
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  #[serde(rename = "box")]
  pub bbox: BoundingBox,
  /// 检测器给出的人脸置信度
  #[serde(default = "default_score")]
  pub score: f32,
  #[serde(default)]
  pub landmarks: Option<LandmarkSet>,
  pub expressions: ExpressionDistribution,
}

impl Detection {
  pub fn new(bbox: BoundingBox, expressions: ExpressionDistribution) -> Self {
    Self {
      bbox,
      score: default_score(),
      landmarks: None,
      expressions,
    }
  }

  pub fn with_landmarks(mut self, landmarks: LandmarkSet) -> Self {
    self.landmarks = Some(landmarks);
    self
  }

  pub fn with_score(mut self, score: f32) -> Self {
    self.score = score;
    self
  }
}

/// 一次检测得到的全部人脸，创建后不可变，克隆只增加引用计数。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Detection>", into = "Vec<Detection>")]
pub struct DetectionFrame {
  items: Arc<[Detection]>,
}

impl From<Vec<Detection>> for DetectionFrame {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into(),
    }
  }
}

impl From<DetectionFrame> for Vec<Detection> {
  fn from(frame: DetectionFrame) -> Self {
    frame.items.to_vec()
  }
}

impl DetectionFrame {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  pub fn as_slice(&self) -> &[Detection] {
    &self.items
  }

  /// 是否与另一帧共享同一份数据
  pub fn ptr_eq(&self, other: &DetectionFrame) -> bool {
    Arc::ptr_eq(&self.items, &other.items)
  }
}

impl<'a> IntoIterator for &'a DetectionFrame {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

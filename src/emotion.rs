// 该文件是 Yanse （察言观色） 项目的一部分。
// src/emotion.rs - 表情词表与表情概率分布
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

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 表情词表，声明顺序即规范顺序，排序和取最大值时的并列都按此顺序决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
  Angry,
  Disgusted,
  Fearful,
  Happy,
  Neutral,
  Sad,
  Surprised,
}

impl Emotion {
  pub const COUNT: usize = 7;

  pub const ALL: [Emotion; Emotion::COUNT] = [
    Emotion::Angry,
    Emotion::Disgusted,
    Emotion::Fearful,
    Emotion::Happy,
    Emotion::Neutral,
    Emotion::Sad,
    Emotion::Surprised,
  ];

  /// 在规范顺序中的下标
  pub fn index(self) -> usize {
    self as usize
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Emotion::Angry => "angry",
      Emotion::Disgusted => "disgusted",
      Emotion::Fearful => "fearful",
      Emotion::Happy => "happy",
      Emotion::Neutral => "neutral",
      Emotion::Sad => "sad",
      Emotion::Surprised => "surprised",
    }
  }

  /// 首字母大写的显示名称
  pub fn title(self) -> &'static str {
    match self {
      Emotion::Angry => "Angry",
      Emotion::Disgusted => "Disgusted",
      Emotion::Fearful => "Fearful",
      Emotion::Happy => "Happy",
      Emotion::Neutral => "Neutral",
      Emotion::Sad => "Sad",
      Emotion::Surprised => "Surprised",
    }
  }
}

impl fmt::Display for Emotion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("未知的表情名称: {0}")]
pub struct UnknownEmotion(pub String);

impl FromStr for Emotion {
  type Err = UnknownEmotion;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Emotion::ALL
      .into_iter()
      .find(|e| e.as_str().eq_ignore_ascii_case(s))
      .ok_or_else(|| UnknownEmotion(s.to_string()))
  }
}

/// 单个人脸在 7 种表情上的概率。
///
/// 取值在构造时被规整到 `[0, 1]`，非有限值视为 0；总和不要求严格为 1。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(
  from = "HashMap<Emotion, f32>",
  into = "BTreeMap<Emotion, f32>"
)]
pub struct ExpressionDistribution {
  scores: [f32; Emotion::COUNT],
}

fn sanitize(p: f32) -> f32 {
  if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 }
}

impl ExpressionDistribution {
  pub fn new(scores: [f32; Emotion::COUNT]) -> Self {
    Self {
      scores: scores.map(sanitize),
    }
  }

  /// 由若干 (表情, 概率) 构造，未给出的表情概率为 0
  pub fn from_pairs<I: IntoIterator<Item = (Emotion, f32)>>(pairs: I) -> Self {
    let mut scores = [0.0; Emotion::COUNT];
    for (emotion, p) in pairs {
      scores[emotion.index()] = sanitize(p);
    }
    Self { scores }
  }

  pub fn get(&self, emotion: Emotion) -> f32 {
    self.scores[emotion.index()]
  }

  /// 按规范顺序遍历
  pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
    Emotion::ALL.into_iter().map(|e| (e, self.scores[e.index()]))
  }

  /// 按概率降序排列全部 7 项，概率相同的保持规范顺序（稳定排序）。
  pub fn ranked(&self) -> [(Emotion, f32); Emotion::COUNT] {
    let mut entries = Emotion::ALL.map(|e| (e, self.scores[e.index()]));
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries
  }

  /// 概率最大的表情；并列时取规范顺序中最先出现的一个。
  pub fn arg_max(&self) -> (Emotion, f32) {
    let mut best = (Emotion::ALL[0], self.scores[0]);
    for (emotion, p) in self.iter().skip(1) {
      if p > best.1 {
        best = (emotion, p);
      }
    }
    best
  }
}

impl From<HashMap<Emotion, f32>> for ExpressionDistribution {
  fn from(map: HashMap<Emotion, f32>) -> Self {
    Self::from_pairs(map)
  }
}

impl From<ExpressionDistribution> for BTreeMap<Emotion, f32> {
  fn from(dist: ExpressionDistribution) -> Self {
    dist.iter().collect()
  }
}

// 该文件是 Yanse （察言观色） 项目的一部分。
// src/stats.rs - 表情计数统计
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

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{detection::DetectionFrame, display::StatsSink, emotion::Emotion};

/// 每种表情在当前帧中作为主表情出现的人脸数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(into = "BTreeMap<Emotion, u32>")]
pub struct EmotionCounts([u32; Emotion::COUNT]);

impl EmotionCounts {
  pub fn get(&self, emotion: Emotion) -> u32 {
    self.0[emotion.index()]
  }

  pub fn total(&self) -> u32 {
    self.0.iter().sum()
  }

  /// 按固定顺序遍历
  pub fn iter(&self) -> impl Iterator<Item = (Emotion, u32)> + '_ {
    Emotion::ALL.into_iter().map(|e| (e, self.get(e)))
  }

  fn increment(&mut self, emotion: Emotion) {
    self.0[emotion.index()] += 1;
  }
}

impl From<EmotionCounts> for BTreeMap<Emotion, u32> {
  fn from(counts: EmotionCounts) -> Self {
    counts.iter().collect()
  }
}

/// 统计一帧中各主表情的人脸数，没有人脸时全为 0。
pub fn count_dominant(frame: &DetectionFrame) -> EmotionCounts {
  let mut counts = EmotionCounts::default();
  for detection in frame {
    counts.increment(detection.expressions.arg_max().0);
  }
  counts
}

/// 把最新帧的计数推给面板，数值上升的表情会被高亮。
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
  displayed: EmotionCounts,
}

impl StatsAggregator {
  pub fn new() -> Self {
    Self::default()
  }

  /// 当前已显示的计数
  pub fn displayed(&self) -> &EmotionCounts {
    &self.displayed
  }

  pub fn update<S: StatsSink + ?Sized>(&mut self, frame: &DetectionFrame, sink: &mut S) -> EmotionCounts {
    let counts = count_dominant(frame);
    for (emotion, count) in counts.iter() {
      sink.set_count(emotion, count);
      if count > self.displayed.get(emotion) {
        sink.highlight(emotion);
      }
    }
    self.displayed = counts;
    counts
  }

  /// 模型加载完成后计数归零
  pub fn reset<S: StatsSink + ?Sized>(&mut self, sink: &mut S) {
    self.displayed = EmotionCounts::default();
    for emotion in Emotion::ALL {
      sink.set_count(emotion, 0);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::{BoundingBox, Detection};
  use crate::emotion::ExpressionDistribution;

  #[derive(Default)]
  struct Recorder {
    counts: Vec<(Emotion, u32)>,
    highlighted: Vec<Emotion>,
  }

  impl StatsSink for Recorder {
    fn set_count(&mut self, emotion: Emotion, count: u32) {
      self.counts.push((emotion, count));
    }

    fn highlight(&mut self, emotion: Emotion) {
      self.highlighted.push(emotion);
    }
  }

  fn face(pairs: &[(Emotion, f32)]) -> Detection {
    Detection::new(
      BoundingBox::new(0.0, 0.0, 10.0, 10.0),
      ExpressionDistribution::from_pairs(pairs.iter().copied()),
    )
  }

  fn frame(faces: Vec<Detection>) -> DetectionFrame {
    faces.into()
  }

  #[test]
  fn counts_dominant_emotion_per_face() {
    let counts = count_dominant(&frame(vec![
      face(&[(Emotion::Happy, 0.8), (Emotion::Sad, 0.1)]),
      face(&[(Emotion::Happy, 0.6), (Emotion::Neutral, 0.3)]),
      face(&[(Emotion::Surprised, 0.9)]),
    ]));
    assert_eq!(counts.get(Emotion::Happy), 2);
    assert_eq!(counts.get(Emotion::Surprised), 1);
    assert_eq!(counts.get(Emotion::Sad), 0);
    assert_eq!(counts.total(), 3);
  }

  #[test]
  fn empty_frame_counts_zero() {
    assert_eq!(count_dominant(&DetectionFrame::empty()), EmotionCounts::default());
  }

  #[test]
  fn all_zero_distribution_counts_as_angry() {
    let counts = count_dominant(&frame(vec![face(&[])]));
    assert_eq!(counts.get(Emotion::Angry), 1);
  }

  #[test]
  fn update_sets_every_emotion_in_order() {
    let mut aggregator = StatsAggregator::new();
    let mut sink = Recorder::default();
    aggregator.update(&frame(vec![face(&[(Emotion::Sad, 0.7)])]), &mut sink);

    let emotions: Vec<Emotion> = sink.counts.iter().map(|(e, _)| *e).collect();
    assert_eq!(emotions, Emotion::ALL.to_vec());
    assert_eq!(sink.highlighted, vec![Emotion::Sad]);
  }

  #[test]
  fn only_increases_are_highlighted() {
    let mut aggregator = StatsAggregator::new();
    let mut sink = Recorder::default();
    aggregator.update(
      &frame(vec![face(&[(Emotion::Happy, 0.9)]), face(&[(Emotion::Sad, 0.9)])]),
      &mut sink,
    );

    let mut sink = Recorder::default();
    let counts = aggregator.update(
      &frame(vec![
        face(&[(Emotion::Happy, 0.9)]),
        face(&[(Emotion::Happy, 0.8)]),
      ]),
      &mut sink,
    );
    assert_eq!(counts.get(Emotion::Happy), 2);
    assert_eq!(counts.get(Emotion::Sad), 0);
    assert_eq!(sink.highlighted, vec![Emotion::Happy]);

    // 相同计数不再高亮
    let mut sink = Recorder::default();
    aggregator.update(
      &frame(vec![
        face(&[(Emotion::Happy, 0.9)]),
        face(&[(Emotion::Happy, 0.8)]),
      ]),
      &mut sink,
    );
    assert!(sink.highlighted.is_empty());
  }

  #[test]
  fn reset_zeroes_display() {
    let mut aggregator = StatsAggregator::new();
    let mut sink = Recorder::default();
    aggregator.update(&frame(vec![face(&[(Emotion::Fearful, 0.9)])]), &mut sink);

    let mut sink = Recorder::default();
    aggregator.reset(&mut sink);
    assert_eq!(aggregator.displayed(), &EmotionCounts::default());
    assert_eq!(sink.counts.len(), Emotion::COUNT);
    assert!(sink.counts.iter().all(|(_, c)| *c == 0));
  }

  #[test]
  fn serializes_as_named_map() {
    let counts = count_dominant(&frame(vec![face(&[(Emotion::Neutral, 0.9)])]));
    let json = serde_json::to_value(counts).unwrap();
    assert_eq!(json["neutral"], 1);
    assert_eq!(json["happy"], 0);
  }
}

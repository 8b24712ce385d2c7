// 该文件是 Yanse （察言观色） 项目的一部分。
// src/history.rs - 最近检测结果缓存
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

use std::collections::VecDeque;

use crate::detection::DetectionFrame;

pub const DEFAULT_HISTORY_LENGTH: usize = 5;

/// 定长的检测结果队列，最新的在最前，超出容量时淘汰最旧的。
#[derive(Debug, Clone)]
pub struct DetectionHistory {
  frames: VecDeque<DetectionFrame>,
  capacity: usize,
}

impl Default for DetectionHistory {
  fn default() -> Self {
    Self::with_capacity(DEFAULT_HISTORY_LENGTH)
  }
}

impl DetectionHistory {
  /// 容量至少为 1
  pub fn with_capacity(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      frames: VecDeque::with_capacity(capacity + 1),
      capacity,
    }
  }

  pub fn push(&mut self, frame: DetectionFrame) {
    self.frames.push_front(frame);
    while self.frames.len() > self.capacity {
      self.frames.pop_back();
    }
  }

  pub fn latest(&self) -> Option<&DetectionFrame> {
    self.frames.front()
  }

  /// 从新到旧遍历
  pub fn iter(&self) -> impl Iterator<Item = &DetectionFrame> {
    self.frames.iter()
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn clear(&mut self) {
    self.frames.clear();
  }
}

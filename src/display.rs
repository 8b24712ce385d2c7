// 该文件是 Yanse （察言观色） 项目的一部分。
// src/display.rs - 状态与统计面板
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
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::{Duration, Instant},
};

use crate::emotion::Emotion;

/// 计数上升后保持高亮的时长
pub const HIGHLIGHT_DURATION: Duration = Duration::from_millis(300);

/// 显示一行状态文字
pub trait StatusSink {
  fn set_status(&mut self, text: &str);
}

/// 显示各表情的计数
pub trait StatsSink {
  fn set_count(&mut self, emotion: Emotion, count: u32);
  /// 计数上升时短暂高亮
  fn highlight(&mut self, emotion: Emotion);
}

/// 检测循环需要的全部显示能力
pub trait Display: StatusSink + StatsSink + Send {}

impl<T: StatusSink + StatsSink + Send> Display for T {}

/// 终端面板：保存最新的状态和计数，并通过 tracing 输出变化。
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
  status: String,
  counts: [u32; Emotion::COUNT],
  highlighted_at: [Option<Instant>; Emotion::COUNT],
}

impl Dashboard {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn status(&self) -> &str {
    &self.status
  }

  pub fn count(&self, emotion: Emotion) -> u32 {
    self.counts[emotion.index()]
  }

  pub fn is_highlighted(&self, emotion: Emotion, now: Instant) -> bool {
    self.highlighted_at[emotion.index()]
      .is_some_and(|at| now.saturating_duration_since(at) < HIGHLIGHT_DURATION)
  }

  /// 一行摘要，如 `angry: 0 | happy: 2 | ...`
  pub fn summary(&self) -> String {
    Emotion::ALL
      .iter()
      .map(|e| format!("{}: {}", e, self.count(*e)))
      .collect::<Vec<_>>()
      .join(" | ")
  }
}

impl StatusSink for Dashboard {
  fn set_status(&mut self, text: &str) {
    if self.status != text {
      tracing::info!("状态: {}", text);
      self.status = text.to_string();
    }
  }
}

impl StatsSink for Dashboard {
  fn set_count(&mut self, emotion: Emotion, count: u32) {
    let slot = &mut self.counts[emotion.index()];
    if *slot != count {
      tracing::debug!("{} 计数 {} -> {}", emotion, slot, count);
      *slot = count;
    }
  }

  fn highlight(&mut self, emotion: Emotion) {
    self.highlighted_at[emotion.index()] = Some(Instant::now());
  }
}

/// 在检测循环和主程序之间共享的面板
#[derive(Debug, Clone, Default)]
pub struct SharedDashboard(Arc<Mutex<Dashboard>>);

impl SharedDashboard {
  pub fn new() -> Self {
    Self::default()
  }

  /// 面板只存放展示数据，锁中毒后继续使用其内容
  pub fn lock(&self) -> MutexGuard<'_, Dashboard> {
    self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl StatusSink for SharedDashboard {
  fn set_status(&mut self, text: &str) {
    self.lock().set_status(text);
  }
}

impl StatsSink for SharedDashboard {
  fn set_count(&mut self, emotion: Emotion, count: u32) {
    self.lock().set_count(emotion, count);
  }

  fn highlight(&mut self, emotion: Emotion) {
    self.lock().highlight(emotion);
  }
}

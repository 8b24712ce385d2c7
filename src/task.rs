// 该文件是 Yanse （察言观色） 项目的一部分。
// src/task.rs - 检测循环
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
  sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use ab_glyph::FontArc;
use image::RgbaImage;
use thiserror::Error;
use tokio::{
  task::JoinHandle,
  time::{Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::{
  detection::DetectionFrame,
  display::{Display, StatusSink},
  history::{DEFAULT_HISTORY_LENGTH, DetectionHistory},
  input::{MediaAccessError, MediaSource, StreamConstraints, VideoStream},
  model::{AssetLoadError, DetectorOptions, FrameDetector},
  output::{BoxedOutput, Scene},
  render::Renderer,
  stats::{EmotionCounts, StatsAggregator},
  style::RenderStyle,
  surface::{RgbaSurface, Surface},
};

/// 等待视频流就绪时的轮询间隔
const READY_POLL_INTERVAL: Duration = Duration::from_millis(20);

const STATUS_LOADING: &str = "Loading models...";
const STATUS_LOADED: &str = "Models loaded! Start the camera to begin.";
const STATUS_STARTING: &str = "Starting camera...";
const STATUS_RUNNING: &str = "Camera started! Detecting emotions...";
const STATUS_STOPPED: &str = "Camera stopped. Start the camera to begin again.";

/// 检测循环的生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
  /// 模型尚未加载
  Loading,
  /// 模型已加载，摄像头未开
  Idle,
  /// 正在打开摄像头并等待第一帧
  Capturing,
  /// 定时检测中
  Running,
  /// 模型加载失败，只能重新启动程序
  Failed,
}

impl LoopState {
  pub fn can_start(self) -> bool {
    self == LoopState::Idle
  }

  pub fn can_stop(self) -> bool {
    matches!(self, LoopState::Capturing | LoopState::Running)
  }
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
  /// 检测间隔
  pub interval: Duration,
  pub detector: DetectorOptions,
  pub constraints: StreamConstraints,
  pub history_length: usize,
  /// 打开摄像头后等待第一帧的最长时间
  pub ready_timeout: Duration,
  pub load_timeout: Duration,
  pub style: RenderStyle,
}

impl Default for LoopSettings {
  fn default() -> Self {
    Self {
      interval: Duration::from_millis(100),
      detector: DetectorOptions::default(),
      constraints: StreamConstraints::default(),
      history_length: DEFAULT_HISTORY_LENGTH,
      ready_timeout: Duration::from_secs(5),
      load_timeout: Duration::from_secs(10),
      style: RenderStyle::default(),
    }
  }
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error(transparent)]
  Asset(#[from] AssetLoadError),
  #[error(transparent)]
  Media(#[from] MediaAccessError),
  #[error("模型尚未加载")]
  NotLoaded,
  #[error("模型加载失败，请重新启动程序")]
  Failed,
}

/// 单次检测的结果，便于日志与测试观察
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
  /// 上一次检测还没结束
  Overlapped,
  /// 未在运行或没有可用画面
  Skipped,
  /// 检测期间循环被停止或重启，结果作废
  Discarded,
  DetectionFailed,
  /// 绘制完成，附带人脸数
  Rendered(usize),
}

struct Session<S> {
  state: LoopState,
  stream: Option<S>,
  timer: Option<JoinHandle<()>>,
  surface: RgbaSurface,
  history: DetectionHistory,
  stats: StatsAggregator,
  display: Box<dyn Display>,
  outputs: Vec<BoxedOutput>,
}

struct Shared<D, M: MediaSource> {
  detector: D,
  source: Mutex<M>,
  settings: LoopSettings,
  renderer: Renderer,
  session: Mutex<Session<M::Stream>>,
  /// 正在检测的那一轮的 epoch，空闲时为 `IDLE_EPOCH`
  in_flight: AtomicU64,
  /// 每次停止或重新开始都会加一，用来丢弃过期的检测结果
  epoch: AtomicU64,
  rendered: AtomicU64,
}

const IDLE_EPOCH: u64 = u64::MAX;

/// 离开作用域时清除自己那一轮的忙标记，不影响重启后的新检测
struct BusyGuard<'a> {
  in_flight: &'a AtomicU64,
  epoch: u64,
}

impl<'a> BusyGuard<'a> {
  /// 同一轮已经有检测在进行时返回 `None`
  fn acquire(in_flight: &'a AtomicU64, epoch: u64) -> Option<Self> {
    let mut current = in_flight.load(Ordering::Acquire);
    loop {
      if current == epoch {
        return None;
      }
      match in_flight.compare_exchange_weak(current, epoch, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => return Some(Self { in_flight, epoch }),
        Err(actual) => current = actual,
      }
    }
  }
}

impl Drop for BusyGuard<'_> {
  fn drop(&mut self) {
    let _ = self.in_flight.compare_exchange(
      self.epoch,
      IDLE_EPOCH,
      Ordering::AcqRel,
      Ordering::Acquire,
    );
  }
}

impl<D: FrameDetector, M: MediaSource> Shared<D, M> {
  fn session(&self) -> MutexGuard<'_, Session<M::Stream>> {
    self.session.lock().unwrap_or_else(PoisonError::into_inner)
  }

  async fn tick(&self) -> TickOutcome {
    let epoch = self.epoch.load(Ordering::Acquire);
    let Some(_busy) = BusyGuard::acquire(&self.in_flight, epoch) else {
      return TickOutcome::Overlapped;
    };

    let frame = {
      let mut session = self.session();
      if session.state != LoopState::Running {
        return TickOutcome::Skipped;
      }
      let Some(stream) = session.stream.as_mut() else {
        return TickOutcome::Skipped;
      };
      if !stream.is_active() {
        return TickOutcome::Skipped;
      }
      let (width, height) = stream.dimensions();
      if width == 0 || height == 0 {
        return TickOutcome::Skipped;
      }
      let Some(frame) = stream.current_frame() else {
        return TickOutcome::Skipped;
      };
      if frame.is_empty() {
        return TickOutcome::Skipped;
      }
      if session.surface.dimensions() != (width, height) {
        debug!("视频尺寸变为 {}x{}，调整叠加层", width, height);
        session.surface.resize(width, height);
      }
      frame
    };

    let started = std::time::Instant::now();
    let result = self.detector.detect(&frame, &self.settings.detector).await;
    let elapsed = started.elapsed();

    let mut session = self.session();
    if self.epoch.load(Ordering::Acquire) != epoch || session.state != LoopState::Running {
      debug!("第 {} 帧的检测结果已过期，丢弃", frame.index);
      return TickOutcome::Discarded;
    }

    let detections = match result {
      Ok(detections) => detections,
      Err(err) => {
        warn!("第 {} 帧检测失败: {}", frame.index, err);
        return TickOutcome::DetectionFailed;
      }
    };
    trace!("第 {} 帧检测到 {} 张人脸，耗时 {:.2?}", frame.index, detections.len(), elapsed);

    session.history.push(detections.clone());

    let Session {
      surface,
      stats,
      display,
      outputs,
      ..
    } = &mut *session;
    if surface.dimensions() != frame.dimensions() {
      let (width, height) = frame.dimensions();
      surface.resize(width, height);
    }
    self.renderer.render(surface, &detections);
    let counts = stats.update(&detections, display.as_mut());

    let scene = Scene {
      frame: &frame,
      overlay: surface,
      detections: &detections,
      counts: &counts,
    };
    for output in outputs.iter_mut() {
      if let Err(err) = output.present(&scene) {
        warn!("输出第 {} 帧失败: {}", frame.index, err);
      }
    }

    self.rendered.fetch_add(1, Ordering::Relaxed);
    TickOutcome::Rendered(detections.len())
  }
}

/// 定时从视频流取帧、检测、绘制并统计。
///
/// 同一时刻最多一个检测在进行；停止后仍在进行的检测结果会被丢弃。
pub struct DetectionLoop<D: FrameDetector, M: MediaSource> {
  shared: Arc<Shared<D, M>>,
}

impl<D: FrameDetector, M: MediaSource> DetectionLoop<D, M> {
  pub fn new<S: Display + 'static>(detector: D, source: M, display: S, settings: LoopSettings) -> Self {
    let session = Session {
      state: LoopState::Loading,
      stream: None,
      timer: None,
      surface: RgbaSurface::new(0, 0),
      history: DetectionHistory::with_capacity(settings.history_length),
      stats: StatsAggregator::new(),
      display: Box::new(display),
      outputs: Vec::new(),
    };
    Self {
      shared: Arc::new(Shared {
        detector,
        source: Mutex::new(source),
        renderer: Renderer::new(settings.style),
        settings,
        session: Mutex::new(session),
        in_flight: AtomicU64::new(IDLE_EPOCH),
        epoch: AtomicU64::new(0),
        rendered: AtomicU64::new(0),
      }),
    }
  }

  /// 标签文字使用的字体，不设置时不绘制文字
  pub fn set_font(&self, font: Option<FontArc>) {
    let mut session = self.shared.session();
    let (width, height) = session.surface.dimensions();
    session.surface = RgbaSurface::new(width, height).with_font(font);
  }

  pub fn add_output(&self, output: BoxedOutput) {
    self.shared.session().outputs.push(output);
  }

  pub fn detector(&self) -> &D {
    &self.shared.detector
  }

  pub fn settings(&self) -> &LoopSettings {
    &self.shared.settings
  }

  pub fn state(&self) -> LoopState {
    self.shared.session().state
  }

  /// 最近的检测结果，最新的在前
  pub fn history(&self) -> Vec<DetectionFrame> {
    self.shared.session().history.iter().cloned().collect()
  }

  pub fn latest_detections(&self) -> Option<DetectionFrame> {
    self.shared.session().history.latest().cloned()
  }

  pub fn displayed_counts(&self) -> EmotionCounts {
    *self.shared.session().stats.displayed()
  }

  pub fn surface_dimensions(&self) -> (u32, u32) {
    self.shared.session().surface.dimensions()
  }

  /// 当前叠加层的拷贝
  pub fn overlay(&self) -> RgbaImage {
    self.shared.session().surface.image().clone()
  }

  /// 已完成绘制的帧数
  pub fn rendered_frames(&self) -> u64 {
    self.shared.rendered.load(Ordering::Relaxed)
  }

  pub fn is_timer_armed(&self) -> bool {
    self.shared.session().timer.is_some()
  }

  fn set_status(&self, text: &str) {
    self.shared.session().display.set_status(text);
  }

  /// 加载模型，超时或失败后进入 `Failed` 状态。
  pub async fn load_models(&self, base: &Url) -> Result<(), TaskError> {
    {
      let mut session = self.shared.session();
      match session.state {
        LoopState::Loading => {}
        LoopState::Failed => return Err(TaskError::Failed),
        _ => return Ok(()),
      }
      session.display.set_status(STATUS_LOADING);
    }
    info!("从 {} 加载模型...", base);

    let timeout = self.shared.settings.load_timeout;
    let result = match tokio::time::timeout(timeout, self.shared.detector.load_models(base)).await {
      Ok(result) => result,
      Err(_) => Err(AssetLoadError::Timeout(timeout)),
    };

    let mut session = self.shared.session();
    match result {
      Ok(()) => {
        session.state = LoopState::Idle;
        let Session { stats, display, .. } = &mut *session;
        stats.reset(display.as_mut());
        display.set_status(STATUS_LOADED);
        info!("模型加载完成");
        Ok(())
      }
      Err(err) => {
        session.state = LoopState::Failed;
        session
          .display
          .set_status(&format!("Error loading models: {err}"));
        error!("模型加载失败: {}", err);
        Err(err.into())
      }
    }
  }

  /// 打开摄像头，等待第一帧后开始定时检测。
  ///
  /// 已经在运行时什么也不做。
  pub async fn start(&self) -> Result<(), TaskError> {
    let epoch = {
      let mut session = self.shared.session();
      match session.state {
        LoopState::Idle => {}
        LoopState::Capturing | LoopState::Running => return Ok(()),
        LoopState::Loading => return Err(TaskError::NotLoaded),
        LoopState::Failed => return Err(TaskError::Failed),
      }
      session.state = LoopState::Capturing;
      session.display.set_status(STATUS_STARTING);
      self.shared.epoch.fetch_add(1, Ordering::AcqRel) + 1
    };

    // 打开设备可能阻塞到摄像头就绪，放到阻塞线程池里执行
    let shared = self.shared.clone();
    let opened = tokio::task::spawn_blocking(move || {
      shared
        .source
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .open(&shared.settings.constraints)
    })
    .await
    .unwrap_or_else(|err| Err(MediaAccessError::Device(format!("打开摄像头的任务失败: {err}"))));

    let mut stream = match opened {
      Ok(stream) => stream,
      Err(err) => {
        let mut session = self.shared.session();
        if self.shared.epoch.load(Ordering::Acquire) == epoch {
          session.state = LoopState::Idle;
        }
        session
          .display
          .set_status(&format!("Error accessing camera: {err}"));
        warn!("无法打开摄像头: {}", err);
        return Err(err.into());
      }
    };

    let deadline = Instant::now() + self.shared.settings.ready_timeout;
    let (width, height) = loop {
      if self.shared.epoch.load(Ordering::Acquire) != epoch {
        debug!("等待就绪期间被停止");
        stream.stop();
        return Ok(());
      }
      let (width, height) = stream.dimensions();
      if stream.is_active() && width > 0 && height > 0 {
        break (width, height);
      }
      if Instant::now() >= deadline {
        stream.stop();
        let err = MediaAccessError::NotReady;
        let mut session = self.shared.session();
        if self.shared.epoch.load(Ordering::Acquire) == epoch {
          session.state = LoopState::Idle;
        }
        session
          .display
          .set_status(&format!("Error accessing camera: {err}"));
        warn!("摄像头在 {:?} 内没有就绪", self.shared.settings.ready_timeout);
        return Err(err.into());
      }
      tokio::time::sleep(READY_POLL_INTERVAL).await;
    };

    let mut session = self.shared.session();
    if self.shared.epoch.load(Ordering::Acquire) != epoch || session.state != LoopState::Capturing {
      drop(session);
      stream.stop();
      return Ok(());
    }
    session.surface.resize(width, height);
    session.stream = Some(stream);
    session.timer = Some(self.arm_timer());
    session.state = LoopState::Running;
    session.display.set_status(STATUS_RUNNING);
    info!(
      "摄像头就绪 {}x{}，每 {:?} 检测一次",
      width, height, self.shared.settings.interval
    );
    Ok(())
  }

  fn arm_timer(&self) -> JoinHandle<()> {
    let shared = self.shared.clone();
    let period = shared.settings.interval;
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
      loop {
        ticker.tick().await;
        // 每次检测单独一个任务，检测卡住时定时器照常运行
        let shared = shared.clone();
        tokio::spawn(async move {
          let outcome = shared.tick().await;
          trace!("定时检测: {:?}", outcome);
        });
      }
    })
  }

  /// 立即执行一次检测
  pub async fn tick(&self) -> TickOutcome {
    self.shared.tick().await
  }

  /// 停止检测并释放摄像头，可重复调用。
  ///
  /// 会同步等待视频流释放设备（V4L2 采集线程最多再取一帧），
  /// 保证随后的 `start` 能重新打开同一个设备。
  pub fn stop(&self) {
    self.shared.epoch.fetch_add(1, Ordering::AcqRel);
    let stream = {
      let mut session = self.shared.session();
      if !session.state.can_stop() {
        return;
      }
      if let Some(timer) = session.timer.take() {
        timer.abort();
      }
      session.surface.clear();
      session.state = LoopState::Idle;
      session.display.set_status(STATUS_STOPPED);
      session.stream.take()
    };
    if let Some(mut stream) = stream {
      stream.stop();
    }
    info!("检测已停止");
  }

  /// 窗口或视频尺寸变化时调整叠加层，返回是否调整了尺寸。
  pub fn handle_viewport_resize(&self) -> bool {
    let mut session = self.shared.session();
    let Some((width, height)) = session.stream.as_ref().map(VideoStream::dimensions) else {
      return false;
    };
    if width == 0 || height == 0 || session.surface.dimensions() == (width, height) {
      return false;
    }
    session.surface.resize(width, height);
    debug!("叠加层调整为 {}x{}", width, height);
    true
  }
}

impl<D: FrameDetector, M: MediaSource> Drop for DetectionLoop<D, M> {
  fn drop(&mut self) {
    let mut session = self.shared.session();
    if let Some(timer) = session.timer.take() {
      timer.abort();
    }
    if let Some(mut stream) = session.stream.take() {
      stream.stop();
    }
  }
}

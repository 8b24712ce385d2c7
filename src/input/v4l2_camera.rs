// 该文件是 Yanse （察言观色） 项目的一部分。
// src/input/v4l2_camera.rs - V4L2 摄像头输入
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
  path::PathBuf,
  sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
    mpsc,
  },
  thread::{self, JoinHandle},
  time::Instant,
};

use image::RgbImage;
use tracing::{debug, error, info, warn};
use url::Url;
use v4l::{
  Device, FourCC, buffer::Type, io::mmap::Stream, io::traits::CaptureStream, video::Capture,
};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::VideoFrame,
  input::{InputError, MediaAccessError, MediaSource, StreamConstraints, VideoStream},
  utils::url_to_path,
};

const DEFAULT_DEVICE: &str = "/dev/video0";
const BUFFER_COUNT: u32 = 4;
/// 连续取帧失败这么多次后停止采集
const MAX_CONSECUTIVE_ERRORS: u32 = 30;

/// V4L2 摄像头，打开时在后台线程中采集 YUYV 画面。
pub struct V4l2Camera {
  device_path: PathBuf,
}

impl FromUrlWithScheme for V4l2Camera {
  const SCHEME: &'static str = "v4l2";
}

impl FromUrl for V4l2Camera {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    // v4l2:///dev/video0，路径为空时使用默认设备
    let path = url_to_path(url);
    let device_path = if path.as_os_str().is_empty() || path == PathBuf::from("/") {
      PathBuf::from(DEFAULT_DEVICE)
    } else {
      path
    };
    Ok(Self { device_path })
  }
}

/// 将 YUYV 格式转换为 RGB
fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Option<RgbImage> {
  let mut rgb = Vec::with_capacity((width * height * 3) as usize);

  for chunk in yuyv.chunks_exact(4) {
    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    for y in [y0, y1] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb.truncate((width * height * 3) as usize);
  RgbImage::from_raw(width, height, rgb)
}

fn open_device(
  device_path: &PathBuf,
  constraints: &StreamConstraints,
) -> Result<(Device, u32, u32), MediaAccessError> {
  let what = device_path.display().to_string();
  let device = Device::with_path(device_path).map_err(|e| MediaAccessError::from_io(e, &what))?;

  let mut format = device
    .format()
    .map_err(|e| MediaAccessError::Device(format!("{what}: {e}")))?;
  format.width = constraints.ideal_width;
  format.height = constraints.ideal_height;
  format.fourcc = FourCC::new(b"YUYV");
  let format = device
    .set_format(&format)
    .map_err(|e| MediaAccessError::Device(format!("{what}: {e}")))?;

  if format.fourcc != FourCC::new(b"YUYV") {
    return Err(MediaAccessError::UnsupportedFormat(format!(
      "{what} 只支持 {}",
      format.fourcc
    )));
  }
  Ok((device, format.width, format.height))
}

impl MediaSource for V4l2Camera {
  type Stream = V4l2Stream;

  /// 阻塞到采集线程完成格式协商
  fn open(&mut self, constraints: &StreamConstraints) -> Result<Self::Stream, MediaAccessError> {
    debug!("V4L2 设备不区分朝向，忽略 {:?}", constraints.facing_mode);

    let latest: Arc<Mutex<Option<VideoFrame>>> = Arc::new(Mutex::new(None));
    let stop = Arc::new(AtomicBool::new(false));
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);

    let device_path = self.device_path.clone();
    let constraints = *constraints;
    let thread_latest = latest.clone();
    let thread_stop = stop.clone();

    // 设备和映射缓冲都在采集线程里创建，避免跨线程借用
    let handle = thread::Builder::new()
      .name("v4l2-capture".to_string())
      .spawn(move || {
        let (device, width, height) = match open_device(&device_path, &constraints) {
          Ok(opened) => opened,
          Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
          }
        };
        let mut stream = match Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT) {
          Ok(stream) => stream,
          Err(err) => {
            let _ = ready_tx.send(Err(MediaAccessError::Io(err)));
            return;
          }
        };
        let _ = ready_tx.send(Ok((width, height)));

        let started = Instant::now();
        let mut index = 0u64;
        let mut errors = 0u32;
        while !thread_stop.load(Ordering::Acquire) {
          match stream.next() {
            Ok((buffer, _meta)) => {
              errors = 0;
              let Some(image) = yuyv_to_rgb(buffer, width, height) else {
                warn!("帧数据长度 {} 与 {}x{} 不符", buffer.len(), width, height);
                continue;
              };
              let frame = VideoFrame::new(image, index, started.elapsed().as_millis() as u64);
              index += 1;
              *thread_latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
            }
            Err(err) => {
              errors += 1;
              warn!("无法捕获帧: {}", err);
              if errors >= MAX_CONSECUTIVE_ERRORS {
                error!("连续 {} 次取帧失败，停止采集", errors);
                break;
              }
            }
          }
        }
        debug!("采集线程退出");
      })
      .map_err(MediaAccessError::Io)?;

    let (width, height) = match ready_rx.recv() {
      Ok(Ok(size)) => size,
      Ok(Err(err)) => {
        let _ = handle.join();
        return Err(err);
      }
      Err(_) => {
        let _ = handle.join();
        return Err(MediaAccessError::Device("采集线程意外退出".to_string()));
      }
    };
    info!(
      "打开摄像头 {}，格式 YUYV {}x{}",
      self.device_path.display(),
      width,
      height
    );

    Ok(V4l2Stream {
      latest,
      stop,
      handle: Some(handle),
    })
  }
}

pub struct V4l2Stream {
  latest: Arc<Mutex<Option<VideoFrame>>>,
  stop: Arc<AtomicBool>,
  handle: Option<JoinHandle<()>>,
}

impl V4l2Stream {
  fn latest(&self) -> std::sync::MutexGuard<'_, Option<VideoFrame>> {
    self.latest.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl VideoStream for V4l2Stream {
  fn is_active(&self) -> bool {
    self.handle.as_ref().is_some_and(|h| !h.is_finished())
  }

  fn dimensions(&self) -> (u32, u32) {
    self.latest().as_ref().map_or((0, 0), VideoFrame::dimensions)
  }

  fn current_frame(&mut self) -> Option<VideoFrame> {
    self.latest().clone()
  }

  /// 阻塞到采集线程退出并关闭设备，最多再等一帧
  fn stop(&mut self) {
    self.stop.store(true, Ordering::Release);
    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        error!("采集线程异常退出");
      }
      info!("摄像头已释放");
    }
    self.latest().take();
  }
}

impl Drop for V4l2Stream {
  fn drop(&mut self) {
    self.stop();
  }
}

// 该文件是 Yanse （察言观色） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{sync::Notify, time::Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use yanse::{
  FromUrl,
  config::Config,
  display::SharedDashboard,
  input::InputWrapper,
  model::ReplayDetector,
  output::OutputWrapper,
  task::DetectionLoop,
};

/// 摘要日志与尺寸检查的间隔
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

async fn sleep_until(deadline: Option<Instant>) {
  match deadline {
    Some(deadline) => tokio::time::sleep_until(deadline).await,
    None => std::future::pending().await,
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  let mut config = match &args.config {
    Some(path) => Config::load(path)?,
    None => Config::default(),
  };
  if let Some(interval_ms) = args.interval_ms {
    config.detection_interval_ms = interval_ms;
  }
  if let Some(font) = &args.font {
    config.font_path = Some(font.clone());
  }
  config.validate()?;
  // 没有字体时标签和指标面板只剩背景，直接拒绝启动
  let font = config.label_font()?;

  info!("模型位置: {}", args.model);
  info!("输入来源: {}", args.input);
  for output in &args.output {
    info!("输出路径: {}", output);
  }

  let input = InputWrapper::from_url(&args.input)?;
  let dashboard = SharedDashboard::new();
  let detection = DetectionLoop::new(
    ReplayDetector::new(),
    input,
    dashboard.clone(),
    config.loop_settings(),
  );

  detection.set_font(Some(font));
  for url in &args.output {
    detection.add_output(Box::new(OutputWrapper::from_url(url)?));
  }

  let shutdown = Arc::new(Notify::new());
  {
    let shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      shutdown.notify_one();
    })
    .context("无法设置 Ctrl-C 处理")?;
  }

  detection.load_models(&args.model).await?;
  detection.start().await?;

  let deadline = (args.duration_secs > 0)
    .then(|| Instant::now() + Duration::from_secs(args.duration_secs));
  let mut report = tokio::time::interval(REPORT_INTERVAL);

  loop {
    tokio::select! {
      _ = shutdown.notified() => {
        warn!("中断信号接收，退出检测循环");
        break;
      }
      _ = sleep_until(deadline) => {
        info!("达到运行时长 {} 秒，退出检测循环", args.duration_secs);
        break;
      }
      _ = report.tick() => {
        detection.handle_viewport_resize();
        let frames = detection.rendered_frames();
        info!("已处理 {} 帧 | {}", frames, dashboard.lock().summary());
        if args.frame_number > 0 && frames >= args.frame_number as u64 {
          info!("达到指定帧数 {}, 退出检测循环", args.frame_number);
          break;
        }
      }
    }
  }

  detection.stop();
  info!("最终统计: {}", dashboard.lock().summary());
  info!("状态: {}", dashboard.lock().status());

  Ok(())
}

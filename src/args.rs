// 该文件是 Yanse （察言观色） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// Yanse 实时表情识别可视化
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型位置，例如 replay:///path/to/recording 或 file:///path/detections.jsonl
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 视频输入，例如 image:///path/face.png 或 v4l2:///dev/video0
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出，可重复，例如 image:///tmp/preview.png 或 folder:///tmp/records?record
  #[arg(long, value_name = "OUTPUT")]
  pub output: Vec<Url>,

  /// TOML 配置文件
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 标签字体，覆盖配置文件中的 font_path
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,

  /// 检测间隔（毫秒），覆盖配置文件
  #[arg(long, value_name = "MILLIS")]
  pub interval_ms: Option<u64>,

  /// 处理这么多帧后退出，0 表示不限制
  #[arg(long, value_name = "FRAME_NUMBER", default_value_t = 0)]
  pub frame_number: usize,

  /// 运行这么多秒后退出，0 表示不限制
  #[arg(long, value_name = "SECONDS", default_value_t = 0)]
  pub duration_secs: u64,
}

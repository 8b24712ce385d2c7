// 该文件是 Yanse （察言观色） 项目的一部分。
// tests/detection_loop.rs - 检测循环端到端测试
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

#![cfg(all(
  feature = "read_image_file",
  feature = "directory_record",
  feature = "save_image_file",
  feature = "model_replay"
))]

use std::{io::Write, path::Path, time::Duration};

use image::{Rgb, RgbImage};
use url::Url;
use yanse::{
  FromUrl,
  detection::{BoundingBox, Detection, DetectionFrame},
  display::SharedDashboard,
  emotion::{Emotion, ExpressionDistribution},
  input::StillImageSource,
  model::{ReplayDetector, ScriptedDetector},
  output::OutputWrapper,
  task::{DetectionLoop, LoopSettings, LoopState, TickOutcome},
};

fn manual_settings() -> LoopSettings {
  LoopSettings {
    interval: Duration::from_secs(3600),
    ..LoopSettings::default()
  }
}

fn count_files(dir: &Path, ext: &str) -> usize {
  let mut count = 0;
  let mut pending = vec![dir.to_path_buf()];
  while let Some(current) = pending.pop() {
    for entry in std::fs::read_dir(current).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        pending.push(path);
      } else if path.extension().is_some_and(|e| e == ext) {
        count += 1;
      }
    }
  }
  count
}

#[tokio::test]
async fn still_image_through_scripted_detector() {
  let dir = tempfile::tempdir().unwrap();
  let detections: DetectionFrame = vec![
    Detection::new(
      BoundingBox::new(40.0, 60.0, 80.0, 90.0),
      ExpressionDistribution::from_pairs([
        (Emotion::Happy, 0.5),
        (Emotion::Neutral, 0.5),
      ]),
    ),
    Detection::new(
      BoundingBox::new(180.0, 60.0, 60.0, 60.0),
      ExpressionDistribution::from_pairs([(Emotion::Surprised, 0.95)]),
    ),
  ]
  .into();
  let detector = ScriptedDetector::new().with_frames([detections]);
  let source = StillImageSource::from_image(RgbImage::from_pixel(320, 240, Rgb([30, 30, 30])));
  let dashboard = SharedDashboard::new();

  let lp = DetectionLoop::new(detector, source, dashboard.clone(), manual_settings());
  let preview = dir.path().join("preview.png");
  let records = dir.path().join("records");
  for url in [
    format!("image://{}", preview.display()),
    format!("folder://{}?record", records.display()),
  ] {
    let url = Url::parse(&url).unwrap();
    lp.add_output(Box::new(OutputWrapper::from_url(&url).unwrap()));
  }

  lp.load_models(&Url::parse("replay:///unused").unwrap()).await.unwrap();
  lp.start().await.unwrap();
  assert_eq!(lp.surface_dimensions(), (320, 240));

  assert_eq!(lp.tick().await, TickOutcome::Rendered(2));
  {
    let dashboard = dashboard.lock();
    // 概率相同时取固定顺序中靠前的 happy
    assert_eq!(dashboard.count(Emotion::Happy), 1);
    assert_eq!(dashboard.count(Emotion::Neutral), 0);
    assert_eq!(dashboard.count(Emotion::Surprised), 1);
  }
  assert!(preview.exists());
  assert_eq!(count_files(&records, "png"), 1);
  assert_eq!(count_files(&records, "json"), 1);

  // 没有人脸的帧不写记录，预览照常更新
  assert_eq!(lp.tick().await, TickOutcome::Rendered(0));
  assert_eq!(count_files(&records, "png"), 1);
  assert_eq!(dashboard.lock().count(Emotion::Surprised), 0);

  lp.stop();
  assert_eq!(lp.state(), LoopState::Idle);
  assert!(lp.overlay().pixels().all(|p| p.0[3] == 0));
}

#[tokio::test]
async fn replay_recording_drives_timer() {
  let dir = tempfile::tempdir().unwrap();
  let recording = dir.path().join("detections.jsonl");
  {
    let mut file = std::fs::File::create(&recording).unwrap();
    writeln!(
      file,
      r#"[{{"box":{{"x":10,"y":30,"width":40,"height":40}},"expressions":{{"sad":0.8,"fearful":0.1}}}}]"#
    )
    .unwrap();
    writeln!(file, "[]").unwrap();
  }

  let settings = LoopSettings {
    interval: Duration::from_millis(10),
    ..LoopSettings::default()
  };
  let dashboard = SharedDashboard::new();
  let lp = DetectionLoop::new(
    ReplayDetector::new(),
    StillImageSource::from_image(RgbImage::new(64, 64)),
    dashboard.clone(),
    settings,
  );

  let base = Url::parse(&format!("replay://{}", dir.path().display())).unwrap();
  lp.load_models(&base).await.unwrap();
  assert_eq!(lp.detector().len(), 2);
  lp.start().await.unwrap();

  tokio::time::sleep(Duration::from_millis(200)).await;
  lp.stop();

  assert!(lp.rendered_frames() >= 2);
  let history = lp.history();
  assert!(!history.is_empty() && history.len() <= 5);
  assert_eq!(lp.state(), LoopState::Idle);
  assert!(dashboard.lock().status().starts_with("Camera stopped"));
}

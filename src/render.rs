// 该文件是 Yanse （察言观色） 项目的一部分。
// src/render.rs - 表情识别结果可视化
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

use std::fmt;

use crate::{
  detection::{
    BoundingBox, Detection, DetectionFrame, LEFT_EYE_OUTER, LandmarkSet, NOSE_TIP, Point,
    RIGHT_EYE_OUTER,
  },
  emotion::{Emotion, ExpressionDistribution},
  style::{Color, LabelStyle, RenderStyle},
  surface::{Surface, rounded_rect_path},
};

/// 鼻尖偏离双眼中点超过眼距的该比例时判定为转头
const FACE_ANGLE_THRESHOLD: f32 = 0.2;
/// 主标签之后最多再显示几个次要表情
const MAX_SECONDARY_LABELS: usize = 2;

/// 由关键点粗略估计的左右转头方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceAngle {
  Left,
  Right,
  Center,
  Unknown,
}

impl fmt::Display for FaceAngle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      FaceAngle::Left => "Left",
      FaceAngle::Right => "Right",
      FaceAngle::Center => "Center",
      FaceAngle::Unknown => "Unknown",
    })
  }
}

/// 鼻尖相对双眼中点的水平偏移，以眼距归一化。
pub fn face_deviation(left_eye: Point, right_eye: Point, nose_tip: Point) -> Option<f32> {
  let span = right_eye.x - left_eye.x;
  if span.abs() <= f32::EPSILON {
    return None;
  }
  let center = (left_eye.x + right_eye.x) / 2.0;
  Some((nose_tip.x - center) / span)
}

pub fn face_angle(landmarks: Option<&LandmarkSet>) -> FaceAngle {
  let Some(landmarks) = landmarks else {
    return FaceAngle::Unknown;
  };
  let deviation = face_deviation(
    landmarks.point(LEFT_EYE_OUTER),
    landmarks.point(RIGHT_EYE_OUTER),
    landmarks.point(NOSE_TIP),
  );
  match deviation {
    None => FaceAngle::Unknown,
    Some(d) if d < -FACE_ANGLE_THRESHOLD => FaceAngle::Right,
    Some(d) if d > FACE_ANGLE_THRESHOLD => FaceAngle::Left,
    Some(_) => FaceAngle::Center,
  }
}

/// 概率转为四舍五入的百分数
pub fn percent(probability: f32) -> u32 {
  (probability * 100.0).round() as u32
}

pub fn label_text(emotion: Emotion, probability: f32) -> String {
  format!("{} ({}%)", emotion.title(), percent(probability))
}

/// 一个人脸要显示的表情标签
#[derive(Debug, Clone, PartialEq)]
pub struct LabelStack {
  pub primary: (Emotion, f32),
  /// 排名第 2、3 且概率严格超过阈值的表情，按排名顺序
  pub secondary: Vec<(Emotion, f32)>,
}

impl LabelStack {
  pub fn from_expressions(expressions: &ExpressionDistribution, threshold: f32) -> Self {
    let ranked = expressions.ranked();
    let secondary = ranked
      .iter()
      .skip(1)
      .take(MAX_SECONDARY_LABELS)
      .filter(|(_, p)| *p > threshold)
      .copied()
      .collect();
    Self {
      primary: ranked[0],
      secondary,
    }
  }
}

/// 把一帧的检测结果画到叠加层上
#[derive(Debug, Clone, Default)]
pub struct Renderer {
  style: RenderStyle,
}

impl Renderer {
  pub fn new(style: RenderStyle) -> Self {
    Self { style }
  }

  pub fn style(&self) -> &RenderStyle {
    &self.style
  }

  /// 清空表面后按检测顺序逐个绘制
  pub fn render<S: Surface + ?Sized>(&self, surface: &mut S, frame: &DetectionFrame) {
    surface.clear();
    for detection in frame {
      self.draw_detection(surface, detection);
    }
  }

  pub fn draw_detection<S: Surface + ?Sized>(&self, surface: &mut S, detection: &Detection) {
    let labels =
      LabelStack::from_expressions(&detection.expressions, self.style.label.secondary_threshold);
    let (primary, probability) = labels.primary;
    let color = self.style.palette.color(primary);
    let bbox = detection.bbox;

    self.draw_face_box(surface, bbox, color);

    // 标签锚点在框顶上方，且不高于画面顶部留白
    let label = &self.style.label;
    let anchor_x = bbox.center_x();
    let anchor_y = (bbox.y - label.anchor_gap).max(label.top_margin);
    let mut label_y = anchor_y - label.spacing;
    draw_label(
      surface,
      label,
      Point::new(anchor_x, label_y),
      &label_text(primary, probability),
      color,
      1.0,
    );

    for (emotion, p) in &labels.secondary {
      label_y -= label.spacing;
      draw_label(
        surface,
        label,
        Point::new(anchor_x, label_y),
        &label_text(*emotion, *p),
        self.style.palette.color(*emotion),
        label.secondary_opacity,
      );
    }

    self.draw_metrics(surface, detection, probability);

    if let Some(landmarks) = &detection.landmarks {
      self.draw_landmarks(surface, landmarks);
    }
  }

  fn draw_face_box<S: Surface + ?Sized>(&self, surface: &mut S, bbox: BoundingBox, color: Color) {
    let style = &self.style.face_box;
    let path = rounded_rect_path(bbox, style.corner_radius);
    surface.stroke_path(&path, true, style.line_width, color.with_opacity(style.opacity));
    surface.fill_path(&path, color.with_opacity(style.fill_opacity));
  }

  fn draw_metrics<S: Surface + ?Sized>(&self, surface: &mut S, detection: &Detection, confidence: f32) {
    let style = &self.style.metrics;
    let bbox = detection.bbox;
    let top = bbox.bottom() + style.offset;

    surface.fill_rect(
      BoundingBox::new(bbox.x, top, bbox.width, style.height),
      Color::BLACK.with_opacity(style.opacity),
    );

    let angle = face_angle(detection.landmarks.as_ref());
    let lines = [
      format!("Confidence: {}%", percent(confidence)),
      format!("Face Angle: {angle}"),
    ];
    for (text, offset) in lines.iter().zip(style.line_offsets) {
      surface.fill_text(
        text,
        Point::new(bbox.center_x(), top + offset),
        style.font_size,
        Color::WHITE.with_opacity(1.0),
      );
    }
  }

  fn draw_landmarks<S: Surface + ?Sized>(&self, surface: &mut S, landmarks: &LandmarkSet) {
    let style = &self.style.landmarks;
    let groups = [
      (landmarks.left_eye(), style.eye_color),
      (landmarks.right_eye(), style.eye_color),
      (landmarks.nose(), style.nose_color),
      (landmarks.mouth(), style.mouth_color),
    ];

    for (points, color) in groups {
      let color = color.with_opacity(style.opacity);
      for point in points {
        surface.fill_circle(*point, style.radius, color);
      }
      surface.stroke_path(points, true, style.line_width, color);
    }
  }
}

/// 药丸形标签：圆角背景 + 居中白字
fn draw_label<S: Surface + ?Sized>(
  surface: &mut S,
  style: &LabelStyle,
  center: Point,
  text: &str,
  color: Color,
  opacity: f32,
) {
  let text_width = surface.measure_text(text, style.font_size);
  let width = text_width + style.padding * 2.0;
  let height = style.font_size + style.padding * 2.0;
  let background = BoundingBox::new(center.x - width / 2.0, center.y - height / 2.0, width, height);

  // 背景和文字共用同一个透明度
  let opacity = style.opacity * opacity;
  surface.fill_path(
    &rounded_rect_path(background, style.corner_radius),
    color.with_opacity(opacity),
  );
  surface.fill_text(text, center, style.font_size, Color::WHITE.with_opacity(opacity));
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::LANDMARK_COUNT;
  use crate::surface::{RgbaSurface, recording::{Op, RecordingSurface}};
  use approx::assert_relative_eq;
  use rstest::rstest;

  fn eyes_and_nose(nose: (f32, f32)) -> LandmarkSet {
    let mut points = vec![Point::new(50.0, 50.0); LANDMARK_COUNT];
    points[LEFT_EYE_OUTER] = Point::new(30.0, 50.0);
    points[RIGHT_EYE_OUTER] = Point::new(70.0, 50.0);
    points[NOSE_TIP] = Point::from(nose);
    LandmarkSet::try_from(points).unwrap()
  }

  fn sample_expressions() -> ExpressionDistribution {
    ExpressionDistribution::from_pairs([
      (Emotion::Happy, 0.9),
      (Emotion::Sad, 0.75),
      (Emotion::Neutral, 0.71),
      (Emotion::Angry, 0.1),
    ])
  }

  #[rstest]
  #[case::center((48.0, 60.0), FaceAngle::Center)]
  #[case::left((66.0, 60.0), FaceAngle::Left)]
  #[case::right((31.0, 60.0), FaceAngle::Right)]
  fn face_angle_from_nose_offset(#[case] nose: (f32, f32), #[case] expected: FaceAngle) {
    assert_eq!(face_angle(Some(&eyes_and_nose(nose))), expected);
  }

  #[rstest]
  #[case((48.0, 60.0), -0.05)]
  #[case((66.0, 60.0), 0.4)]
  #[case((31.0, 60.0), -0.475)]
  fn deviation_values(#[case] nose: (f32, f32), #[case] expected: f32) {
    let deviation =
      face_deviation(Point::new(30.0, 50.0), Point::new(70.0, 50.0), Point::from(nose)).unwrap();
    assert_relative_eq!(deviation, expected, epsilon = 1e-6);
  }

  #[test]
  fn face_angle_unknown_without_landmarks() {
    assert_eq!(face_angle(None), FaceAngle::Unknown);
    assert_eq!(FaceAngle::Unknown.to_string(), "Unknown");
  }

  #[test]
  fn face_angle_unknown_for_zero_eye_span() {
    let mut points = vec![Point::new(10.0, 10.0); LANDMARK_COUNT];
    points[NOSE_TIP] = Point::new(20.0, 10.0);
    let set = LandmarkSet::try_from(points).unwrap();
    assert_eq!(face_angle(Some(&set)), FaceAngle::Unknown);
  }

  #[test]
  fn secondary_labels_need_to_exceed_threshold() {
    let labels = LabelStack::from_expressions(&sample_expressions(), 0.70);
    assert_eq!(labels.primary.0, Emotion::Happy);
    let secondary: Vec<Emotion> = labels.secondary.iter().map(|(e, _)| *e).collect();
    assert_eq!(secondary, vec![Emotion::Sad, Emotion::Neutral]);
  }

  #[test]
  fn secondary_labels_limited_to_ranks_two_and_three() {
    let dist = ExpressionDistribution::from_pairs([
      (Emotion::Happy, 0.95),
      (Emotion::Sad, 0.9),
      (Emotion::Neutral, 0.85),
      (Emotion::Surprised, 0.8),
    ]);
    let labels = LabelStack::from_expressions(&dist, 0.70);
    assert_eq!(labels.secondary.len(), 2);
    assert!(labels.secondary.iter().all(|(e, _)| *e != Emotion::Surprised));
  }

  #[test]
  fn threshold_is_strict() {
    let dist = ExpressionDistribution::from_pairs([(Emotion::Happy, 0.9), (Emotion::Sad, 0.70)]);
    assert!(LabelStack::from_expressions(&dist, 0.70).secondary.is_empty());
  }

  #[test]
  fn label_text_rounds_percent() {
    assert_eq!(label_text(Emotion::Happy, 0.906), "Happy (91%)");
    assert_eq!(label_text(Emotion::Sad, 0.004), "Sad (0%)");
  }

  #[test]
  fn renders_expected_labels_and_metrics() {
    let detection = Detection::new(BoundingBox::new(100.0, 120.0, 80.0, 90.0), sample_expressions());
    let mut surface = RecordingSurface::new(640, 480);
    Renderer::default().render(&mut surface, &DetectionFrame::from(vec![detection]));

    assert_eq!(surface.ops[0], Op::Clear);
    assert_eq!(
      surface.texts(),
      vec![
        "Happy (90%)".to_string(),
        "Sad (75%)".to_string(),
        "Neutral (71%)".to_string(),
        "Confidence: 90%".to_string(),
        "Face Angle: Unknown".to_string(),
      ]
    );
  }

  #[test]
  fn labels_stack_upwards_from_clamped_anchor() {
    let detection = Detection::new(BoundingBox::new(100.0, 120.0, 80.0, 90.0), sample_expressions());
    let mut surface = RecordingSurface::new(640, 480);
    Renderer::default().draw_detection(&mut surface, &detection);

    let centers: Vec<Point> = surface
      .ops
      .iter()
      .filter_map(|op| match op {
        Op::FillText { center, .. } => Some(*center),
        _ => None,
      })
      .collect();
    // 锚点 = max(120 - 10, 10) = 110，主标签在 110 - 25
    assert_relative_eq!(centers[0].y, 85.0);
    assert_relative_eq!(centers[1].y, 60.0);
    assert_relative_eq!(centers[2].y, 35.0);
    assert_relative_eq!(centers[0].x, 140.0);
    // 指标面板文字在框底 + 15 之下
    assert_relative_eq!(centers[3].y, 210.0 + 15.0 + 12.0);
    assert_relative_eq!(centers[4].y, 210.0 + 15.0 + 32.0);
  }

  #[test]
  fn anchor_is_clamped_near_top() {
    let detection = Detection::new(
      BoundingBox::new(10.0, 5.0, 50.0, 50.0),
      ExpressionDistribution::from_pairs([(Emotion::Angry, 1.0)]),
    );
    let mut surface = RecordingSurface::new(100, 100);
    Renderer::default().draw_detection(&mut surface, &detection);
    let first_text = surface.ops.iter().find_map(|op| match op {
      Op::FillText { center, .. } => Some(*center),
      _ => None,
    });
    assert_relative_eq!(first_text.unwrap().y, 10.0 - 25.0);
  }

  #[test]
  fn box_uses_primary_color_and_style() {
    let detection = Detection::new(BoundingBox::new(10.0, 40.0, 50.0, 50.0), sample_expressions());
    let mut surface = RecordingSurface::new(100, 100);
    Renderer::default().draw_detection(&mut surface, &detection);

    let happy = Color::rgb(0x4C, 0xAF, 0x50);
    assert!(matches!(
      &surface.ops[0],
      Op::StrokePath { closed: true, width, color, .. }
        if *width == 3.0 && *color == happy.with_opacity(0.8)
    ));
    assert!(matches!(
      &surface.ops[1],
      Op::FillPath { color, .. } if *color == happy.with_opacity(0.1)
    ));
  }

  #[test]
  fn secondary_label_background_is_dimmed() {
    let detection = Detection::new(BoundingBox::new(100.0, 120.0, 80.0, 90.0), sample_expressions());
    let mut surface = RecordingSurface::new(640, 480);
    Renderer::default().draw_detection(&mut surface, &detection);

    let fills: Vec<image::Rgba<u8>> = surface
      .ops
      .iter()
      .filter_map(|op| match op {
        Op::FillPath { color, .. } => Some(*color),
        _ => None,
      })
      .collect();
    // 框填充、主标签、两个次要标签
    assert_eq!(fills.len(), 4);
    let sad = Color::rgb(0x60, 0x7D, 0x8B);
    assert_eq!(fills[2], sad.with_opacity(0.9 * 0.7));
  }

  #[test]
  fn label_text_shares_background_opacity() {
    let detection = Detection::new(BoundingBox::new(100.0, 120.0, 80.0, 90.0), sample_expressions());
    let mut surface = RecordingSurface::new(640, 480);
    Renderer::default().draw_detection(&mut surface, &detection);

    let text_colors: Vec<(String, image::Rgba<u8>)> = surface
      .ops
      .iter()
      .filter_map(|op| match op {
        Op::FillText { text, color, .. } => Some((text.clone(), *color)),
        _ => None,
      })
      .collect();
    assert_eq!(text_colors[0].1, Color::WHITE.with_opacity(0.9));
    assert_eq!(text_colors[1].1, Color::WHITE.with_opacity(0.9 * 0.7));
    assert_eq!(text_colors[2].1, Color::WHITE.with_opacity(0.9 * 0.7));
    // 指标面板文字不透明
    let metrics = text_colors
      .iter()
      .find(|(text, _)| text.starts_with("Confidence"))
      .unwrap();
    assert_eq!(metrics.1, Color::WHITE.with_opacity(1.0));
  }

  #[test]
  fn landmarks_draw_four_groups() {
    let points = (0..LANDMARK_COUNT)
      .map(|i| Point::new(100.0 + i as f32, 100.0))
      .collect::<Vec<_>>();
    let detection = Detection::new(BoundingBox::new(90.0, 90.0, 100.0, 100.0), sample_expressions())
      .with_landmarks(LandmarkSet::try_from(points).unwrap());
    let mut surface = RecordingSurface::new(640, 480);
    Renderer::default().draw_detection(&mut surface, &detection);

    let dots = surface
      .ops
      .iter()
      .filter(|op| matches!(op, Op::FillCircle { radius, .. } if *radius == 2.0))
      .count();
    assert_eq!(dots, 6 + 6 + 9 + 20);

    let outlines: Vec<usize> = surface
      .ops
      .iter()
      .filter_map(|op| match op {
        Op::StrokePath { points, closed: true, width, .. } if *width == 1.0 => Some(*points),
        _ => None,
      })
      .collect();
    assert_eq!(outlines, vec![6, 6, 9, 20]);
    // 鼻尖（30）在双眼外角（36、45）中点左侧
    assert!(surface.texts().contains(&"Face Angle: Right".to_string()));
  }

  #[test]
  fn empty_frame_only_clears() {
    let mut surface = RecordingSurface::new(10, 10);
    Renderer::default().render(&mut surface, &DetectionFrame::empty());
    assert_eq!(surface.ops, vec![Op::Clear]);
  }

  #[test]
  fn raster_render_leaves_pixels() {
    let detection = Detection::new(BoundingBox::new(20.0, 60.0, 60.0, 60.0), sample_expressions());
    let mut surface = RgbaSurface::new(160, 200);
    Renderer::default().render(&mut surface, &DetectionFrame::from(vec![detection.clone()]));
    assert!(!surface.is_blank());
    // 框线附近有颜色
    assert!(surface.image().get_pixel(50, 60).0[3] > 0);

    Renderer::default().render(&mut surface, &DetectionFrame::empty());
    assert!(surface.is_blank());
  }

  #[test]
  fn far_offscreen_detection_renders_nothing() {
    let mut points = vec![Point::new(3e9, 20.0); LANDMARK_COUNT];
    points[0] = Point::new(-3e9, 1e12);
    let far = Detection::new(BoundingBox::new(1e12, 10.0, 40.0, 40.0), sample_expressions())
      .with_landmarks(LandmarkSet::try_from(points).unwrap());
    let mut surface = RgbaSurface::new(64, 64);
    Renderer::default().render(&mut surface, &DetectionFrame::from(vec![far]));
    assert!(surface.is_blank());
  }
}

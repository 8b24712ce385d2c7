// 该文件是 Yanse （察言观色） 项目的一部分。
// src/style.rs - 颜色表与绘制样式
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
use std::str::FromStr;

use image::Rgba;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::emotion::Emotion;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("无法解析颜色 '{0}'，期望形如 #RRGGBB")]
pub struct ColorParseError(pub String);

/// 不带透明度的 RGB 颜色，配置文件中写作 `#RRGGBB`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub [u8; 3]);

impl Color {
  pub const WHITE: Color = Color([255, 255, 255]);
  pub const BLACK: Color = Color([0, 0, 0]);

  pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
    Color([r, g, b])
  }

  /// 附加不透明度（0.0 - 1.0）
  pub fn with_opacity(self, opacity: f32) -> Rgba<u8> {
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let [r, g, b] = self.0;
    Rgba([r, g, b, alpha])
  }
}

impl FromStr for Color {
  type Err = ColorParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
      return Err(ColorParseError(s.to_string()));
    }
    let channel = |i: usize| {
      u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ColorParseError(s.to_string()))
    };
    Ok(Color([channel(0)?, channel(2)?, channel(4)?]))
  }
}

impl TryFrom<String> for Color {
  type Error = ColorParseError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Color> for String {
  fn from(color: Color) -> Self {
    color.to_string()
  }
}

impl fmt::Display for Color {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let [r, g, b] = self.0;
    write!(f, "#{r:02X}{g:02X}{b:02X}")
  }
}

/// 每种表情对应的框颜色
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
  pub angry: Color,
  pub disgusted: Color,
  pub fearful: Color,
  pub happy: Color,
  pub neutral: Color,
  pub sad: Color,
  pub surprised: Color,
}

impl Default for Palette {
  fn default() -> Self {
    Self {
      angry: Color::rgb(0xFF, 0x52, 0x52),     // 红
      disgusted: Color::rgb(0x9C, 0x27, 0xB0), // 紫
      fearful: Color::rgb(0xFF, 0xC1, 0x07),   // 琥珀
      happy: Color::rgb(0x4C, 0xAF, 0x50),     // 绿
      neutral: Color::rgb(0x21, 0x96, 0xF3),   // 蓝
      sad: Color::rgb(0x60, 0x7D, 0x8B),       // 蓝灰
      surprised: Color::rgb(0xFF, 0x98, 0x00), // 橙
    }
  }
}

impl Palette {
  pub fn color(&self, emotion: Emotion) -> Color {
    match emotion {
      Emotion::Angry => self.angry,
      Emotion::Disgusted => self.disgusted,
      Emotion::Fearful => self.fearful,
      Emotion::Happy => self.happy,
      Emotion::Neutral => self.neutral,
      Emotion::Sad => self.sad,
      Emotion::Surprised => self.surprised,
    }
  }
}

/// 人脸框样式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxStyle {
  pub line_width: f32,
  pub corner_radius: f32,
  pub opacity: f32,
  pub fill_opacity: f32,
}

impl Default for BoxStyle {
  fn default() -> Self {
    Self {
      line_width: 3.0,
      corner_radius: 5.0,
      opacity: 0.8,
      fill_opacity: 0.1,
    }
  }
}

/// 表情标签样式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelStyle {
  pub font_size: f32,
  pub padding: f32,
  pub corner_radius: f32,
  pub opacity: f32,
  /// 次要标签背景透明度的缩放系数
  pub secondary_opacity: f32,
  /// 次要表情需严格超过该概率才显示
  pub secondary_threshold: f32,
  /// 标签之间、标签与锚点之间的垂直间距
  pub spacing: f32,
  /// 锚点位于框顶上方的距离
  pub anchor_gap: f32,
  /// 锚点距画面顶部的最小距离
  pub top_margin: f32,
}

impl Default for LabelStyle {
  fn default() -> Self {
    Self {
      font_size: 14.0,
      padding: 6.0,
      corner_radius: 4.0,
      opacity: 0.9,
      secondary_opacity: 0.7,
      secondary_threshold: 0.70,
      spacing: 25.0,
      anchor_gap: 10.0,
      top_margin: 10.0,
    }
  }
}

/// 框下方的指标面板
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsStyle {
  pub offset: f32,
  pub height: f32,
  pub opacity: f32,
  pub font_size: f32,
  /// 两行文字中心相对面板顶部的偏移
  pub line_offsets: [f32; 2],
}

impl Default for MetricsStyle {
  fn default() -> Self {
    Self {
      offset: 15.0,
      height: 45.0,
      opacity: 0.6,
      font_size: 12.0,
      line_offsets: [12.0, 32.0],
    }
  }
}

/// 关键点绘制样式
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkStyle {
  pub radius: f32,
  pub opacity: f32,
  pub line_width: f32,
  pub eye_color: Color,
  pub nose_color: Color,
  pub mouth_color: Color,
}

impl Default for LandmarkStyle {
  fn default() -> Self {
    Self {
      radius: 2.0,
      opacity: 0.7,
      line_width: 1.0,
      eye_color: Color::rgb(0x00, 0xBC, 0xD4),
      nose_color: Color::rgb(0xFF, 0xC1, 0x07),
      mouth_color: Color::rgb(0xFF, 0x57, 0x22),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
  pub palette: Palette,
  #[serde(rename = "box")]
  pub face_box: BoxStyle,
  pub label: LabelStyle,
  pub metrics: MetricsStyle,
  pub landmarks: LandmarkStyle,
}

#[cfg(test)]
mod tests {
  use super::*;
  use rstest::rstest;

  #[rstest]
  #[case("#FF5252", Color::rgb(0xFF, 0x52, 0x52))]
  #[case("4caf50", Color::rgb(0x4C, 0xAF, 0x50))]
  #[case(" #2196F3 ", Color::rgb(0x21, 0x96, 0xF3))]
  fn parses_hex_colors(#[case] text: &str, #[case] expected: Color) {
    assert_eq!(text.parse::<Color>(), Ok(expected));
  }

  #[rstest]
  #[case("#FFF")]
  #[case("#GG0000")]
  #[case("#ＡＢＣ")]
  fn rejects_bad_colors(#[case] text: &str) {
    assert!(text.parse::<Color>().is_err());
  }

  #[test]
  fn formats_as_hex() {
    assert_eq!(Color::rgb(0x60, 0x7D, 0x8B).to_string(), "#607D8B");
  }

  #[test]
  fn opacity_maps_to_alpha() {
    assert_eq!(Color::WHITE.with_opacity(1.0), Rgba([255, 255, 255, 255]));
    assert_eq!(Color::BLACK.with_opacity(0.6), Rgba([0, 0, 0, 153]));
    assert_eq!(Color::BLACK.with_opacity(2.0).0[3], 255);
  }

  #[test]
  fn palette_covers_every_emotion() {
    let palette = Palette::default();
    assert_eq!(palette.color(Emotion::Happy).to_string(), "#4CAF50");
    assert_eq!(palette.color(Emotion::Surprised).to_string(), "#FF9800");
    for emotion in Emotion::ALL {
      assert_ne!(palette.color(emotion), Color::BLACK);
    }
  }
}

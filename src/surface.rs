// 该文件是 Yanse （察言观色） 项目的一部分。
// src/surface.rs - 二维绘制表面
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

use std::f32::consts::{FRAC_PI_2, PI};

use ab_glyph::{FontArc, PxScale};
use image::{GrayImage, Luma, Pixel, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{
  draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut, draw_text_mut, text_size,
};

use crate::detection::{BoundingBox, Point};

/// 没有字体时估算文字宽度用的平均字宽系数（相对字号）
const ESTIMATED_CHAR_WIDTH: f32 = 0.55;
/// 每个圆角用多少段折线逼近
const ARC_SEGMENTS: usize = 6;

/// 画面外的坐标最多保留到叠加层长边的这么多倍，超出部分夹到边界
const OFFSCREEN_MARGIN: f32 = 4.0;

const MASK_ON: Luma<u8> = Luma([255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// 类似浏览器 Canvas 2D 的绘制接口，坐标为浮点像素。
pub trait Surface {
  fn width(&self) -> u32;
  fn height(&self) -> u32;

  fn dimensions(&self) -> (u32, u32) {
    (self.width(), self.height())
  }

  /// 调整尺寸，内容被清空
  fn resize(&mut self, width: u32, height: u32);
  fn clear(&mut self);

  /// 填充闭合多边形
  fn fill_path(&mut self, path: &[Point], color: Rgba<u8>);
  fn stroke_path(&mut self, path: &[Point], closed: bool, line_width: f32, color: Rgba<u8>);
  fn fill_rect(&mut self, rect: BoundingBox, color: Rgba<u8>);
  fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba<u8>);

  fn measure_text(&self, text: &str, font_size: f32) -> f32;
  /// 以 `center` 为中心绘制单行文字
  fn fill_text(&mut self, text: &str, center: Point, font_size: f32, color: Rgba<u8>);
}

/// 圆角矩形轮廓，圆角半径不超过短边的一半。
pub fn rounded_rect_path(rect: BoundingBox, radius: f32) -> Vec<Point> {
  let BoundingBox {
    x,
    y,
    width,
    height,
  } = rect;
  let r = radius.min(width / 2.0).min(height / 2.0).max(0.0);

  if r <= f32::EPSILON {
    return vec![
      Point::new(x, y),
      Point::new(x + width, y),
      Point::new(x + width, y + height),
      Point::new(x, y + height),
    ];
  }

  // 右上、右下、左下、左上，y 轴向下，角度顺时针增长
  let corners = [
    (x + width - r, y + r, -FRAC_PI_2),
    (x + width - r, y + height - r, 0.0),
    (x + r, y + height - r, FRAC_PI_2),
    (x + r, y + r, PI),
  ];

  let mut path = Vec::with_capacity(corners.len() * (ARC_SEGMENTS + 1));
  for (cx, cy, start) in corners {
    for step in 0..=ARC_SEGMENTS {
      let theta = start + FRAC_PI_2 * step as f32 / ARC_SEGMENTS as f32;
      path.push(Point::new(cx + r * theta.cos(), cy + r * theta.sin()));
    }
  }
  path
}

fn to_pixel(p: &Point) -> imageproc::point::Point<i32> {
  imageproc::point::Point::new(p.x.round() as i32, p.y.round() as i32)
}

/// 在遮罩上填充多边形，退化的多边形降级为线段。
fn fill_polygon_mask(mask: &mut GrayImage, path: &[Point]) {
  let mut poly: Vec<imageproc::point::Point<i32>> = Vec::with_capacity(path.len());
  for p in path.iter().map(to_pixel) {
    if poly.last() != Some(&p) {
      poly.push(p);
    }
  }
  while poly.len() > 1 && poly.first() == poly.last() {
    poly.pop();
  }

  match poly.len() {
    0 => {}
    1 => {
      let p = poly[0];
      if p.x >= 0 && p.y >= 0 && (p.x as u32) < mask.width() && (p.y as u32) < mask.height() {
        mask.put_pixel(p.x as u32, p.y as u32, MASK_ON);
      }
    }
    2 => draw_line_segment_mut(
      mask,
      (poly[0].x as f32, poly[0].y as f32),
      (poly[1].x as f32, poly[1].y as f32),
      MASK_ON,
    ),
    _ => draw_polygon_mut(mask, &poly, MASK_ON),
  }
}

/// 图元与叠加层相交的像素区域，遮罩只覆盖这一块。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
  x: u32,
  y: u32,
  width: u32,
  height: u32,
}

impl Region {
  fn mask(&self) -> GrayImage {
    GrayImage::new(self.width, self.height)
  }
}

/// 基于 imageproc 的 RGBA 叠加层。
///
/// 每个图元先画到覆盖遮罩上再与颜色混合一次，半透明图形自身重叠处不会加深。
pub struct RgbaSurface {
  image: RgbaImage,
  font: Option<FontArc>,
}

impl RgbaSurface {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      image: RgbaImage::from_pixel(width, height, TRANSPARENT),
      font: None,
    }
  }

  pub fn with_font(mut self, font: Option<FontArc>) -> Self {
    self.font = font;
    self
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  pub fn image(&self) -> &RgbaImage {
    &self.image
  }

  /// 是否全部透明
  pub fn is_blank(&self) -> bool {
    self.image.pixels().all(|p| p.0[3] == 0)
  }

  fn is_degenerate(&self) -> bool {
    self.image.width() == 0 || self.image.height() == 0
  }

  fn margin(&self) -> f32 {
    OFFSCREEN_MARGIN * self.image.width().max(self.image.height()) as f32
  }

  /// 把坐标夹到叠加层周围的有限范围内，之后再转成整数不会溢出
  fn clamp_point(&self, p: Point) -> Point {
    let m = self.margin();
    Point::new(
      p.x.clamp(-m, self.image.width() as f32 + m),
      p.y.clamp(-m, self.image.height() as f32 + m),
    )
  }

  fn within_margin(&self, p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite() && self.clamp_point(p) == p
  }

  /// `[x0, x1) × [y0, y1)` 与叠加层的交集，为空或含非有限值时返回 `None`
  fn clip(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Option<Region> {
    if self.is_degenerate() || ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
      return None;
    }
    let left = x0.floor().max(0.0);
    let top = y0.floor().max(0.0);
    let right = x1.ceil().min(self.image.width() as f32);
    let bottom = y1.ceil().min(self.image.height() as f32);
    if left >= right || top >= bottom {
      return None;
    }
    Some(Region {
      x: left as u32,
      y: top as u32,
      width: (right - left) as u32,
      height: (bottom - top) as u32,
    })
  }

  /// 点集外扩 `pad` 后的可见区域
  fn visible_region(&self, points: &[Point], pad: f32) -> Option<Region> {
    let (mut x0, mut y0) = (f32::INFINITY, f32::INFINITY);
    let (mut x1, mut y1) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in points {
      if !p.x.is_finite() || !p.y.is_finite() {
        return None;
      }
      x0 = x0.min(p.x);
      y0 = y0.min(p.y);
      x1 = x1.max(p.x);
      y1 = y1.max(p.y);
    }
    // 右下各多留一个像素，顶点所在像素也会被填充
    self.clip(x0 - pad, y0 - pad, x1 + pad + 1.0, y1 + pad + 1.0)
  }

  /// 转为区域内的局部坐标
  fn to_local(&self, p: Point, region: Region) -> Point {
    let p = self.clamp_point(p);
    Point::new(p.x - region.x as f32, p.y - region.y as f32)
  }

  fn blend_mask(&mut self, mask: &GrayImage, region: Region, color: Rgba<u8>) {
    for (x, y, m) in mask.enumerate_pixels() {
      if m.0[0] > 0 {
        self.image.get_pixel_mut(region.x + x, region.y + y).blend(&color);
      }
    }
  }

  /// 把叠加层合成到视频帧上，得到可以直接保存的画面。
  pub fn composite_over(&self, frame: &RgbImage) -> RgbImage {
    let mut output = frame.clone();
    let width = output.width().min(self.image.width());
    let height = output.height().min(self.image.height());

    for y in 0..height {
      for x in 0..width {
        let Rgba([r, g, b, a]) = *self.image.get_pixel(x, y);
        if a == 0 {
          continue;
        }
        let alpha = a as f32 / 255.0;
        let base = output.get_pixel_mut(x, y);
        let mix = |over: u8, under: u8| {
          (over as f32 * alpha + under as f32 * (1.0 - alpha)).round() as u8
        };
        *base = Rgb([mix(r, base.0[0]), mix(g, base.0[1]), mix(b, base.0[2])]);
      }
    }
    output
  }
}

impl Surface for RgbaSurface {
  fn width(&self) -> u32 {
    self.image.width()
  }

  fn height(&self) -> u32 {
    self.image.height()
  }

  fn resize(&mut self, width: u32, height: u32) {
    self.image = RgbaImage::from_pixel(width, height, TRANSPARENT);
  }

  fn clear(&mut self) {
    for pixel in self.image.pixels_mut() {
      *pixel = TRANSPARENT;
    }
  }

  fn fill_path(&mut self, path: &[Point], color: Rgba<u8>) {
    let Some(region) = self.visible_region(path, 0.0) else {
      return;
    };
    let local: Vec<Point> = path.iter().map(|p| self.to_local(*p, region)).collect();
    let mut mask = region.mask();
    fill_polygon_mask(&mut mask, &local);
    self.blend_mask(&mask, region, color);
  }

  fn stroke_path(&mut self, path: &[Point], closed: bool, line_width: f32, color: Rgba<u8>) {
    if path.len() < 2 {
      return;
    }
    let half = (line_width / 2.0).max(0.5);
    let Some(region) = self.visible_region(path, half + 1.0) else {
      return;
    };
    let path: Vec<Point> = path.iter().map(|p| self.to_local(*p, region)).collect();
    let mut mask = region.mask();

    let mut segments: Vec<(Point, Point)> = path.windows(2).map(|w| (w[0], w[1])).collect();
    if closed {
      segments.push((path[path.len() - 1], path[0]));
    }

    for (a, b) in segments {
      let (dx, dy) = (b.x - a.x, b.y - a.y);
      let length = (dx * dx + dy * dy).sqrt();
      if length < 0.5 {
        continue;
      }
      // 线段两侧各外扩半个线宽
      let (nx, ny) = (-dy / length * half, dx / length * half);
      let quad = [
        Point::new(a.x + nx, a.y + ny),
        Point::new(b.x + nx, b.y + ny),
        Point::new(b.x - nx, b.y - ny),
        Point::new(a.x - nx, a.y - ny),
      ];
      fill_polygon_mask(&mut mask, &quad);
    }

    // 在折点处补圆，避免粗线的接缝缺口
    if line_width > 1.5 {
      let radius = half.round() as i32;
      for p in &path {
        let center = to_pixel(p);
        draw_filled_circle_mut(&mut mask, (center.x, center.y), radius, MASK_ON);
      }
    }

    self.blend_mask(&mask, region, color);
  }

  fn fill_rect(&mut self, rect: BoundingBox, color: Rgba<u8>) {
    let (x0, y0) = (rect.x.round(), rect.y.round());
    let Some(region) = self.clip(x0, y0, x0 + rect.width.round(), y0 + rect.height.round()) else {
      return;
    };
    // 矩形与叠加层的交集就是覆盖区域，不需要遮罩
    for y in region.y..region.y + region.height {
      for x in region.x..region.x + region.width {
        self.image.get_pixel_mut(x, y).blend(&color);
      }
    }
  }

  fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba<u8>) {
    let radius = radius.round().clamp(0.0, self.margin());
    let Some(region) = self.visible_region(&[center], radius + 1.0) else {
      return;
    };
    let c = to_pixel(&self.to_local(center, region));
    let mut mask = region.mask();
    draw_filled_circle_mut(&mut mask, (c.x, c.y), radius as i32, MASK_ON);
    self.blend_mask(&mask, region, color);
  }

  fn measure_text(&self, text: &str, font_size: f32) -> f32 {
    match &self.font {
      Some(font) => text_size(PxScale::from(font_size), font, text).0 as f32,
      None => text.chars().count() as f32 * font_size * ESTIMATED_CHAR_WIDTH,
    }
  }

  fn fill_text(&mut self, text: &str, center: Point, font_size: f32, color: Rgba<u8>) {
    if !self.within_margin(center) {
      return;
    }
    let Some(font) = &self.font else {
      return;
    };
    let scale = PxScale::from(font_size);
    let (w, h) = text_size(scale, font, text);
    let x = (center.x - w as f32 / 2.0).round() as i32;
    let y = (center.y - h as f32 / 2.0).round() as i32;
    draw_text_mut(&mut self.image, color, x, y, scale, font, text);
  }
}

// 该文件是 Yanse （察言观色） 项目的一部分。
// src/utils.rs - 工具函数
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

use url::Url;

/// 从 URL 中取出本地路径，处理百分号编码（例如路径中的空格、中文）。
pub fn url_to_path(url: &Url) -> PathBuf {
  let raw = url.path();
  match urlencoding::decode(raw) {
    Ok(decoded) => PathBuf::from(decoded.into_owned()),
    Err(_) => PathBuf::from(raw),
  }
}

/// 查询参数中是否出现某个键（不关心取值）
pub fn has_query_key(url: &Url, key: &str) -> bool {
  url.query_pairs().any(|(k, _)| k == key)
}

/// 读取并解析查询参数，不存在或解析失败时返回 `None`
pub fn query_value<T: std::str::FromStr>(url: &Url, key: &str) -> Option<T> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .and_then(|(_, v)| v.parse().ok())
}

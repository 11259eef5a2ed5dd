use crate::types::AssetMeta;

/// Reads width/height straight out of well-known image headers, per
/// spec.md §4.4 ("PNG/JPEG/GIF/WEBP headers"). Returns `None` for formats
/// we don't special-case (bmp/ico/icns/avif/icxl) — the asset is still
/// registered, just without dimensions.
pub fn read_image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
  read_png(bytes)
    .or_else(|| read_gif(bytes))
    .or_else(|| read_jpeg(bytes))
    .or_else(|| read_webp(bytes))
}

fn read_png(bytes: &[u8]) -> Option<(u32, u32)> {
  const SIG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
  if bytes.len() < 24 || &bytes[0..8] != SIG {
    return None;
  }
  let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
  let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
  Some((width, height))
}

fn read_gif(bytes: &[u8]) -> Option<(u32, u32)> {
  if bytes.len() < 10 || (&bytes[0..6] != b"GIF87a" && &bytes[0..6] != b"GIF89a") {
    return None;
  }
  let width = u16::from_le_bytes(bytes[6..8].try_into().ok()?) as u32;
  let height = u16::from_le_bytes(bytes[8..10].try_into().ok()?) as u32;
  Some((width, height))
}

fn read_webp(bytes: &[u8]) -> Option<(u32, u32)> {
  if bytes.len() < 30 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WEBP" {
    return None;
  }
  match &bytes[12..16] {
    b"VP8 " => {
      let width = u16::from_le_bytes(bytes[26..28].try_into().ok()?) as u32 & 0x3fff;
      let height = u16::from_le_bytes(bytes[28..30].try_into().ok()?) as u32 & 0x3fff;
      Some((width, height))
    }
    b"VP8L" => {
      let b0 = bytes[21] as u32;
      let b1 = bytes[22] as u32;
      let b2 = bytes[23] as u32;
      let b3 = bytes[24] as u32;
      let width = 1 + (((b1 & 0x3f) << 8) | b0);
      let height = 1 + (((b3 & 0xf) << 10) | (b2 << 2) | (b1 >> 6));
      Some((width, height))
    }
    _ => None,
  }
}

fn read_jpeg(bytes: &[u8]) -> Option<(u32, u32)> {
  if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
    return None;
  }
  let mut i = 2usize;
  while i + 9 < bytes.len() {
    if bytes[i] != 0xFF {
      i += 1;
      continue;
    }
    let marker = bytes[i + 1];
    if (0xC0..=0xCF).contains(&marker) && marker != 0xC4 && marker != 0xC8 && marker != 0xCC {
      let height = u16::from_be_bytes(bytes[i + 5..i + 7].try_into().ok()?) as u32;
      let width = u16::from_be_bytes(bytes[i + 7..i + 9].try_into().ok()?) as u32;
      return Some((width, height));
    }
    let segment_len = u16::from_be_bytes(bytes[i + 2..i + 4].try_into().ok()?) as usize;
    i += 2 + segment_len;
  }
  None
}

/// Extracts the `@2x`/`@3x`-style scale suffix from a basename, defaulting
/// to `[1]` when absent, per spec.md §4.4.
pub fn scale_from_name(stem: &str) -> (String, Vec<f32>) {
  if let Some(at_pos) = stem.rfind('@') {
    if let Some(x_pos) = stem[at_pos..].find('x') {
      let scale_str = &stem[at_pos + 1..at_pos + x_pos];
      if let Ok(scale) = scale_str.parse::<f32>() {
        return (stem[..at_pos].to_string(), vec![scale]);
      }
    }
  }
  (stem.to_string(), vec![1.0])
}

/// The asset module's one dependency: the registry it hands itself off
/// to. Tracked as a real specifier so it goes through the same
/// `dependencyMap[i]` lowering as every other `require`, per spec.md
/// §4.2 — an asset module's factory receives the exact same
/// `(global, require, ..., dependencyMap)` signature as any other.
pub const ASSET_REGISTRY_SPECIFIER: &str = "react-native/Libraries/Image/AssetRegistry";

/// Builds the AssetRegistry stub code for an asset module, per spec.md
/// §4.2 step 8. The generated module is still wrapped by `__d()` by the
/// serializer like any other module; only the body differs from a normal
/// transformed module. `registry_dependency_index` is this module's index
/// into its own `dependencyMap` for [`ASSET_REGISTRY_SPECIFIER`].
pub fn asset_stub_code(meta: &AssetMeta, http_server_location: &str, registry_dependency_index: usize) -> String {
  let scales = meta
    .scales
    .iter()
    .map(|s| s.to_string())
    .collect::<Vec<_>>()
    .join(", ");

  format!(
    "module.exports = require(dependencyMap[{index}]).registerAsset({{\
\"name\":\"{name}\",\"type\":\"{asset_type}\",\"httpServerLocation\":\"{location}\",\
\"width\":{width},\"height\":{height},\"scales\":[{scales}]}});",
    index = registry_dependency_index,
    name = meta.name,
    asset_type = meta.asset_type,
    location = http_server_location,
    width = meta.width.map(|w| w.to_string()).unwrap_or_else(|| "null".into()),
    height = meta.height.map(|h| h.to_string()).unwrap_or_else(|| "null".into()),
    scales = scales,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_png_header_dimensions() {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 8]); // length + IHDR chunk type
    bytes.extend_from_slice(&100u32.to_be_bytes());
    bytes.extend_from_slice(&200u32.to_be_bytes());
    assert_eq!(read_image_dimensions(&bytes), Some((100, 200)));
  }

  #[test]
  fn extracts_scale_suffix() {
    assert_eq!(scale_from_name("icon@2x"), ("icon".to_string(), vec![2.0]));
    assert_eq!(scale_from_name("icon"), ("icon".to_string(), vec![1.0]));
  }

  #[test]
  fn stub_code_requires_the_registry_through_the_dependency_map() {
    let meta = AssetMeta {
      name: "icon".into(),
      asset_type: "png".into(),
      width: Some(10),
      height: Some(10),
      scales: vec![1.0],
    };
    let code = asset_stub_code(&meta, "/assets", 0);
    assert!(code.contains("require(dependencyMap[0])"));
    assert!(!code.contains("react-native/Libraries/Image/AssetRegistry"));
  }
}

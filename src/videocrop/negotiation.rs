// Copyright (C) 2026 The rsvideocrop developers
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

use gst::glib;
use gst_video::VideoFormat;

use super::geometry::{Geometry, Margins, NegotiationError};

/// Packed single-plane formats the crop can copy pixel by pixel.
pub const FORMATS: [VideoFormat; 10] = [
    VideoFormat::Rgbx,
    VideoFormat::Bgrx,
    VideoFormat::Xrgb,
    VideoFormat::Xbgr,
    VideoFormat::Rgba,
    VideoFormat::Bgra,
    VideoFormat::Argb,
    VideoFormat::Abgr,
    VideoFormat::Rgb,
    VideoFormat::Bgr,
];

/// Caps accepted on both pads: every supported format with unconstrained
/// width and height.
pub fn template_caps() -> gst::Caps {
    gst_video::VideoCapsBuilder::new()
        .format_list(FORMATS)
        .build()
}

/// Restricts `local` to what `filter` accepts, in the filter's order of
/// preference.
pub fn intersect_caps(local: &gst::Caps, filter: Option<&gst::Caps>) -> gst::Caps {
    match filter {
        Some(filter) => filter.intersect_with_mode(local, gst::CapsIntersectMode::First),
        None => local.clone(),
    }
}

/// First negotiation phase: what the other pad can accept given `caps` on
/// this pad.
///
/// Cropping changes nothing but the frame size, so every other field of
/// `caps` is kept and only width and height are opened up again.
pub fn propose_caps(caps: &gst::Caps, filter: Option<&gst::Caps>) -> gst::Caps {
    let mut other_caps = gst::Caps::new_empty();

    {
        let other_caps = other_caps.get_mut().unwrap();

        for s in caps.iter() {
            let mut s = s.to_owned();
            s.set("width", gst::IntRange::new(1, i32::MAX));
            s.set("height", gst::IntRange::new(1, i32::MAX));
            other_caps.append_structure(s);
        }
    }

    let local = other_caps.intersect_with_mode(&template_caps(), gst::CapsIntersectMode::First);

    intersect_caps(&local, filter)
}

/// Second negotiation phase.
///
/// Towards upstream (`direction` is `Src`) the downstream size request is
/// taken as is. Towards downstream the output size is derived from the fixed
/// input caps and `margins`, and `othercaps` is fixated to the closest size
/// it supports.
pub fn fixate_caps(
    direction: gst::PadDirection,
    caps: &gst::Caps,
    mut othercaps: gst::Caps,
    margins: &Margins,
) -> Result<gst::Caps, NegotiationError> {
    if othercaps.is_empty() {
        return Err(NegotiationError::UnsupportedFormat { format: None });
    }

    if direction == gst::PadDirection::Src {
        othercaps.fixate();
        return Ok(othercaps);
    }

    let s = caps
        .structure(0)
        .ok_or(NegotiationError::UnsupportedFormat { format: None })?;
    let in_width = s
        .get::<i32>("width")
        .map_err(|_| NegotiationError::NotFixed { field: "width" })?;
    let in_height = s
        .get::<i32>("height")
        .map_err(|_| NegotiationError::NotFixed { field: "height" })?;
    let in_format = s
        .get::<&str>("format")
        .map_err(|_| NegotiationError::NotFixed { field: "format" })?
        .to_owned();

    let (width, height) = margins.output_size(in_width as u32, in_height as u32)?;

    othercaps.truncate();
    {
        let othercaps = othercaps.make_mut();
        let s = othercaps
            .structure_mut(0)
            .ok_or(NegotiationError::UnsupportedFormat { format: None })?;

        s.fixate_field_str("format", &in_format);
        if s.get::<&str>("format").ok() != Some(in_format.as_str()) {
            return Err(NegotiationError::UnsupportedFormat {
                format: Some(in_format),
            });
        }

        fixate_nearest_int(s, "width", width as i32)?;
        fixate_nearest_int(s, "height", height as i32)?;
    }

    othercaps.fixate();

    Ok(othercaps)
}

/// Fixates `field` to the value closest to `target`.
///
/// Handles fixed integers, integer ranges (including their step) and lists
/// of either. Equally close candidates resolve to the smaller one. A missing
/// field is set to `target`.
pub fn fixate_nearest_int(
    s: &mut gst::StructureRef,
    field: &str,
    target: i32,
) -> Result<i32, NegotiationError> {
    let nearest = match s.value(field) {
        Err(_) => target,
        Ok(value) => nearest_in_domain(value, target).ok_or_else(|| {
            NegotiationError::NoCandidate {
                field: field.to_owned(),
            }
        })?,
    };

    s.set(field, nearest);

    Ok(nearest)
}

fn nearest_in_domain(value: &glib::SendValue, target: i32) -> Option<i32> {
    if let Ok(value) = value.get::<i32>() {
        return Some(value);
    }

    if let Ok(range) = value.get::<gst::IntRange<i32>>() {
        return Some(nearest_in_range(range.min(), range.max(), range.step(), target));
    }

    if let Ok(list) = value.get::<gst::List>() {
        return list
            .iter()
            .filter_map(|value| nearest_in_domain(value, target))
            .min_by_key(|&candidate| {
                let distance = (i64::from(candidate) - i64::from(target)).abs();
                (distance, candidate)
            });
    }

    None
}

fn nearest_in_range(min: i32, max: i32, step: i32, target: i32) -> i32 {
    let (min, max, step) = (i64::from(min), i64::from(max), i64::from(step));
    let target = i64::from(target).clamp(min, max);

    if step <= 1 {
        return target as i32;
    }

    let below = min + (target - min) / step * step;
    let above = below + step;

    if above > max || target - below <= above - target {
        below as i32
    } else {
        above as i32
    }
}

pub fn decide_passthrough(
    in_info: &gst_video::VideoInfo,
    out_info: &gst_video::VideoInfo,
) -> bool {
    in_info.width() == out_info.width() && in_info.height() == out_info.height()
}

/// Builds the geometry for the negotiated caps.
///
/// `margins` are validated against the input size again, the output size is
/// taken from `out_info` as downstream may have picked a different size than
/// the one requested during fixation.
pub fn negotiated_geometry(
    in_info: &gst_video::VideoInfo,
    out_info: &gst_video::VideoInfo,
    margins: Margins,
) -> Result<Geometry, NegotiationError> {
    if in_info.format() != out_info.format() {
        return Err(NegotiationError::FormatMismatch {
            input: in_info.format().to_string(),
            output: out_info.format().to_string(),
        });
    }

    if !FORMATS.contains(&in_info.format()) {
        return Err(NegotiationError::UnsupportedFormat {
            format: Some(in_info.format().to_string()),
        });
    }

    margins.output_size(in_info.width(), in_info.height())?;

    Ok(Geometry {
        in_width: in_info.width(),
        in_height: in_info.height(),
        out_width: out_info.width(),
        out_height: out_info.height(),
        passthrough: decide_passthrough(in_info, out_info),
        margins,
    })
}

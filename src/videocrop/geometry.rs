// Copyright (C) 2026 The rsvideocrop developers
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

use std::fmt;

use thiserror::Error;

/// Largest magnitude a single margin may have, matching `G_MAXINT`.
pub const MAX_MARGIN: i32 = i32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Width,
    Height,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Width => f.write_str("width"),
            Dimension::Height => f.write_str("height"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Margin {value} is outside of the supported range")]
pub struct InvalidMargin {
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("Cropping {margins} pixels from an input {dimension} of {input} leaves no picture")]
    InvalidCrop {
        dimension: Dimension,
        margins: i64,
        input: u32,
    },
    #[error("Output {dimension} of {size} pixels is not representable")]
    OutputOverflow { dimension: Dimension, size: i64 },
    #[error("No common format, input format is {format:?}")]
    UnsupportedFormat { format: Option<String> },
    #[error("Input and output formats differ: {input} != {output}")]
    FormatMismatch { input: String, output: String },
    #[error("Field '{field}' is not fixed")]
    NotFixed { field: &'static str },
    #[error("Field '{field}' has no integer candidates")]
    NoCandidate { field: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("No geometry negotiated yet")]
    NotConfigured,
    #[error(
        "Input frame is {actual_width}x{actual_height} but {expected_width}x{expected_height} was negotiated"
    )]
    InputMismatch {
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },
    #[error(
        "Output frame is {actual_width}x{actual_height} but the crop produces {expected_width}x{expected_height}"
    )]
    GeometryMismatch {
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },
    #[error("Crop rectangle does not overlap the input frame")]
    EmptySource,
    #[error("Invalid frame layout: {0}")]
    InvalidFrame(&'static str),
}

/// Signed crop margins. Positive values remove pixels from the
/// corresponding edge, negative values add that many pixels of padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Margins {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Margins {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Result<Self, InvalidMargin> {
        for value in [left, top, right, bottom] {
            if value < -MAX_MARGIN {
                return Err(InvalidMargin { value });
            }
        }

        Ok(Margins {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Output size for an input of `in_width`x`in_height`.
    ///
    /// Fails if the margins of one axis remove the whole input extent or if
    /// the padded result does not fit into a caps integer.
    pub fn output_size(
        &self,
        in_width: u32,
        in_height: u32,
    ) -> Result<(u32, u32), NegotiationError> {
        let width = output_extent(Dimension::Width, in_width, self.left, self.right)?;
        let height = output_extent(Dimension::Height, in_height, self.top, self.bottom)?;

        Ok((width, height))
    }
}

fn output_extent(
    dimension: Dimension,
    input: u32,
    start: i32,
    end: i32,
) -> Result<u32, NegotiationError> {
    let margins = i64::from(start) + i64::from(end);
    if margins >= i64::from(input) {
        return Err(NegotiationError::InvalidCrop {
            dimension,
            margins,
            input,
        });
    }

    let size = i64::from(input) - margins;
    if size > i64::from(i32::MAX) {
        return Err(NegotiationError::OutputOverflow { dimension, size });
    }

    Ok(size as u32)
}

/// Result of a successful negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub in_width: u32,
    pub in_height: u32,
    pub out_width: u32,
    pub out_height: u32,
    pub passthrough: bool,
    pub margins: Margins,
}

/// Source rectangle inside the input frame plus the padding around it in
/// the output frame, all in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub pad_left: usize,
    pub pad_top: usize,
    pub pad_right: usize,
    pub pad_bottom: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    len: usize,
    pad_start: usize,
    pad_end: usize,
}

// Only the positive part of the leading margin moves the read start, the
// trailing margin moves the read end. Both bounds stay inside the frame.
fn span(start_margin: i32, end_margin: i32, extent: usize) -> Span {
    let extent_i = extent as i64;
    let start = i64::from(start_margin).clamp(0, extent_i);
    let end = (extent_i - i64::from(end_margin)).clamp(0, extent_i);

    Span {
        start: start as usize,
        len: (end - start).max(0) as usize,
        pad_start: (-i64::from(start_margin)).max(0) as usize,
        pad_end: (-i64::from(end_margin)).max(0) as usize,
    }
}

impl CropRegion {
    pub fn compute(
        margins: &Margins,
        in_width: usize,
        in_height: usize,
    ) -> Result<Self, TransformError> {
        let cols = span(margins.left, margins.right, in_width);
        let rows = span(margins.top, margins.bottom, in_height);

        if cols.len == 0 || rows.len == 0 {
            return Err(TransformError::EmptySource);
        }

        Ok(CropRegion {
            x: cols.start,
            y: rows.start,
            width: cols.len,
            height: rows.len,
            pad_left: cols.pad_start,
            pad_top: rows.pad_start,
            pad_right: cols.pad_end,
            pad_bottom: rows.pad_end,
        })
    }

    pub fn output_size(&self) -> (usize, usize) {
        (
            self.pad_left + self.width + self.pad_right,
            self.pad_top + self.height + self.pad_bottom,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_margins_range() {
        assert!(Margins::new(-MAX_MARGIN, MAX_MARGIN, 0, 0).is_ok());
        assert_eq!(
            Margins::new(0, i32::MIN, 0, 0),
            Err(InvalidMargin { value: i32::MIN })
        );
    }

    #[test]
    fn test_output_size() {
        let margins = Margins::new(10, 20, 20, 10).unwrap();
        assert_eq!(margins.output_size(640, 480), Ok((610, 450)));

        assert_eq!(Margins::default().output_size(320, 240), Ok((320, 240)));

        let margins = Margins::new(-5, 0, 0, 0).unwrap();
        assert_eq!(margins.output_size(100, 100), Ok((105, 100)));
    }

    #[test]
    fn test_output_size_invalid_crop() {
        let margins = Margins::new(400, 0, 300, 0).unwrap();
        assert_eq!(
            margins.output_size(640, 480),
            Err(NegotiationError::InvalidCrop {
                dimension: Dimension::Width,
                margins: 700,
                input: 640,
            })
        );

        let margins = Margins::new(0, 240, 0, 240).unwrap();
        assert!(matches!(
            margins.output_size(640, 480),
            Err(NegotiationError::InvalidCrop {
                dimension: Dimension::Height,
                ..
            })
        ));
    }

    #[test]
    fn test_output_size_overflow() {
        let margins = Margins::new(-MAX_MARGIN, 0, -MAX_MARGIN, 0).unwrap();
        assert!(matches!(
            margins.output_size(640, 480),
            Err(NegotiationError::OutputOverflow {
                dimension: Dimension::Width,
                ..
            })
        ));
    }

    #[test]
    fn test_region_crop() {
        let margins = Margins::new(10, 20, 20, 10).unwrap();
        let region = CropRegion::compute(&margins, 640, 480).unwrap();

        // rows [20:470], cols [10:620]
        assert_eq!((region.x, region.x + region.width), (10, 620));
        assert_eq!((region.y, region.y + region.height), (20, 470));
        assert_eq!(
            (
                region.pad_left,
                region.pad_top,
                region.pad_right,
                region.pad_bottom
            ),
            (0, 0, 0, 0)
        );
        assert_eq!(region.output_size(), (610, 450));
    }

    #[test]
    fn test_region_padding() {
        let margins = Margins::new(-5, 0, 0, 0).unwrap();
        let region = CropRegion::compute(&margins, 100, 100).unwrap();

        assert_eq!((region.x, region.width), (0, 100));
        assert_eq!(region.pad_left, 5);
        assert_eq!(region.output_size(), (105, 100));
    }

    #[test]
    fn test_region_trailing_padding_stays_in_frame() {
        let margins = Margins::new(0, 0, -1000, -3).unwrap();
        let region = CropRegion::compute(&margins, 64, 48).unwrap();

        assert_eq!((region.x, region.width), (0, 64));
        assert_eq!((region.y, region.height), (0, 48));
        assert_eq!((region.pad_right, region.pad_bottom), (1000, 3));
        assert_eq!(region.output_size(), (1064, 51));
    }

    #[test]
    fn test_region_mixed() {
        let margins = Margins::new(8, -2, -4, 6).unwrap();
        let region = CropRegion::compute(&margins, 32, 16).unwrap();

        assert_eq!((region.x, region.width), (8, 24));
        assert_eq!((region.y, region.height), (0, 10));
        assert_eq!((region.pad_top, region.pad_right), (2, 4));
        assert_eq!(region.output_size(), (28, 12));
        assert_eq!(margins.output_size(32, 16), Ok((28, 12)));
    }

    #[test]
    fn test_region_empty() {
        // Leading margin beyond the frame with enough trailing padding to
        // still pass negotiation.
        let margins = Margins::new(150, 0, -60, 0).unwrap();
        assert_eq!(margins.output_size(100, 10), Ok((10, 10)));
        assert_eq!(
            CropRegion::compute(&margins, 100, 10),
            Err(TransformError::EmptySource)
        );
    }
}

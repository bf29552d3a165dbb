// Copyright (C) 2026 The rsvideocrop developers
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

use gst_video::prelude::*;

use super::geometry::{CropRegion, Geometry, TransformError};

/// Value written to every channel of padding pixels.
pub const FILL_VALUE: u8 = 0;

fn check_layout(
    len: usize,
    width: usize,
    height: usize,
    stride: usize,
    pixel_stride: usize,
) -> Result<(), TransformError> {
    if pixel_stride == 0 {
        return Err(TransformError::InvalidFrame("pixel stride is zero"));
    }

    let line_bytes = width
        .checked_mul(pixel_stride)
        .ok_or(TransformError::InvalidFrame("line size overflows"))?;
    if line_bytes > stride {
        return Err(TransformError::InvalidFrame("stride smaller than a line"));
    }

    if height > 0 && (height - 1) * stride + line_bytes > len {
        return Err(TransformError::InvalidFrame("plane smaller than the frame"));
    }

    Ok(())
}

/// Read-only view of the first plane of a packed frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameRef<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    stride: usize,
    pixel_stride: usize,
}

impl<'a> FrameRef<'a> {
    pub fn new(
        data: &'a [u8],
        width: usize,
        height: usize,
        stride: usize,
        pixel_stride: usize,
    ) -> Result<Self, TransformError> {
        check_layout(data.len(), width, height, stride, pixel_stride)?;

        Ok(FrameRef {
            data,
            width,
            height,
            stride,
            pixel_stride,
        })
    }

    pub fn from_video_frame(
        frame: &'a gst_video::VideoFrameRef<&gst::BufferRef>,
    ) -> Result<Self, TransformError> {
        let data = frame
            .plane_data(0)
            .map_err(|_| TransformError::InvalidFrame("plane 0 not mapped"))?;

        FrameRef::new(
            data,
            frame.width() as usize,
            frame.height() as usize,
            frame.plane_stride()[0] as usize,
            frame.format_info().pixel_stride()[0] as usize,
        )
    }

    /// Pixels of line `y`, without the stride padding.
    pub fn line(&self, y: usize) -> &'a [u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width * self.pixel_stride]
    }
}

/// Writable view of the first plane of a packed frame.
#[derive(Debug)]
pub struct FrameMut<'a> {
    data: &'a mut [u8],
    width: usize,
    height: usize,
    stride: usize,
    pixel_stride: usize,
}

impl<'a> FrameMut<'a> {
    pub fn new(
        data: &'a mut [u8],
        width: usize,
        height: usize,
        stride: usize,
        pixel_stride: usize,
    ) -> Result<Self, TransformError> {
        check_layout(data.len(), width, height, stride, pixel_stride)?;

        Ok(FrameMut {
            data,
            width,
            height,
            stride,
            pixel_stride,
        })
    }

    pub fn from_video_frame(
        frame: &'a mut gst_video::VideoFrameRef<&mut gst::BufferRef>,
    ) -> Result<Self, TransformError> {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let stride = frame.plane_stride()[0] as usize;
        let pixel_stride = frame.format_info().pixel_stride()[0] as usize;
        let data = frame
            .plane_data_mut(0)
            .map_err(|_| TransformError::InvalidFrame("plane 0 not mapped"))?;

        FrameMut::new(data, width, height, stride, pixel_stride)
    }

    #[cfg(test)]
    pub fn line(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width * self.pixel_stride]
    }

    fn lines_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        let line_bytes = self.width * self.pixel_stride;
        self.data
            .chunks_mut(self.stride)
            .take(self.height)
            .map(move |line| &mut line[..line_bytes])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The output buffer is the input buffer, nothing was written.
    Passthrough,
    Cropped(CropRegion),
}

/// Crops `input` into `output` according to `geometry`.
///
/// The source rectangle is copied into the interior of `output`, padding
/// around it is filled with [`FILL_VALUE`].
pub fn crop_frame(
    input: &FrameRef<'_>,
    output: &mut FrameMut<'_>,
    geometry: &Geometry,
) -> Result<CropRegion, TransformError> {
    let expected_input = (geometry.in_width as usize, geometry.in_height as usize);
    if (input.width, input.height) != expected_input {
        return Err(TransformError::InputMismatch {
            expected_width: expected_input.0,
            expected_height: expected_input.1,
            actual_width: input.width,
            actual_height: input.height,
        });
    }

    if input.pixel_stride != output.pixel_stride {
        return Err(TransformError::InvalidFrame("pixel strides differ"));
    }

    let negotiated = (geometry.out_width as usize, geometry.out_height as usize);
    if (output.width, output.height) != negotiated {
        return Err(TransformError::GeometryMismatch {
            expected_width: negotiated.0,
            expected_height: negotiated.1,
            actual_width: output.width,
            actual_height: output.height,
        });
    }

    // Downstream may have settled on a size the margins don't produce
    let region = CropRegion::compute(&geometry.margins, input.width, input.height)?;
    let (expected_width, expected_height) = region.output_size();
    if (expected_width, expected_height) != negotiated {
        return Err(TransformError::GeometryMismatch {
            expected_width,
            expected_height,
            actual_width: negotiated.0,
            actual_height: negotiated.1,
        });
    }

    let pixel_stride = output.pixel_stride;
    let pad_left_bytes = region.pad_left * pixel_stride;
    let copy_bytes = region.width * pixel_stride;
    let src_start = region.x * pixel_stride;

    for (y, out_line) in output.lines_mut().enumerate() {
        let src_y = y
            .checked_sub(region.pad_top)
            .filter(|&src_y| src_y < region.height);

        let Some(src_y) = src_y else {
            out_line.fill(FILL_VALUE);
            continue;
        };

        let (pad_left, rest) = out_line.split_at_mut(pad_left_bytes);
        let (interior, pad_right) = rest.split_at_mut(copy_bytes);

        pad_left.fill(FILL_VALUE);
        pad_right.fill(FILL_VALUE);

        let in_line = input.line(region.y + src_y);
        interior.copy_from_slice(&in_line[src_start..src_start + copy_bytes]);
    }

    Ok(region)
}

/// Copies `input` unmodified into `output`, aligned to the top-left corner.
///
/// Whatever part of `output` is not covered by `input` is filled with
/// [`FILL_VALUE`]. Used for frames that could not be cropped.
pub fn copy_unmodified(input: &FrameRef<'_>, output: &mut FrameMut<'_>) {
    let in_line_bytes = input.width * input.pixel_stride;

    for (y, out_line) in output.lines_mut().enumerate() {
        if y >= input.height {
            out_line.fill(FILL_VALUE);
            continue;
        }

        let copy_bytes = in_line_bytes.min(out_line.len());
        let (copied, rest) = out_line.split_at_mut(copy_bytes);
        copied.copy_from_slice(&input.line(y)[..copy_bytes]);
        rest.fill(FILL_VALUE);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Unconfigured,
    Passthrough(Geometry),
    Cropping(Geometry),
}

/// Per-stream crop state, configured once per negotiation.
#[derive(Debug, Default)]
pub struct Engine {
    state: EngineState,
}

impl Engine {
    pub fn configure(&mut self, geometry: Geometry) {
        self.state = if geometry.passthrough {
            EngineState::Passthrough(geometry)
        } else {
            EngineState::Cropping(geometry)
        };
    }

    pub fn reset(&mut self) {
        self.state = EngineState::Unconfigured;
    }

    #[cfg(test)]
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    #[cfg(test)]
    pub fn geometry(&self) -> Option<&Geometry> {
        match &self.state {
            EngineState::Unconfigured => None,
            EngineState::Passthrough(geometry) | EngineState::Cropping(geometry) => {
                Some(geometry)
            }
        }
    }

    pub fn transform_frame(
        &self,
        input: &FrameRef<'_>,
        output: &mut FrameMut<'_>,
    ) -> Result<FrameOutcome, TransformError> {
        match &self.state {
            EngineState::Unconfigured => Err(TransformError::NotConfigured),
            EngineState::Passthrough(_) => Ok(FrameOutcome::Passthrough),
            EngineState::Cropping(geometry) => {
                crop_frame(input, output, geometry).map(FrameOutcome::Cropped)
            }
        }
    }
}

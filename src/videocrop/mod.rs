// Copyright (C) 2026 The rsvideocrop developers
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

/**
 * SECTION:element-rsvideocrop
 *
 * Crops or pads raw video by a signed number of pixels on each side.
 *
 * Positive `left`, `top`, `right` and `bottom` values remove that many pixels
 * from the corresponding edge, negative values add black (all channels zero)
 * padding instead. The output size is negotiated from the input size and the
 * margins, and the element operates in passthrough mode whenever the output
 * has the same size as the input.
 *
 * Changing a margin while playing triggers a renegotiation.
 *
 * ## Example launch line
 * ```bash
 * gst-launch-1.0 videotestsrc ! videoconvert ! rsvideocrop left=10 top=20 right=20 bottom=10 ! videoconvert ! autovideosink
 * ```
 */
use gst::glib;
use gst::prelude::*;

mod geometry;
mod imp;
mod negotiation;
mod transform;

glib::wrapper! {
    pub struct VideoCrop(ObjectSubclass<imp::VideoCrop>) @extends gst_video::VideoFilter, gst_base::BaseTransform, gst::Element, gst::Object;
}

pub fn register(plugin: &gst::Plugin) -> Result<(), glib::BoolError> {
    gst::Element::register(
        Some(plugin),
        "rsvideocrop",
        gst::Rank::NONE,
        VideoCrop::static_type(),
    )
}

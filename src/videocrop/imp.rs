// Copyright (C) 2026 The rsvideocrop developers
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

use gst::glib;
use gst::prelude::*;
use gst::subclass::prelude::*;
use gst_base::prelude::*;
use gst_base::subclass::prelude::*;
use gst_video::subclass::prelude::*;

use std::sync::LazyLock;
use std::sync::Mutex;

use super::geometry::{MAX_MARGIN, Margins, TransformError};
use super::negotiation;
use super::transform::{self, Engine, FrameMut, FrameOutcome, FrameRef};

static CAT: LazyLock<gst::DebugCategory> = LazyLock::new(|| {
    gst::DebugCategory::new(
        "rsvideocrop",
        gst::DebugColorFlags::empty(),
        Some("Rust video crop"),
    )
});

const DEFAULT_MARGIN: i32 = 0;

#[derive(Debug, Clone, Copy, Default)]
struct Settings {
    margins: Margins,
}

#[derive(Debug, Default)]
struct State {
    engine: Engine,
    // A frame already went through the fallback copy with the current geometry
    fallback_warned: bool,
}

#[derive(Default)]
pub struct VideoCrop {
    settings: Mutex<Settings>,
    // Margins used by the last sink-side fixation, consumed by set_info()
    fixated_margins: Mutex<Option<Margins>>,
    state: Mutex<State>,
}

impl VideoCrop {
    fn margin_pspec(name: &str, nick: &str, blurb: &str) -> glib::ParamSpec {
        glib::ParamSpecInt::builder(name)
            .nick(nick)
            .blurb(blurb)
            .minimum(-MAX_MARGIN)
            .maximum(MAX_MARGIN)
            .default_value(DEFAULT_MARGIN)
            .mutable_playing()
            .build()
    }
}

#[glib::object_subclass]
impl ObjectSubclass for VideoCrop {
    const NAME: &'static str = "GstRsVideoCrop";
    type Type = super::VideoCrop;
    type ParentType = gst_video::VideoFilter;
}

impl ObjectImpl for VideoCrop {
    fn properties() -> &'static [glib::ParamSpec] {
        static PROPERTIES: LazyLock<Vec<glib::ParamSpec>> = LazyLock::new(|| {
            vec![
                VideoCrop::margin_pspec(
                    "left",
                    "Left",
                    "Pixels to crop at the left, negative values add padding",
                ),
                VideoCrop::margin_pspec(
                    "top",
                    "Top",
                    "Pixels to crop at the top, negative values add padding",
                ),
                VideoCrop::margin_pspec(
                    "right",
                    "Right",
                    "Pixels to crop at the right, negative values add padding",
                ),
                VideoCrop::margin_pspec(
                    "bottom",
                    "Bottom",
                    "Pixels to crop at the bottom, negative values add padding",
                ),
            ]
        });

        PROPERTIES.as_ref()
    }

    fn set_property(&self, _id: usize, value: &glib::Value, pspec: &glib::ParamSpec) {
        let mut settings = self.settings.lock().unwrap();
        let Margins {
            mut left,
            mut top,
            mut right,
            mut bottom,
        } = settings.margins;
        let margin = match pspec.name() {
            "left" => &mut left,
            "top" => &mut top,
            "right" => &mut right,
            "bottom" => &mut bottom,
            _ => unimplemented!(),
        };

        let old_margin = *margin;
        let new_margin = value.get::<i32>().expect("type checked upstream");
        if old_margin == new_margin {
            return;
        }
        *margin = new_margin;

        let margins = match Margins::new(left, top, right, bottom) {
            Ok(margins) => margins,
            Err(err) => {
                gst::error!(CAT, imp = self, "Not changing {}: {}", pspec.name(), err);
                return;
            }
        };

        gst::info!(
            CAT,
            imp = self,
            "Changing {} from {} to {}",
            pspec.name(),
            old_margin,
            new_margin
        );
        settings.margins = margins;
        drop(settings);

        self.obj().reconfigure_src();
    }

    fn property(&self, _id: usize, pspec: &glib::ParamSpec) -> glib::Value {
        let margins = self.settings.lock().unwrap().margins;

        match pspec.name() {
            "left" => margins.left.to_value(),
            "top" => margins.top.to_value(),
            "right" => margins.right.to_value(),
            "bottom" => margins.bottom.to_value(),
            _ => unimplemented!(),
        }
    }
}

impl GstObjectImpl for VideoCrop {}

impl ElementImpl for VideoCrop {
    fn metadata() -> Option<&'static gst::subclass::ElementMetadata> {
        static ELEMENT_METADATA: LazyLock<gst::subclass::ElementMetadata> = LazyLock::new(|| {
            gst::subclass::ElementMetadata::new(
                "Video Crop",
                "Filter/Effect/Converter/Video",
                "Crops or pads raw video frames by signed pixel margins",
                "The rsvideocrop developers",
            )
        });

        Some(&*ELEMENT_METADATA)
    }

    fn pad_templates() -> &'static [gst::PadTemplate] {
        static PAD_TEMPLATES: LazyLock<Vec<gst::PadTemplate>> = LazyLock::new(|| {
            let caps = negotiation::template_caps();
            let src_pad_template = gst::PadTemplate::new(
                "src",
                gst::PadDirection::Src,
                gst::PadPresence::Always,
                &caps,
            )
            .unwrap();

            let sink_pad_template = gst::PadTemplate::new(
                "sink",
                gst::PadDirection::Sink,
                gst::PadPresence::Always,
                &caps,
            )
            .unwrap();

            vec![src_pad_template, sink_pad_template]
        });

        PAD_TEMPLATES.as_ref()
    }
}

impl BaseTransformImpl for VideoCrop {
    const MODE: gst_base::subclass::BaseTransformMode =
        gst_base::subclass::BaseTransformMode::NeverInPlace;
    const PASSTHROUGH_ON_SAME_CAPS: bool = false;
    const TRANSFORM_IP_ON_PASSTHROUGH: bool = false;

    fn stop(&self) -> Result<(), gst::ErrorMessage> {
        let mut state = self.state.lock().unwrap();
        state.engine.reset();
        state.fallback_warned = false;
        drop(state);
        *self.fixated_margins.lock().unwrap() = None;

        gst::info!(CAT, imp = self, "Stopped");

        Ok(())
    }

    fn transform_caps(
        &self,
        direction: gst::PadDirection,
        caps: &gst::Caps,
        filter: Option<&gst::Caps>,
    ) -> Option<gst::Caps> {
        let other_caps = negotiation::propose_caps(caps, filter);

        gst::debug!(
            CAT,
            imp = self,
            "Transformed caps from {} to {} in direction {:?}",
            caps,
            other_caps,
            direction
        );

        Some(other_caps)
    }

    fn fixate_caps(
        &self,
        direction: gst::PadDirection,
        caps: &gst::Caps,
        othercaps: gst::Caps,
    ) -> gst::Caps {
        let margins = self.settings.lock().unwrap().margins;

        match negotiation::fixate_caps(direction, caps, othercaps, &margins) {
            Ok(fixated) => {
                gst::debug!(
                    CAT,
                    imp = self,
                    "Fixated to {} with margins {:?} in direction {:?}",
                    fixated,
                    margins,
                    direction
                );

                if direction == gst::PadDirection::Sink {
                    *self.fixated_margins.lock().unwrap() = Some(margins);
                }

                fixated
            }
            Err(err) => {
                gst::element_imp_error!(
                    self,
                    gst::CoreError::Negotiation,
                    ["Failed to fixate caps {}: {}", caps, err]
                );

                gst::Caps::new_empty()
            }
        }
    }
}

impl VideoFilterImpl for VideoCrop {
    fn set_info(
        &self,
        incaps: &gst::Caps,
        in_info: &gst_video::VideoInfo,
        outcaps: &gst::Caps,
        out_info: &gst_video::VideoInfo,
    ) -> Result<(), gst::LoggableError> {
        let margins = self
            .fixated_margins
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| self.settings.lock().unwrap().margins);

        let geometry = negotiation::negotiated_geometry(in_info, out_info, margins)
            .map_err(|err| gst::loggable_error!(CAT, "Failed to configure crop: {}", err))?;

        gst::debug!(
            CAT,
            imp = self,
            "Configured for caps {} to {}: {:?}",
            incaps,
            outcaps,
            geometry
        );

        self.obj().set_passthrough(geometry.passthrough);

        let mut state = self.state.lock().unwrap();
        state.engine.configure(geometry);
        state.fallback_warned = false;
        drop(state);

        self.parent_set_info(incaps, in_info, outcaps, out_info)
    }

    fn transform_frame(
        &self,
        in_frame: &gst_video::VideoFrameRef<&gst::BufferRef>,
        out_frame: &mut gst_video::VideoFrameRef<&mut gst::BufferRef>,
    ) -> Result<gst::FlowSuccess, gst::FlowError> {
        let mut state = self.state.lock().unwrap();

        let frames = FrameRef::from_video_frame(in_frame)
            .and_then(|input| Ok((input, FrameMut::from_video_frame(out_frame)?)));
        let (input, mut output) = frames.map_err(|err| {
            gst::element_imp_error!(
                self,
                gst::CoreError::Failed,
                ["Failed to access frame: {}", err]
            );
            gst::FlowError::Error
        })?;

        let res = state.engine.transform_frame(&input, &mut output);
        match res {
            Ok(FrameOutcome::Cropped(region)) => {
                gst::log!(CAT, imp = self, "Cropped frame with {:?}", region);
            }
            Ok(FrameOutcome::Passthrough) => {
                gst::log!(CAT, imp = self, "Passing through frame");
            }
            Err(TransformError::NotConfigured) => {
                gst::element_imp_error!(
                    self,
                    gst::CoreError::Negotiation,
                    ["Have no geometry yet"]
                );
                return Err(gst::FlowError::NotNegotiated);
            }
            Err(err) => {
                if state.fallback_warned {
                    gst::log!(CAT, imp = self, "Passing on frame unmodified: {}", err);
                } else {
                    gst::warning!(
                        CAT,
                        imp = self,
                        "Failed to crop frame, passing it and following frames on unmodified: {}",
                        err
                    );
                    state.fallback_warned = true;
                }
                transform::copy_unmodified(&input, &mut output);
            }
        }

        Ok(gst::FlowSuccess::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::videocrop::geometry::Geometry;

    fn init() {
        use std::sync::Once;
        static INIT: Once = Once::new();

        INIT.call_once(|| {
            gst::init().unwrap();
            crate::plugin_register_static().expect("failed to register plugin");
        });
    }

    fn harness(
        margins: Margins,
        sink_caps: Option<&str>,
    ) -> (gst::Element, gst_check::Harness) {
        let crop = gst::ElementFactory::make("rsvideocrop")
            .property("left", margins.left)
            .property("top", margins.top)
            .property("right", margins.right)
            .property("bottom", margins.bottom)
            .build()
            .unwrap();

        let mut h = gst_check::Harness::with_element(&crop, Some("sink"), Some("src"));
        if let Some(sink_caps) = sink_caps {
            h.set_sink_caps_str(sink_caps);
        }
        h.play();

        (crop, h)
    }

    fn push_frame(
        h: &mut gst_check::Harness,
        info: &gst_video::VideoInfo,
    ) -> Result<gst::FlowSuccess, gst::FlowError> {
        h.push(gst::Buffer::with_size(info.size()).unwrap())
    }

    fn state<T>(crop: &gst::Element, f: impl FnOnce(&State) -> T) -> T {
        let crop = crop.downcast_ref::<super::super::VideoCrop>().unwrap();
        f(&crop.imp().state.lock().unwrap())
    }

    fn geometry(crop: &gst::Element) -> Option<Geometry> {
        state(crop, |state| state.engine.geometry().copied())
    }

    fn output_size(h: &gst_check::Harness) -> (i32, i32) {
        let caps = h.sinkpad().unwrap().current_caps().unwrap();
        let s = caps.structure(0).unwrap();
        (s.get("width").unwrap(), s.get("height").unwrap())
    }

    #[test]
    fn test_failed_renegotiation_keeps_geometry() {
        init();

        let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Bgrx, 320, 240)
            .build()
            .unwrap();
        let (crop, mut h) = harness(Margins::new(10, 0, 10, 0).unwrap(), None);
        h.set_src_caps(info.to_caps().unwrap());

        assert_eq!(push_frame(&mut h, &info), Ok(gst::FlowSuccess::Ok));
        h.pull().unwrap();

        let configured = geometry(&crop).unwrap();
        assert_eq!((configured.out_width, configured.out_height), (300, 240));
        assert!(!configured.passthrough);

        crop.set_property("left", 400i32);
        assert_eq!(push_frame(&mut h, &info), Err(gst::FlowError::NotNegotiated));
        assert!(h.try_pull().is_none());

        assert_eq!(geometry(&crop), Some(configured));
        assert_eq!(output_size(&h), (300, 240));
    }

    #[test]
    fn test_fallback_warned_once_per_geometry() {
        init();

        let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Bgrx, 640, 480)
            .build()
            .unwrap();
        let (crop, mut h) = harness(
            Margins::new(10, 20, 20, 10).unwrap(),
            Some("video/x-raw, format=BGRx, width=(int)[ 100, 600 ], height=(int)[ 1, 2147483647 ]"),
        );
        h.set_src_caps(info.to_caps().unwrap());

        assert!(!state(&crop, |state| state.fallback_warned));

        for _ in 0..3 {
            assert_eq!(push_frame(&mut h, &info), Ok(gst::FlowSuccess::Ok));
            h.pull().unwrap();
            assert!(state(&crop, |state| state.fallback_warned));
        }
        assert_eq!(output_size(&h), (600, 450));

        // A geometry downstream accepts as is
        crop.set_property("left", 0i32);
        crop.set_property("right", 40i32);

        assert_eq!(push_frame(&mut h, &info), Ok(gst::FlowSuccess::Ok));
        h.pull().unwrap();
        assert_eq!(output_size(&h), (600, 450));
        assert!(!state(&crop, |state| state.fallback_warned));
    }

    #[test]
    fn test_stop_resets_state() {
        init();

        let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgb, 64, 48)
            .build()
            .unwrap();
        let (crop, mut h) = harness(Margins::new(4, 4, 4, 4).unwrap(), None);
        h.set_src_caps(info.to_caps().unwrap());

        assert_eq!(push_frame(&mut h, &info), Ok(gst::FlowSuccess::Ok));
        assert!(geometry(&crop).is_some());

        crop.set_state(gst::State::Null).unwrap();
        assert_eq!(geometry(&crop), None);
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Effect parameters for the colour-balance and blur stages

use super::pipeline::{BALANCE_ELEMENT, BLUR_ELEMENT};
use crate::backends::EffectKind;
use ::gstreamer as gst;
use gst::prelude::*;
use tracing::{debug, warn};

/// Property values for `videobalance` and `gaussianblur`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParams {
    /// -1.0 ..= 1.0
    pub brightness: f64,
    /// 0.0 ..= 2.0
    pub contrast: f64,
    /// 0.0 ..= 2.0
    pub saturation: f64,
    /// Positive blurs, negative sharpens
    pub blur_sigma: f64,
}

impl EffectParams {
    pub const NEUTRAL: EffectParams = EffectParams {
        brightness: 0.0,
        contrast: 1.0,
        saturation: 1.0,
        blur_sigma: 0.0,
    };

    pub fn for_effect(effect: Option<EffectKind>) -> Self {
        match effect {
            None => Self::NEUTRAL,
            // Soften and brighten slightly
            Some(EffectKind::Beauty) => EffectParams {
                brightness: 0.06,
                contrast: 1.0,
                saturation: 1.1,
                blur_sigma: 1.2,
            },
            // Sharpen edges and push colours
            Some(EffectKind::Cartoon) => EffectParams {
                brightness: 0.0,
                contrast: 1.6,
                saturation: 1.9,
                blur_sigma: -1.5,
            },
            Some(EffectKind::Blur) => EffectParams {
                blur_sigma: 6.0,
                ..Self::NEUTRAL
            },
        }
    }

    /// Set the parameters on a running pipeline
    ///
    /// Pipelines built without the blur stage only get the colour balance.
    pub fn apply(&self, pipeline: &gst::Pipeline) {
        match pipeline.by_name(BALANCE_ELEMENT) {
            Some(balance) => {
                balance.set_property("brightness", self.brightness);
                balance.set_property("contrast", self.contrast);
                balance.set_property("saturation", self.saturation);
            }
            None => warn!("Effect stage missing from pipeline"),
        }
        if let Some(blur) = pipeline.by_name(BLUR_ELEMENT) {
            blur.set_property("sigma", self.blur_sigma);
        } else if self.blur_sigma != 0.0 {
            debug!("gaussianblur not available, skipping blur component");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_effect_is_neutral() {
        assert_eq!(EffectParams::for_effect(None), EffectParams::NEUTRAL);
    }

    #[test]
    fn test_params_within_element_ranges() {
        for kind in [EffectKind::Beauty, EffectKind::Cartoon, EffectKind::Blur] {
            let p = EffectParams::for_effect(Some(kind));
            assert!((-1.0..=1.0).contains(&p.brightness));
            assert!((0.0..=2.0).contains(&p.contrast));
            assert!((0.0..=2.0).contains(&p.saturation));
            assert!((-20.0..=20.0).contains(&p.blur_sigma));
            assert_ne!(p, EffectParams::NEUTRAL);
        }
    }
}

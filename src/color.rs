//! Channel-order-aware colors and their `#rrggbb` encoding.
//!
//! Decoders, clusterers and encoders do not agree on whether the first byte of a
//! pixel is red or blue. Every [`Color`] therefore carries a [`ChannelOrder`]
//! tag, and the only way to move between orders is through the explicit
//! conversions in this module.

use std::fmt;
use std::str::FromStr;

use palette::Srgb;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Storage order of the three channels of a [`Color`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// Red, green, blue. Used for display and hex output.
    Rgb,
    /// Blue, green, red.
    Bgr,
}

impl ChannelOrder {
    fn flipped(self) -> Self {
        match self {
            ChannelOrder::Rgb => ChannelOrder::Bgr,
            ChannelOrder::Bgr => ChannelOrder::Rgb,
        }
    }
}

/// An 8-bit color tagged with the order its channels are stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub channels: [u8; 3],
    pub order: ChannelOrder,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            channels: [r, g, b],
            order: ChannelOrder::Rgb,
        }
    }

    pub const fn bgr(b: u8, g: u8, r: u8) -> Self {
        Self {
            channels: [b, g, r],
            order: ChannelOrder::Bgr,
        }
    }

    /// Same color, stored red first. No-op when already RGB.
    pub fn to_rgb(self) -> Self {
        match self.order {
            ChannelOrder::Rgb => self,
            ChannelOrder::Bgr => self.reordered(),
        }
    }

    /// Same color, stored blue first. No-op when already BGR.
    pub fn to_bgr(self) -> Self {
        match self.order {
            ChannelOrder::Bgr => self,
            ChannelOrder::Rgb => self.reordered(),
        }
    }

    /// `[r, g, b]` regardless of how the color is stored.
    pub fn rgb_channels(self) -> [u8; 3] {
        self.to_rgb().channels
    }

    pub fn to_hex(self) -> String {
        rgb_to_hex(self)
    }

    fn reordered(self) -> Self {
        Self {
            channels: swap_channels(self.channels),
            order: self.order.flipped(),
        }
    }
}

impl From<Srgb<u8>> for Color {
    fn from(c: Srgb<u8>) -> Self {
        Color::rgb(c.red, c.green, c.blue)
    }
}

impl From<Color> for Srgb<u8> {
    fn from(c: Color) -> Self {
        let [r, g, b] = c.rgb_channels();
        Srgb::new(r, g, b)
    }
}

impl From<Color> for image::Rgb<u8> {
    fn from(c: Color) -> Self {
        image::Rgb(c.rgb_channels())
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&rgb_to_hex(*self))
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex(s)
    }
}

/// Exchange the first and third elements. Applying it twice is the identity.
#[inline]
pub fn swap_channels<T>([a, b, c]: [T; 3]) -> [T; 3] {
    [c, b, a]
}

/// Reinterpret a BGR-tagged color as RGB.
///
/// Fails if `color` is not tagged BGR; use [`Color::to_rgb`] to normalize a
/// color of unknown order.
pub fn bgr_to_rgb(color: Color) -> Result<Color> {
    match color.order {
        ChannelOrder::Bgr => Ok(color.reordered()),
        ChannelOrder::Rgb => Err(Error::invalid(
            "channel order",
            "bgr_to_rgb expects a BGR color",
        )),
    }
}

/// Reinterpret an RGB-tagged color as BGR.
pub fn rgb_to_bgr(color: Color) -> Result<Color> {
    match color.order {
        ChannelOrder::Rgb => Ok(color.reordered()),
        ChannelOrder::Bgr => Err(Error::invalid(
            "channel order",
            "rgb_to_bgr expects an RGB color",
        )),
    }
}

/// `#rrggbb`, lowercase, zero padded, always in red-green-blue order.
pub fn rgb_to_hex(color: Color) -> String {
    let [r, g, b] = color.rgb_channels();
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Parse `#rrggbb` or `rrggbb` (either case) into an RGB color.
pub fn parse_hex(s: &str) -> Result<Color> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::invalid(
            "hex color",
            format!("{s:?} is not of the form #rrggbb"),
        ));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .map_err(|e| Error::invalid("hex color", format!("{s:?}: {e}")))
    };
    Ok(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

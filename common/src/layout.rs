use core::convert::Infallible;

use embedded_graphics::{
    mono_font::{ascii::FONT_8X13, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
    text::{Baseline, Text},
};
use embedded_hal::i2c::I2c;

use crate::{
    sh1106::{DisplayError, Sh1106},
    types::Snapshot,
};

pub const GLYPH_WIDTH: u32 = 8;
pub const SPLASH_MESSAGE: &str = "START SYSTEMU...";
const GLYPH_HEIGHT: u32 = 13;

const LABEL_X: i32 = 0;
const VALUE_X: i32 = 75;
const ROW_TEMPERATURE_Y: i32 = 0;
const ROW_HUMIDITY_Y: i32 = 16;
const ROW_DEW_POINT_Y: i32 = 32;
const DIVIDER_Y: i32 = 48;
const SPLASH_Y: i32 = 25;

pub fn centered_x(text: &str, display_width: u32) -> u32 {
    let text_width = text.chars().count() as u32 * GLYPH_WIDTH;
    display_width.saturating_sub(text_width) / 2
}

pub fn draw_snapshot<D>(target: &mut D, snapshot: &Snapshot) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let size = target.bounding_box().size;
    let style = MonoTextStyle::new(&FONT_8X13, BinaryColor::On);
    let reading = snapshot.reading;

    target.clear(BinaryColor::Off)?;

    let rows = [
        ("Teplota", format!("{:.1} C", reading.temperature_c), ROW_TEMPERATURE_Y),
        ("Vlhkost", format!("{:.1} %", reading.humidity_pct), ROW_HUMIDITY_Y),
        ("Rosny b.", format!("{:.1} C", reading.dew_point_c), ROW_DEW_POINT_Y),
    ];
    for (label, value, y) in &rows {
        Text::with_baseline(label, Point::new(LABEL_X, *y), style, Baseline::Top).draw(target)?;
        Text::with_baseline(value, Point::new(VALUE_X, *y), style, Baseline::Top).draw(target)?;
    }

    let right = size.width.saturating_sub(1) as i32;
    Line::new(Point::new(0, DIVIDER_Y), Point::new(right, DIVIDER_Y))
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
        .draw(target)?;

    let address = snapshot.address.to_string();
    let x = centered_x(&address, size.width) as i32;
    let y = size.height.saturating_sub(GLYPH_HEIGHT) as i32;
    Text::with_baseline(&address, Point::new(x, y), style, Baseline::Top).draw(target)?;

    Ok(())
}

pub fn draw_splash<D>(target: &mut D, message: &str) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(BinaryColor::Off)?;
    Text::with_baseline(
        message,
        Point::new(0, SPLASH_Y),
        MonoTextStyle::new(&FONT_8X13, BinaryColor::On),
        Baseline::Top,
    )
    .draw(target)?;
    Ok(())
}

pub struct DisplayRenderer<I2C> {
    panel: Sh1106<I2C>,
}

impl<I2C: I2c> DisplayRenderer<I2C> {
    pub fn new(panel: Sh1106<I2C>) -> Self {
        Self { panel }
    }

    pub fn render(&mut self, snapshot: &Snapshot) -> Result<(), DisplayError<I2C::Error>> {
        draw_snapshot(&mut self.panel, snapshot).unwrap_or_else(|never: Infallible| match never {});
        self.panel.flush()
    }

    pub fn splash(&mut self, message: &str) -> Result<(), DisplayError<I2C::Error>> {
        draw_splash(&mut self.panel, message).unwrap_or_else(|never: Infallible| match never {});
        self.panel.flush()
    }

    pub fn power_off(&mut self) -> Result<(), DisplayError<I2C::Error>> {
        self.panel.power_off()
    }

    pub fn panel(&self) -> &Sh1106<I2C> {
        &self.panel
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        sh1106::DEFAULT_ADDRESS,
        types::{NetworkAddress, Reading},
    };

    struct NullBus;

    impl ErrorType for NullBus {
        type Error = ErrorKind;
    }

    impl I2c for NullBus {
        fn transaction(&mut self, _: u8, _: &mut [Operation<'_>]) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn snapshot(address: NetworkAddress) -> Snapshot {
        Snapshot {
            reading: Reading::from_sample(23.4, 41.0),
            address,
        }
    }

    #[test]
    fn glyph_width_matches_font() {
        assert_eq!(FONT_8X13.character_size.width, GLYPH_WIDTH);
        assert_eq!(FONT_8X13.character_size.height, GLYPH_HEIGHT);
    }

    #[test]
    fn centers_dotted_quad() {
        assert_eq!(centered_x("192.168.1.5", 128), 20);
    }

    #[test]
    fn overlong_text_clamps_to_left_edge() {
        assert_eq!(centered_x("a very long address string", 128), 0);
    }

    #[test]
    fn divider_spans_full_width() {
        let panel = Sh1106::new(NullBus, DEFAULT_ADDRESS, 128, 64).unwrap();
        let mut renderer = DisplayRenderer::new(panel);

        renderer
            .render(&snapshot(NetworkAddress::Assigned(Ipv4Addr::new(192, 168, 1, 5))))
            .unwrap();

        let panel = renderer.panel();
        assert!((0..128).all(|x| panel.pixel(x, DIVIDER_Y as u32)));
    }

    #[test]
    fn address_row_starts_at_centered_column() {
        let panel = Sh1106::new(NullBus, DEFAULT_ADDRESS, 128, 64).unwrap();
        let mut renderer = DisplayRenderer::new(panel);

        renderer
            .render(&snapshot(NetworkAddress::Assigned(Ipv4Addr::new(192, 168, 1, 5))))
            .unwrap();

        let panel = renderer.panel();
        let lit_in_address_row = |x: u32| (51..64).any(|y| panel.pixel(x, y));
        assert!((0..20).all(|x| !lit_in_address_row(x)));
        assert!((108..128).all(|x| !lit_in_address_row(x)));
        assert!((20..108).any(lit_in_address_row));
    }

    #[test]
    fn rendering_replaces_previous_frame() {
        let panel = Sh1106::new(NullBus, DEFAULT_ADDRESS, 128, 64).unwrap();
        let mut renderer = DisplayRenderer::new(panel);

        renderer.splash("START SYSTEMU...").unwrap();
        let splash_lit = (0..128).any(|x| renderer.panel().pixel(x, 30));
        assert!(splash_lit);

        renderer.render(&snapshot(NetworkAddress::Unassigned)).unwrap();
        assert!(!(0..128).any(|x| renderer.panel().pixel(x, DIVIDER_Y as u32 + 1)));
    }
}

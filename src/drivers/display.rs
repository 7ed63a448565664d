// TerraLog — SH1107 OLED Driver (128x128, I2C)
//
// Framebuffer plus page-mode blit over the shared bus. Text rendering goes
// through embedded-graphics so the library's `Panel` trait only ever deals
// in rows of characters.

use embedded_graphics::mono_font::ascii::FONT_8X13;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};

use terralog::config::{
    DISPLAY_ROW_PITCH, I2C_ADDR_OLED, I2C_TIMEOUT_TICKS, SCREEN_HEIGHT, SCREEN_WIDTH,
};
use terralog::peripherals::{Panel, PeripheralError};

use crate::drivers::{bus_err, SharedBus};

const PAGES: usize = (SCREEN_HEIGHT / 8) as usize;
const BUFFER_SIZE: usize = (SCREEN_WIDTH as usize * SCREEN_HEIGHT as usize) / 8; // 2048

// Control bytes: Co = 0, D/C# selects command vs. display data.
const CTRL_COMMAND: u8 = 0x00;
const CTRL_DATA: u8 = 0x40;

// Power-up sequence for the 128x128 module, rotated 180 degrees so the
// text reads correctly in the enclosure.
const INIT_SEQUENCE: &[u8] = &[
    0xAE, // display off
    0x20, // page addressing mode
    0x81, 0x2F, // contrast
    0xA0, // segment remap (180-degree rotation, with 0xC0)
    0xC0, // common scan direction
    0xA8, 0x7F, // multiplex ratio: 128 lines
    0xD3, 0x00, // display offset
    0xDC, 0x00, // display start line
    0xD5, 0x50, // oscillator divide
    0xD9, 0x22, // pre-charge period
    0xDB, 0x35, // VCOM deselect
    0xAD, 0x8A, // DC-DC converter on
    0xA4, // follow RAM contents
    0xA6, // normal polarity
];

const CMD_DISPLAY_ON: u8 = 0xAF;
const CMD_DISPLAY_OFF: u8 = 0xAE;

pub struct Sh1107 {
    bus: SharedBus,
    buffer: [u8; BUFFER_SIZE],
}

impl Sh1107 {
    pub fn new(bus: SharedBus) -> Self {
        Self {
            bus,
            buffer: [0u8; BUFFER_SIZE],
        }
    }

    /// Configure the panel and show a blank frame.
    pub fn init(&mut self) -> anyhow::Result<()> {
        self.command_sequence(INIT_SEQUENCE)?;
        self.command_sequence(&[CMD_DISPLAY_ON])?;
        self.flush()?;
        log::info!("SH1107 initialised ({}x{})", SCREEN_WIDTH, SCREEN_HEIGHT);
        Ok(())
    }

    fn command_sequence(&mut self, commands: &[u8]) -> Result<(), PeripheralError> {
        let mut frame = Vec::with_capacity(commands.len() + 1);
        frame.push(CTRL_COMMAND);
        frame.extend_from_slice(commands);
        let mut bus = self.bus.lock().unwrap();
        bus.write(I2C_ADDR_OLED, &frame, I2C_TIMEOUT_TICKS)
            .map_err(bus_err)
    }

    /// Blit the framebuffer, one 128-byte page at a time.
    fn flush(&mut self) -> Result<(), PeripheralError> {
        for page in 0..PAGES {
            self.command_sequence(&[0xB0 | page as u8, 0x00, 0x10])?;

            let start = page * SCREEN_WIDTH as usize;
            let mut frame = Vec::with_capacity(SCREEN_WIDTH as usize + 1);
            frame.push(CTRL_DATA);
            frame.extend_from_slice(&self.buffer[start..start + SCREEN_WIDTH as usize]);

            let mut bus = self.bus.lock().unwrap();
            bus.write(I2C_ADDR_OLED, &frame, I2C_TIMEOUT_TICKS)
                .map_err(bus_err)?;
        }
        Ok(())
    }
}

impl OriginDimensions for Sh1107 {
    fn size(&self) -> Size {
        Size::new(SCREEN_WIDTH, SCREEN_HEIGHT)
    }
}

impl DrawTarget for Sh1107 {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0
                || point.y < 0
                || point.x >= SCREEN_WIDTH as i32
                || point.y >= SCREEN_HEIGHT as i32
            {
                continue;
            }
            let (x, y) = (point.x as usize, point.y as usize);
            let index = (y / 8) * SCREEN_WIDTH as usize + x;
            let mask = 1 << (y % 8);
            match color {
                BinaryColor::On => self.buffer[index] |= mask,
                BinaryColor::Off => self.buffer[index] &= !mask,
            }
        }
        Ok(())
    }
}

impl Panel for Sh1107 {
    fn draw_rows(&mut self, rows: &[&str]) -> Result<(), PeripheralError> {
        self.buffer.fill(0);

        let style = MonoTextStyle::new(&FONT_8X13, BinaryColor::On);
        for (i, row) in rows.iter().enumerate() {
            let origin = Point::new(0, (i as u32 * DISPLAY_ROW_PITCH) as i32);
            // Infallible: drawing only touches the framebuffer.
            let _ = Text::with_baseline(row, origin, style, Baseline::Top).draw(self);
        }

        self.flush()
    }

    fn set_sleep(&mut self, sleeping: bool) -> Result<(), PeripheralError> {
        if sleeping {
            self.buffer.fill(0);
            self.flush()?;
            self.command_sequence(&[CMD_DISPLAY_OFF])
        } else {
            self.command_sequence(&[CMD_DISPLAY_ON])
        }
    }
}

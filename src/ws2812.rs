//! [`PixelSink`] for a WS2812 strip driven by an RP2040 PIO state machine.

use embassy_rp::Peri;
use embassy_rp::dma::Channel;
use embassy_rp::pio::{Common, Instance, PioPin, StateMachine};
use embassy_rp::pio_programs::ws2812::{Grb, PioWs2812, PioWs2812Program};

use crate::Result;
use crate::matrix::{STRIP_LEDS, StripBuffer};
use crate::player::PixelSink;

/// The whole matrix strip on one PIO state machine, GRB byte order.
pub struct Ws2812Sink<'d, P: Instance, const S: usize> {
    driver: PioWs2812<'d, P, S, STRIP_LEDS, Grb>,
}

impl<'d, P: Instance, const S: usize> Ws2812Sink<'d, P, S> {
    /// Load the WS2812 program into `common` and bind it to `state_machine`, `dma`, and `pin`.
    pub fn new(
        common: &mut Common<'d, P>,
        state_machine: StateMachine<'d, P, S>,
        dma: Peri<'d, impl Channel>,
        pin: Peri<'d, impl PioPin>,
    ) -> Self {
        let program = PioWs2812Program::new(common);
        Self {
            driver: PioWs2812::new(common, state_machine, dma, pin, &program),
        }
    }
}

impl<P: Instance, const S: usize> PixelSink for Ws2812Sink<'_, P, S> {
    async fn write_strip(&mut self, strip: &StripBuffer) -> Result<()> {
        self.driver.write(strip).await;
        Ok(())
    }
}

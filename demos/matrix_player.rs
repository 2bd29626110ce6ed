#![allow(missing_docs)]
//! Firmware: serve the upload page over a Pico W access point and play animations on an
//! 8×7 (+8 status LEDs) WS2812 matrix wired to GPIO4.
//!
//! Build with `--no-default-features --features embedded --target thumbv6m-none-eabi`.

#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]
#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::{convert::Infallible, panic};

use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::{InterruptHandler, Pio};
use embassy_time::Duration;
use matrix_player::{
    Result,
    access_point::ApIdentity,
    access_point::radio::{RadioPins, start_access_point},
    control::Controller,
    frame_store::FrameStore,
    player::{PlaybackConfig, PlaybackEngine},
    server::{RECEIVE_BUFFER_BYTES, serve},
    storage::FlashAnimationStorage,
    storage::rp_flash::RpFlashRegion,
    ws2812::Ws2812Sink,
};
use static_cell::ConstStaticCell;
use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

/// Played when nothing usable has been saved.
const DEFAULT_ANIMATION: &[u8] = include_bytes!("../data/default.json");

/// Networks the player advertises, in turn.
static AP_IDENTITIES: [ApIdentity; 2] = [
    ApIdentity::new("LED-Matrix", "66667777"),
    ApIdentity::new("LED-Matrix-2", "77776666"),
];
const ROTATION_PERIOD: Duration = Duration::from_secs(10 * 60);

static FRAME_STORE: FrameStore = FrameStore::new();
static RECEIVE_BUFFER: ConstStaticCell<[u8; RECEIVE_BUFFER_BYTES]> =
    ConstStaticCell::new([0; RECEIVE_BUFFER_BYTES]);

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());
    let buffer = RECEIVE_BUFFER.take();

    // Saved upload first, bundled default otherwise. Either way playback starts at once.
    let storage = FlashAnimationStorage::new(RpFlashRegion::new(p.FLASH));
    let mut controller = Controller::new(&FRAME_STORE, storage);
    match controller.restore(buffer, DEFAULT_ANIMATION) {
        Some(frames) => info!("Playing {} frames", frames),
        None => warn!("Nothing to play until an upload arrives"),
    }

    let Pio {
        mut common, sm0, ..
    } = Pio::new(p.PIO0, Irqs);
    let sink = Ws2812Sink::new(&mut common, sm0, p.DMA_CH1, p.PIN_4);
    let token = playback_task(sink);
    spawner.spawn(token)?;

    let stack = start_access_point(
        RadioPins {
            power: p.PIN_23,
            clock: p.PIN_24,
            chip_select: p.PIN_25,
            data: p.PIN_29,
            pio: p.PIO1,
            dma: p.DMA_CH0,
        },
        &AP_IDENTITIES,
        ROTATION_PERIOD,
        spawner,
    )
    .await?;

    serve(stack, &mut controller, buffer).await
}

#[embassy_executor::task]
async fn playback_task(sink: Ws2812Sink<'static, PIO0, 0>) -> ! {
    PlaybackEngine::new(&FRAME_STORE, sink, PlaybackConfig::new())
        .run()
        .await
}

//! CYW43 bring-up as a WPA2 access point with a static address, a DHCP server for
//! joining clients, and identity rotation.

#![allow(clippy::future_not_send, reason = "single-threaded")]

use cyw43::{Control, NetDriver, PowerManagementMode, Runner as RadioRunner};
use cyw43_pio::{DEFAULT_CLOCK_DIVIDER, PioSpi};
use embassy_executor::Spawner;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{
    Config, Ipv4Address, Ipv4Cidr, Runner as NetRunner, Stack, StackResources, StaticConfigV4,
};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIN_23, PIN_24, PIN_25, PIN_29, PIO1};
use embassy_rp::pio::{InterruptHandler, Pio};
use embassy_rp::{Peri, bind_interrupts};
use embassy_time::{Duration, Instant, Timer};
use static_cell::StaticCell;

use super::dhcp::{CLIENT_PORT, DhcpServer, REPLY_BYTES, SERVER_PORT};
use super::{AP_ADDRESS, AP_PREFIX_LEN, ApIdentity, IdentityRotation};
use crate::Result;

/// 2.4 GHz channel the access point uses.
pub const AP_CHANNEL: u8 = 6;

bind_interrupts!(struct Irqs {
    PIO1_IRQ_0 => InterruptHandler<PIO1>;
});

type Spi = PioSpi<'static, PIO1, 0, DMA_CH0>;

/// The Pico W's fixed wiring to the CYW43 chip.
pub struct RadioPins {
    /// CYW43 power.
    pub power: Peri<'static, PIN_23>,
    /// CYW43 clock.
    pub clock: Peri<'static, PIN_24>,
    /// CYW43 chip select.
    pub chip_select: Peri<'static, PIN_25>,
    /// CYW43 data.
    pub data: Peri<'static, PIN_29>,
    /// PIO block driving the SPI link.
    pub pio: Peri<'static, PIO1>,
    /// DMA channel for the SPI link.
    pub dma: Peri<'static, DMA_CH0>,
}

/// Power up the radio, advertise the first identity, and start the network stack at
/// `192.168.4.1/24`.
///
/// Spawns the radio, network runner, and DHCP tasks plus, when there is more than one
/// identity, the rotation task. Returns the stack for the HTTP server.
///
/// # Errors
///
/// Returns [`crate::Error::TaskSpawn`] if a task pool is exhausted.
pub async fn start_access_point(
    pins: RadioPins,
    identities: &'static [ApIdentity],
    rotation_period: Duration,
    spawner: Spawner,
) -> Result<Stack<'static>> {
    let firmware = cyw43_firmware::CYW43_43439A0;
    let clm = cyw43_firmware::CYW43_43439A0_CLM;

    let power = Output::new(pins.power, Level::Low);
    let chip_select = Output::new(pins.chip_select, Level::High);
    let mut pio = Pio::new(pins.pio, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        chip_select,
        pins.clock,
        pins.data,
        pins.dma,
    );

    static RADIO_STATE: StaticCell<cyw43::State> = StaticCell::new();
    let radio_state = RADIO_STATE.init(cyw43::State::new());
    let (net_device, mut control, radio_runner) =
        cyw43::new(radio_state, power, spi, firmware).await;
    let token = radio_task(radio_runner);
    spawner.spawn(token)?;

    control.init(clm).await;
    control
        .set_power_management(PowerManagementMode::PowerSave)
        .await;

    let config = Config::ipv4_static(StaticConfigV4 {
        address: Ipv4Cidr::new(
            Ipv4Address::new(AP_ADDRESS[0], AP_ADDRESS[1], AP_ADDRESS[2], AP_ADDRESS[3]),
            AP_PREFIX_LEN,
        ),
        gateway: None,
        dns_servers: Default::default(),
    });
    static NET_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
    let seed = Instant::now().as_ticks() ^ 0x5EED_1ED5_0000_0000;
    let (stack, net_runner) = embassy_net::new(
        net_device,
        config,
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );
    let token = net_task(net_runner);
    spawner.spawn(token)?;
    let token = dhcp_task(stack);
    spawner.spawn(token)?;

    let rotation = IdentityRotation::new(identities, rotation_period, Instant::now());
    let first = rotation.current();
    control
        .start_ap_wpa2(first.ssid, first.passphrase, AP_CHANNEL)
        .await;
    info!("AP up: {} at 192.168.4.1", first.ssid);

    if identities.len() > 1 {
        let token = rotation_task(control, rotation);
        spawner.spawn(token)?;
    }
    Ok(stack)
}

#[embassy_executor::task]
async fn radio_task(runner: RadioRunner<'static, Output<'static>, Spi>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: NetRunner<'static, NetDriver<'static>>) -> ! {
    runner.run().await
}

/// Answer DHCP requests on the access point's subnet. Replies are broadcast, since
/// clients have no address yet.
#[embassy_executor::task]
async fn dhcp_task(stack: Stack<'static>) -> ! {
    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buffer = [0u8; 1536];
    let mut tx_meta = [PacketMetadata::EMPTY; 2];
    let mut tx_buffer = [0u8; 2 * REPLY_BYTES];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    if let Err(err) = socket.bind(SERVER_PORT) {
        error!("DHCP: bind failed: {:?}", err);
        core::future::pending::<()>().await;
    }
    info!("DHCP: serving {}.{}.{}.x", AP_ADDRESS[0], AP_ADDRESS[1], AP_ADDRESS[2]);

    let mut server = DhcpServer::new(AP_ADDRESS, AP_PREFIX_LEN);
    let mut request = [0u8; 576];
    let mut reply = [0u8; REPLY_BYTES];
    loop {
        let len = match socket.recv_from(&mut request).await {
            Ok((len, _)) => len,
            Err(err) => {
                debug!("DHCP: receive failed: {:?}", err);
                continue;
            }
        };
        if server.respond(&request[..len], &mut reply).is_none() {
            continue;
        }
        if let Err(err) = socket
            .send_to(&reply, (Ipv4Address::BROADCAST, CLIENT_PORT))
            .await
        {
            debug!("DHCP: send failed: {:?}", err);
        }
    }
}

/// Re-advertise under the next identity whenever a rotation period elapses.
#[embassy_executor::task]
async fn rotation_task(mut control: Control<'static>, mut rotation: IdentityRotation<'static>) -> ! {
    loop {
        Timer::at(rotation.next_switch()).await;
        if let Some(identity) = rotation.poll(Instant::now()) {
            control.close_ap().await;
            control
                .start_ap_wpa2(identity.ssid, identity.passphrase, AP_CHANNEL)
                .await;
        }
    }
}

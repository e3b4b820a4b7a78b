#![no_std]
#![no_main]

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use embassy_time::Delay;
use esp_backtrace as _;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::spi::Mode as SpiMode;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::Async;
use static_cell::StaticCell;

use picofly_link::config::{lora_defaults, spi};
use picofly_link::lora::{ModemConfig, PollingCompletion, SpiRegisterBus, Sx127xDriver};

#[cfg(not(feature = "ground-station"))]
use picofly_link::protocol::FlightTargets;
#[cfg(not(feature = "ground-station"))]
use picofly_link::tasks::TelemetryLink;
#[cfg(not(feature = "ground-station"))]
use picofly_link::telemetry::{FlightStatus, Shared, SharedStatus, SharedTargets, TelemetryStatus};
#[cfg(feature = "ground-station")]
use picofly_link::tasks::{GroundRelay, UplinkChannel};

/// The radio as wired on the board
type Radio = Sx127xDriver<
    SpiRegisterBus<Spi<'static, Async>, Output<'static>>,
    Output<'static>,
    PollingCompletion<Delay>,
    Delay,
>;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Telemetry record, written by collaborators and read by the link
#[cfg(not(feature = "ground-station"))]
static STATUS: SharedStatus = Shared::new(TelemetryStatus::new());

/// Targets received from the ground
#[cfg(not(feature = "ground-station"))]
static TARGETS: SharedTargets = Shared::new(FlightTargets::new());

/// Host frames waiting for the radio
#[cfg(feature = "ground-station")]
static UPLINK: UplinkChannel = UplinkChannel::new();

#[esp_hal::main]
fn main() -> ! {
    // The ground station's serial port carries frames, so it stays quiet
    #[cfg(not(feature = "ground-station"))]
    esp_println::logger::init_logger(log::LevelFilter::Info);
    #[cfg(feature = "ground-station")]
    esp_println::logger::init_logger(log::LevelFilter::Off);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Configure SPI for LoRa
    let spi = match Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(spi::FREQUENCY_MHZ))
            .with_mode(SpiMode::_0),
    ) {
        Ok(spi) => spi,
        Err(e) => panic!("SPI configuration rejected: {:?}", e),
    };
    let spi = spi
        .with_sck(peripherals.GPIO7)
        .with_miso(peripherals.GPIO8)
        .with_mosi(peripherals.GPIO9)
        .into_async();

    // Configure LoRa control pins
    let nss = Output::new(peripherals.GPIO41, Level::High, OutputConfig::default());
    let nrst = Output::new(peripherals.GPIO42, Level::High, OutputConfig::default());

    let radio = Sx127xDriver::new(
        SpiRegisterBus::new(spi, nss),
        nrst,
        PollingCompletion::new(Delay),
        Delay,
    );

    #[cfg(feature = "ground-station")]
    let serial = esp_hal::usb_serial_jtag::UsbSerialJtag::new(peripherals.USB_DEVICE).into_async();

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        #[cfg(not(feature = "ground-station"))]
        spawner.must_spawn(async_main(spawner, radio));
        #[cfg(feature = "ground-station")]
        spawner.must_spawn(async_main(spawner, radio, serial));
    })
}

/// Bring the radio up; any failure here leaves the board without a link
async fn start_radio(radio: &mut Radio) {
    let config = ModemConfig::default();
    if let Err(e) = radio.init(&config).await {
        panic!("LoRa: init failed: {:?}", e);
    }
    if let Err(e) = radio
        .set_tx_power(
            lora_defaults::PA_BOOST,
            lora_defaults::MAX_POWER,
            lora_defaults::OUTPUT_POWER,
        )
        .await
    {
        panic!("LoRa: PA configuration failed: {:?}", e);
    }

    match radio.format_config().await {
        Ok(snapshot) => log::info!("LoRa: {}", snapshot),
        Err(e) => log::warn!("LoRa: config read-back failed: {:?}", e),
    }
}

#[cfg(not(feature = "ground-station"))]
#[embassy_executor::task]
async fn async_main(spawner: Spawner, mut radio: Radio) {
    start_radio(&mut radio).await;

    STATUS.update(|status| status.status = FlightStatus::Idle);

    let link = TelemetryLink::new(radio, &STATUS, &TARGETS);
    spawner.must_spawn(telemetry_task(link));
}

#[cfg(not(feature = "ground-station"))]
#[embassy_executor::task]
async fn telemetry_task(link: TelemetryLink<'static, Radio>) {
    picofly_link::tasks::telemetry_task(link, Delay).await
}

#[cfg(feature = "ground-station")]
#[embassy_executor::task]
async fn async_main(
    spawner: Spawner,
    mut radio: Radio,
    serial: esp_hal::usb_serial_jtag::UsbSerialJtag<'static, Async>,
) {
    start_radio(&mut radio).await;

    let (usb_rx, usb_tx) = serial.split();
    let relay = GroundRelay::new(radio, usb_tx, UPLINK.receiver());

    spawner.must_spawn(uplink_reader_task(usb_rx));
    spawner.must_spawn(ground_relay_task(relay));
}

#[cfg(feature = "ground-station")]
#[embassy_executor::task]
async fn uplink_reader_task(usb_rx: esp_hal::usb_serial_jtag::UsbSerialJtagRx<'static, Async>) {
    picofly_link::tasks::uplink_reader_task(usb_rx, UPLINK.sender()).await
}

#[cfg(feature = "ground-station")]
#[embassy_executor::task]
async fn ground_relay_task(
    relay: GroundRelay<
        'static,
        Radio,
        esp_hal::usb_serial_jtag::UsbSerialJtagTx<'static, Async>,
    >,
) {
    picofly_link::tasks::ground_relay_task(relay).await
}

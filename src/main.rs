#![no_std]
#![no_main]

mod peripherals;
mod system;

// Panic handler and debugging
use defmt::{unwrap, Debug2Format};

use defmt_rtt as _;
use panic_probe as _;

// Core
use core::cell::RefCell;

// Device
use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::{
    bind_interrupts,
    gpio::{Input, Level, Output, OutputDrive, Pin, Pull},
    interrupt::{self, InterruptExt},
    peripherals::{SPI2, TWISPI1},
    spim,
    twim::{self, Twim},
};
use embassy_sync::{
    blocking_mutex::{
        raw::{NoopRawMutex, ThreadModeRawMutex},
        Mutex,
    },
    channel::Channel,
    signal::Signal,
};
use embassy_time::{Duration, Instant, Ticker, Timer};
use heapless::Vec;
use nrf_softdevice::{
    ble::{gatt_server, peripheral},
    Softdevice,
};
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    SPIM1_SPIS1_TWIM1_TWIS1_SPI1_TWI1 => twim::InterruptHandler<TWISPI1>;
    SPIM2_SPIS2_SPI2 => spim::InterruptHandler<SPI2>;
});

// Crate
use peripherals::{
    accelerometer::{self, Accelerometer},
    backlight::Backlight,
    display::Display,
    touch::TouchController,
};
use pinetime_weather::{
    app::{Event, Outbound, WatchApp},
    clock::{self, TimeReference},
    companion::{DroppedMessages, OUTBOX_CAPACITY},
    config::WatchConfig,
    ui::WeatherWatchface,
};
use system::{
    bluetooth::{
        self, CurrentTimeServiceEvent, Server, ServerEvent, WeatherServiceEvent, ADV_DATA,
        SCAN_DATA,
    },
    config::{self as board, BACKLIGHT_LEVEL, PERIPHERAL_PRIORITY, STEP_SAMPLE_SECS},
};

// Include current UTC epoch at compile time
include!(concat!(env!("OUT_DIR"), "/utc.rs"));

type SharedI2c = I2cDevice<'static, NoopRawMutex, Twim<'static, TWISPI1>>;

// Communication channels
static EVENTS: Channel<ThreadModeRawMutex, Event, 8> = Channel::new();
static OUTBOX: Signal<ThreadModeRawMutex, Vec<u8, OUTBOX_CAPACITY>> = Signal::new();
static DROPPED: DroppedMessages = DroppedMessages::new();

static I2C_BUS: StaticCell<Mutex<NoopRawMutex, RefCell<Twim<'static, TWISPI1>>>> =
    StaticCell::new();
static SERVER: StaticCell<Server> = StaticCell::new();

fn uptime_ms() -> u64 {
    Instant::now().as_millis()
}

/// Queue an event from a context that cannot wait
fn forward(event: Event) {
    if EVENTS.try_send(event).is_err() {
        defmt::warn!("Event queue full, dropping event");
    }
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Advertise, serve the companion device and send refresh requests
#[embassy_executor::task]
async fn bluetooth_task(sd: &'static Softdevice, server: &'static Server) {
    loop {
        let config = peripheral::Config::default();
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &ADV_DATA,
            scan_data: &SCAN_DATA,
        };
        let conn = match peripheral::advertise_connectable(sd, adv, &config).await {
            Ok(conn) => conn,
            Err(e) => {
                defmt::error!("Advertising failed: {:?}", e);
                Timer::after(Duration::from_secs(5)).await;
                continue;
            }
        };
        defmt::info!("Companion connected");

        let gatt = gatt_server::run(&conn, server, |e| match e {
            ServerEvent::Weather(WeatherServiceEvent::InboxWrite(message)) => {
                if EVENTS.try_send(Event::Inbox(message)).is_err() {
                    defmt::warn!("Event queue full, dropping weather message");
                    DROPPED.record();
                }
            }
            ServerEvent::Weather(WeatherServiceEvent::OutboxCccdWrite { notifications }) => {
                defmt::debug!("Refresh notifications enabled: {}", notifications);
            }
            ServerEvent::Time(CurrentTimeServiceEvent::CurrentTimeWrite(bytes)) => {
                match clock::parse_current_time(&bytes) {
                    Ok(time) => forward(Event::SetTime(time)),
                    Err(e) => defmt::warn!("Ignoring current time: {}", e),
                }
            }
        });

        // Refresh requests are fire-and-forget
        let outbox = async {
            loop {
                let message = OUTBOX.wait().await;
                if let Err(e) = server.weather.outbox_notify(&conn, &message) {
                    defmt::warn!("Refresh request not sent: {:?}", e);
                }
            }
        };

        if let Either::First(e) = select(gatt, outbox).await {
            defmt::info!("Companion disconnected: {:?}", e);
        }
    }
}

/// Polls the touch controller every 10ms
#[embassy_executor::task]
async fn poll_touch(mut touch: TouchController<TWISPI1>) {
    loop {
        if touch.try_tap() {
            defmt::debug!("Tap");
            EVENTS.send(Event::Tap).await;
        }

        // Re-schedule the timer interrupt in 10ms
        Timer::after(Duration::from_millis(10)).await;
    }
}

/// Read the hardware step counter once a minute
#[embassy_executor::task]
async fn sample_steps(mut accelerometer: Accelerometer) {
    let mut tick = Ticker::every(Duration::from_secs(STEP_SAMPLE_SECS));
    loop {
        match accelerometer.step_count() {
            Ok(count) => EVENTS.send(Event::StepCounter(count)).await,
            Err(e) => defmt::warn!("Step counter unavailable: {:?}", Debug2Format(&e)),
        }

        tick.next().await;
    }
}

/// Drive the clock once a second
#[embassy_executor::task]
async fn update_time() {
    let mut tick = Ticker::every(Duration::from_secs(1));
    loop {
        EVENTS.send(Event::Tick).await;

        // Re-schedule the timer interrupt
        tick.next().await;
    }
}

/// Owns the watch face: handles events one at a time and redraws when needed
#[embassy_executor::task]
async fn update_lcd(mut display: Display<SPI2>, mut app: WatchApp) {
    let face = WeatherWatchface::new(app.step_renderer().copied());

    loop {
        if app.take_dirty() {
            if let Err(e) = display.draw(&face, app.face()) {
                defmt::error!("Drawing failed: {:?}", Debug2Format(&e));
            }
        }

        let event = EVENTS.receive().await;
        app.drain_dropped(&DROPPED, uptime_ms());
        if let Some(Outbound::RefreshWeather(message)) = app.handle(event, uptime_ms()) {
            OUTBOX.signal(message);
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(board::chip_config());
    defmt::info!("Initializing");

    interrupt::SPIM1_SPIS1_TWIM1_TWIS1_SPI1_TWI1.set_priority(PERIPHERAL_PRIORITY);
    interrupt::SPIM2_SPIS2_SPI2.set_priority(PERIPHERAL_PRIORITY);

    // Initialize Backlight
    let backlight = Backlight::init(
        Output::new(p.P0_14.degrade(), Level::High, OutputDrive::Standard),
        Output::new(p.P0_22.degrade(), Level::High, OutputDrive::Standard),
        Output::new(p.P0_23.degrade(), Level::High, OutputDrive::Standard),
    );

    // Initialize I2C
    let mut i2c_config = twim::Config::default();
    // Use I2C at 400KHz (the fastest clock available on the nRF52832),
    i2c_config.frequency = twim::Frequency::K400;
    let i2c = Twim::new(p.TWISPI1, Irqs, p.P0_06, p.P0_07, i2c_config);
    let i2c_bus = I2C_BUS.init(Mutex::new(RefCell::new(i2c)));

    // Initialize SPI
    let mut spim_config = spim::Config::default();
    // Use SPI at 8MHz (the fastest clock available on the nRF52832),
    // otherwise refreshing will be super slow.
    spim_config.frequency = spim::Frequency::M8;
    // SPI must be used in mode 3. Mode 0 (the default) won't work.
    spim_config.mode = spim::MODE_3;
    let spim = spim::Spim::new(p.SPI2, Irqs, p.P0_02, p.P0_04, p.P0_03, spim_config);

    // Initialize LCD
    let mut display = match Display::init(
        spim,
        Output::new(p.P0_25, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_18, Level::Low, OutputDrive::Standard),
        Output::new(p.P0_26, Level::Low, OutputDrive::Standard),
        backlight,
    ) {
        Ok(display) => display,
        Err(e) => defmt::panic!("Display init failed: {:?}", Debug2Format(&e)),
    };
    unwrap!(display.set_brightness(BACKLIGHT_LEVEL));

    // Initialize touch controller
    let touch = TouchController::init(
        I2cDevice::new(i2c_bus),
        Input::new(p.P0_28, Pull::Up), // Touchpad external interrupt pin: P0.28/AIN4 (TP_INT)
        Output::new(p.P0_10, Level::High, OutputDrive::Standard), // Touchpad reset pin: P0.10/NFC2 (TP_RESET)
    );

    // Initialize accelerometer, the face shows zero steps without it
    let accelerometer = match accelerometer::init(I2cDevice::new(i2c_bus)) {
        Ok(accelerometer) => Some(accelerometer),
        Err(e) => {
            defmt::warn!("Accelerometer unavailable: {:?}", Debug2Format(&e));
            None
        }
    };

    // Initialize Bluetooth
    let sd = Softdevice::enable(&bluetooth::softdevice_config());
    let server: &'static Server = SERVER.init(unwrap!(Server::new(sd)));
    let sd: &'static Softdevice = sd;

    // Watch face
    let config = WatchConfig::default();
    let reference = TimeReference::from_epoch(UTC_EPOCH, config.utc_offset_secs, uptime_ms());
    let app = WatchApp::new(config, reference, uptime_ms());

    defmt::info!("Initialization finished");

    // Schedule tasks
    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(bluetooth_task(sd, server)));
    unwrap!(spawner.spawn(poll_touch(touch)));
    if let Some(accelerometer) = accelerometer {
        unwrap!(spawner.spawn(sample_steps(accelerometer)));
    }
    unwrap!(spawner.spawn(update_time()));
    unwrap!(spawner.spawn(update_lcd(display, app)));
}

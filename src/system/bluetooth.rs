//! Bluetooth module
//!
//! The companion app connects as a central and talks to two services:
//!
//! - the weather service, whose `inbox` characteristic receives weather
//!   dictionaries and whose `outbox` characteristic notifies refresh requests,
//! - the standard Current Time Service to set the clock.

// Core
use core::mem;

// BLE
use nrf_softdevice::{
    self,
    ble::advertisement_builder::{
        Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList,
    },
    raw, Config,
};

use pinetime_weather::{
    clock::CURRENT_TIME_LEN,
    companion::{INBOX_CAPACITY, OUTBOX_CAPACITY},
};

/// Weather service UUID 6a3e0001-7c5b-4f61-9d1a-2f0b8c5e3a10 in little endian order
const WEATHER_SERVICE_UUID: [u8; 16] = [
    0x10, 0x3a, 0x5e, 0x8c, 0x0b, 0x2f, 0x1a, 0x9d, 0x61, 0x4f, 0x5b, 0x7c, 0x01, 0x00, 0x3e, 0x6a,
];

pub static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
    .full_name("PineTime")
    .build();

pub static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .services_128(ServiceList::Complete, &[WEATHER_SERVICE_UUID])
    .build();

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub weather: WeatherService,
    pub time: CurrentTimeService,
}

#[nrf_softdevice::gatt_service(uuid = "6a3e0001-7c5b-4f61-9d1a-2f0b8c5e3a10")]
pub struct WeatherService {
    #[characteristic(uuid = "6a3e0002-7c5b-4f61-9d1a-2f0b8c5e3a10", write, write_without_response)]
    pub inbox: heapless::Vec<u8, INBOX_CAPACITY>,
    #[characteristic(uuid = "6a3e0003-7c5b-4f61-9d1a-2f0b8c5e3a10", read, notify)]
    pub outbox: heapless::Vec<u8, OUTBOX_CAPACITY>,
}

#[nrf_softdevice::gatt_service(uuid = "1805")]
pub struct CurrentTimeService {
    #[characteristic(uuid = "2a2b", read, write)]
    pub current_time: heapless::Vec<u8, CURRENT_TIME_LEN>,
}

pub fn softdevice_config() -> Config {
    Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_XTAL as u8,
            rc_ctiv: 0,
            rc_temp_ctiv: 0,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_20_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 256 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: b"PineTime" as *const u8 as _,
            current_len: 8,
            max_len: 8,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

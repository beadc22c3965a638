//! BLE Wi-Fi provisioning firmware.
//!
//! Flash with `cargo espflash flash --features esp32 --release --monitor`.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("=== WiFi provisioning agent starting ===");

    if let Err(e) = firmware::run() {
        log::error!("Boot failed: {}", e);
    }

    // Tasks and BLE callbacks keep running; the main task just parks
    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}

#[cfg(feature = "esp32")]
mod firmware {
    use esp_idf_hal::gpio::OutputPin;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::info;
    use wifi_provision_esp32::agent;
    use wifi_provision_esp32::config::{Timing, STORAGE_CAPACITY};
    use wifi_provision_esp32::network::EspWifiLink;
    use wifi_provision_esp32::provisioning::{
        start_ble_service, AdvertisingConfig, EspAdvertiser, EspRestarter,
    };
    use wifi_provision_esp32::status::LedIndicator;
    use wifi_provision_esp32::storage::NvsMedium;
    use wifi_provision_esp32::{CredentialStore, ProvisioningServer, SystemClock};

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let timing = Timing::default();
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        // Credentials first, so every task starts from the stored pair
        let store = CredentialStore::new(NvsMedium::new(nvs.clone(), STORAGE_CAPACITY)?)?;
        let state = agent::load_state(&store);
        info!("Booting with {}", agent::describe(&state.credentials()));

        let server = ProvisioningServer::new(
            state.clone(),
            store,
            EspAdvertiser::new(AdvertisingConfig::default()),
            EspRestarter,
            timing.restart_grace,
        );
        let _ble = start_ble_service(server);

        let link = EspWifiLink::new(peripherals.modem, sysloop, Some(nvs))?;
        let indicator = LedIndicator::new(peripherals.pins.gpio2.downgrade_output())?;
        agent::start_tasks(state, link, indicator, SystemClock::new(), timing)?;
        Ok(())
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-agent' to run the agent on the host.");
}

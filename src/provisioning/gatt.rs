//! `esp32-nimble` wiring for the provisioning server.
//!
//! NimBLE callbacks are translated into [`RadioEvent`]s and delivered to one
//! shared [`ProvisioningServer`]. Callbacks run on the NimBLE host task, so
//! the server lock is held only for the duration of one handler.

use super::{Advertiser, AdvertisingConfig, ProvisioningServer, RadioError, RadioEvent, Restarter};
use crate::config::Field;
use crate::storage::StorageMedium;
use esp32_nimble::utilities::BleUuid;
use esp32_nimble::{uuid128, BLEAdvertisementData, BLEDevice, NimbleProperties};
use log::{error, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// UUID of the provisioning service.
const SERVICE_UUID: BleUuid = uuid128!("4fafc201-1fb5-459e-8fcc-c5c9c331914b");

/// UUID of the network identifier characteristic.
const NETWORK_CHAR_UUID: BleUuid = uuid128!("beb5483e-36e1-4688-b7f5-ea07361b26a8");

/// UUID of the password characteristic.
const PASSWORD_CHAR_UUID: BleUuid = uuid128!("beb5483e-36e1-4688-b7f5-ea07361b26a9");

/// Stack of the short-lived thread that waits out the restart grace period.
const RESTART_THREAD_STACK: usize = 2048;

type EspServer<M> = ProvisioningServer<M, EspAdvertiser, EspRestarter>;

fn lock<M>(server: &Mutex<EspServer<M>>) -> MutexGuard<'_, EspServer<M>> {
    server.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Advertises the provisioning service through NimBLE.
#[derive(Debug, Default)]
pub struct EspAdvertiser {
    config: AdvertisingConfig,
}

impl EspAdvertiser {
    pub fn new(config: AdvertisingConfig) -> Self {
        Self { config }
    }
}

impl Advertiser for EspAdvertiser {
    fn start_advertising(&mut self) -> Result<(), RadioError> {
        let advertising = BLEDevice::take().get_advertising();
        advertising
            .lock()
            .scan_response(self.config.scan_response)
            .set_data(
                BLEAdvertisementData::new()
                    .name(self.config.name)
                    .add_service_uuid(SERVICE_UUID),
            )
            .map_err(|e| RadioError::Advertising(format!("{:?}", e)))?;
        advertising
            .lock()
            .start()
            .map_err(|e| RadioError::Advertising(format!("{:?}", e)))?;
        Ok(())
    }
}

/// Restarts the chip with `esp_restart` after the grace period.
#[derive(Debug, Default)]
pub struct EspRestarter;

impl Restarter for EspRestarter {
    fn schedule_restart(&mut self, grace: Duration) {
        let spawned = std::thread::Builder::new()
            .name("restart".into())
            .stack_size(RESTART_THREAD_STACK)
            .spawn(move || {
                std::thread::sleep(grace);
                info!("Restarting");
                esp_idf_hal::reset::restart();
            });
        if let Err(e) = spawned {
            error!("Failed to spawn restart thread ({}), restarting now", e);
            esp_idf_hal::reset::restart();
        }
    }
}

/// Register the GATT service, hook up the callbacks and start advertising.
///
/// Returns the shared server; NimBLE keeps its own clones in the callbacks.
pub fn start_ble_service<M>(server: EspServer<M>) -> Arc<Mutex<EspServer<M>>>
where
    M: StorageMedium + 'static,
{
    let server = Arc::new(Mutex::new(server));

    let device = BLEDevice::take();
    let ble_server = device.get_server();
    // Advertising is restarted explicitly by the disconnect handler
    ble_server.advertise_on_disconnect(false);

    let on_connect = server.clone();
    ble_server.on_connect(move |_server, desc| {
        info!("[ble] Peer {:?} attached", desc.address());
        lock(&on_connect).handle(RadioEvent::LinkConnected);
    });

    let on_disconnect = server.clone();
    ble_server.on_disconnect(move |_desc, _reason| {
        lock(&on_disconnect).handle(RadioEvent::LinkDisconnected);
    });

    let service = ble_server.create_service(SERVICE_UUID);

    // Network characteristic (Read + Write)
    let network_char = service.lock().create_characteristic(
        NETWORK_CHAR_UUID,
        NimbleProperties::READ | NimbleProperties::WRITE,
    );
    network_char
        .lock()
        .set_value(lock(&server).readable_identifier().as_bytes());
    let network_read = server.clone();
    network_char.lock().on_read(move |attr, _conn| {
        attr.set_value(lock(&network_read).readable_identifier().as_bytes());
    });
    let network_write = server.clone();
    network_char.lock().on_write(move |args| {
        let bytes = args.recv_data().to_vec();
        lock(&network_write).handle(RadioEvent::FieldWritten {
            field: Field::NetworkId,
            bytes,
        });
    });

    // Password characteristic (Write only)
    let password_char = service
        .lock()
        .create_characteristic(PASSWORD_CHAR_UUID, NimbleProperties::WRITE);
    let password_write = server.clone();
    password_char.lock().on_write(move |args| {
        let bytes = args.recv_data().to_vec();
        lock(&password_write).handle(RadioEvent::FieldWritten {
            field: Field::Secret,
            bytes,
        });
    });

    lock(&server).start();
    server
}

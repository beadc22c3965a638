//! ESP32 Wi-Fi station link.
//!
//! Wraps the non-blocking `EspWifi` driver: [`begin`](NetworkLink::begin)
//! configures and starts the association and returns immediately; the
//! network manager polls [`status`](NetworkLink::status) with its own timeout.

use super::{LinkError, LinkStatus, NetworkLink};
use crate::config::Credentials;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
use esp_idf_sys::EspError;
use log::{debug, info};

/// Wi-Fi station driven by the network manager.
pub struct EspWifiLink {
    wifi: EspWifi<'static>,
}

impl EspWifiLink {
    /// Create the station driver.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<Self, EspError> {
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        Ok(Self { wifi })
    }
}

impl NetworkLink for EspWifiLink {
    fn begin(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        // Determine auth method
        let auth_method = if credentials.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let config = Configuration::Client(ClientConfiguration {
            ssid: credentials
                .ssid()
                .try_into()
                .map_err(|_| LinkError::InvalidSsid)?,
            password: credentials
                .password()
                .try_into()
                .map_err(|_| LinkError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });

        if self.wifi.is_started()? {
            // Drop any half-finished association before reconfiguring
            if let Err(e) = self.wifi.disconnect() {
                debug!("Disconnect before reconnect failed: {:?}", e);
            }
        }

        self.wifi.set_configuration(&config)?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        self.wifi.connect()?;
        info!("Association with '{}' started", credentials.ssid());
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        match (self.wifi.is_connected(), self.wifi.sta_netif().is_up()) {
            (Ok(true), Ok(true)) => LinkStatus::Connected,
            (Ok(true), _) => LinkStatus::Connecting,
            _ => LinkStatus::Disconnected,
        }
    }

    fn ip(&self) -> Option<String> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| format!("{}", info.ip))
    }
}

//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the S0 meter.
//!
//! # Layout
//!
//! Namespace `s0meter`:
//!
//! | Key      | Content                                         |
//! |----------|-------------------------------------------------|
//! | `status` | [`StoreHeader`]: magic byte + channel count      |
//! | `ch<n>`  | postcard-encoded [`ChannelConfig`] of channel n |
//!
//! - Config validation: records are range-checked before persistence.
//! - A missing or foreign header means the table cannot be trusted; `init`
//!   rewrites every record with factory defaults.
//! - Atomic writes: ESP-IDF NVS commits are atomic per nvs_commit().

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort, StoreStatus};
use crate::config::ChannelConfig;
use crate::pins::MAX_CHANNELS;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "s0meter";
const STATUS_KEY: &str = "status";

/// Marks a table written by this firmware.
const STORE_MAGIC: u8 = 0xA5;

/// Large enough for a postcard [`ChannelConfig`] with a full-length name.
const RECORD_BUF: usize = 64;

/// Integrity record guarding the channel table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct StoreHeader {
    magic: u8,
    channel_count: u8,
}

impl StoreHeader {
    const CURRENT: Self = Self {
        magic: STORE_MAGIC,
        channel_count: MAX_CHANNELS as u8,
    };
}

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        })
    }

    fn channel_key(index: u8) -> String {
        format!("ch{}", index)
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of an NVS name (max 15 characters).
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns_buf = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    fn header_valid(&self) -> bool {
        let mut buf = [0u8; 8];
        match self.read(CONFIG_NAMESPACE, STATUS_KEY, &mut buf) {
            Ok(len) => postcard::from_bytes::<StoreHeader>(&buf[..len])
                .is_ok_and(|h| h == StoreHeader::CURRENT),
            Err(_) => false,
        }
    }

    fn write_record(&mut self, index: u8, config: &ChannelConfig) -> Result<(), ConfigError> {
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write(CONFIG_NAMESPACE, &Self::channel_key(index), &bytes)?;
        Ok(())
    }

    fn check_index(index: u8) -> Result<(), ConfigError> {
        if usize::from(index) < MAX_CHANNELS {
            Ok(())
        } else {
            Err(ConfigError::InvalidIndex(index))
        }
    }
}

impl ConfigPort for NvsAdapter {
    fn init(&mut self) -> Result<StoreStatus, ConfigError> {
        if self.header_valid() {
            info!("NvsAdapter: channel table valid");
            return Ok(StoreStatus::Valid);
        }

        warn!("NvsAdapter: channel table missing or stale, restoring defaults");
        for index in 0..MAX_CHANNELS as u8 {
            self.write_record(index, &ChannelConfig::default_for(usize::from(index)))?;
        }
        let header = postcard::to_allocvec(&StoreHeader::CURRENT).map_err(|_| ConfigError::IoError)?;
        self.write(CONFIG_NAMESPACE, STATUS_KEY, &header)?;
        Ok(StoreStatus::Restored)
    }

    fn load_channel(&self, index: u8) -> Result<ChannelConfig, ConfigError> {
        Self::check_index(index)?;

        let mut buf = [0u8; RECORD_BUF];
        match self.read(CONFIG_NAMESPACE, &Self::channel_key(index), &mut buf) {
            Ok(len) => postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted),
            Err(StorageError::NotFound) => Ok(ChannelConfig::default_for(usize::from(index))),
            Err(e) => Err(e.into()),
        }
    }

    fn save_channel(&mut self, index: u8, config: &ChannelConfig) -> Result<(), ConfigError> {
        Self::check_index(index)?;
        config.validate().map_err(ConfigError::ValidationFailed)?;
        self.write_record(index, config)?;
        info!("NvsAdapter: channel {} saved", index);
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.get(&composite) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::c_name(key);
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}", e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key_buf = Self::c_name(key);
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                warn!("NvsAdapter: NVS write error {}", e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }
}

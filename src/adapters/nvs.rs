//! NVS (Non-Volatile Storage) configuration store.
//!
//! Implements [`ConfigStore`] for the stepnode. The stored blob is a
//! validity marker byte followed by the `postcard`-encoded
//! [`NodeConfig`]; a missing blob, a wrong marker or a decode failure
//! all fall back to compiled-in defaults — a node must always boot, and
//! storage faults are never surfaced to the bus.
//!
//! On ESP-IDF the blob lives in the `stepnode` NVS namespace; writes
//! commit before returning, so the save command only acknowledges after
//! the data is actually in flash. The host backend is an in-memory map
//! for tests.

use log::{info, warn};

use crate::config::NodeConfig;
use crate::error::ConfigError;
use crate::node::ports::ConfigStore;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "stepnode";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &[u8] = b"nodecfg\0";

/// First blob byte; anything else means "uninitialized or foreign".
const CONFIG_MAGIC: u8 = 0xA5;

/// Upper bound on the stored blob (marker + encoded config).
#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 64;

pub struct NvsConfigStore {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsConfigStore {
    /// Create the store and initialise the NVS flash partition.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from
            // the single main-task context before any concurrent NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("nvs: erasing and re-initialising flash partition");
                let ret2 = unsafe { nvs_flash_erase() };
                if ret2 != ESP_OK {
                    return Err(ConfigError::Io);
                }
                let ret3 = unsafe { nvs_flash_init() };
                if ret3 != ESP_OK {
                    return Err(ConfigError::Io);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::Io);
            }
            info!("nvs: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("nvs: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    fn decode(blob: &[u8]) -> Result<NodeConfig, ConfigError> {
        match blob.split_first() {
            Some((&CONFIG_MAGIC, body)) => {
                postcard::from_bytes(body).map_err(|_| ConfigError::Corrupted)
            }
            _ => Err(ConfigError::Corrupted),
        }
    }

    fn encode(config: &NodeConfig) -> Result<Vec<u8>, ConfigError> {
        let mut blob = vec![CONFIG_MAGIC];
        let body = postcard::to_allocvec(config).map_err(|_| ConfigError::Io)?;
        blob.extend_from_slice(&body);
        Ok(blob)
    }

    /// Open the config namespace, run a closure with the handle, close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns = CONFIG_NAMESPACE.as_bytes();
        ns_buf[..ns.len()].copy_from_slice(ns);

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

    #[cfg(target_os = "espidf")]
    fn read_blob() -> Option<Vec<u8>> {
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK || size == 0 || size > MAX_BLOB_SIZE {
                return Err(ret);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });
        result.ok()
    }
}

/// Range checks applied before anything reaches flash. Rejecting, not
/// clamping: a garbled config command must not end up persisted in a
/// "nearest legal" form.
fn validate(config: &NodeConfig) -> Result<(), ConfigError> {
    let s = &config.stepper;
    if s.maxpos <= s.minpos {
        return Err(ConfigError::ValidationFailed("maxpos must exceed minpos"));
    }
    if u32::from(s.maxpos) + u32::from(s.overrun) > u32::from(u16::MAX) {
        return Err(ConfigError::ValidationFailed(
            "maxpos + overrun must fit in 16 bits",
        ));
    }
    let v = &config.servo;
    if v.period == 0 {
        return Err(ConfigError::ValidationFailed("servo period must be non-zero"));
    }
    if v.pwm1 > v.period || v.pwm2 > v.period {
        return Err(ConfigError::ValidationFailed(
            "servo compare values must not exceed the period",
        ));
    }
    Ok(())
}

impl ConfigStore for NvsConfigStore {
    fn load(&self) -> NodeConfig {
        #[cfg(not(target_os = "espidf"))]
        let blob = self.store.borrow().get(CONFIG_NAMESPACE).cloned();

        #[cfg(target_os = "espidf")]
        let blob = Self::read_blob();

        match blob.as_deref().map(Self::decode) {
            Some(Ok(config)) => {
                info!("nvs: config loaded (addr {:#04x})", config.address);
                config
            }
            Some(Err(e)) => {
                warn!("nvs: {e}, using defaults");
                NodeConfig::default()
            }
            None => {
                info!("nvs: no stored config, using defaults");
                NodeConfig::default()
            }
        }
    }

    fn save(&mut self, config: &NodeConfig) -> Result<(), ConfigError> {
        validate(config)?;
        let blob = Self::encode(config)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(CONFIG_NAMESPACE.to_string(), blob);
            info!("nvs: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        CONFIG_KEY.as_ptr() as *const _,
                        blob.as_ptr() as *const _,
                        blob.len(),
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
            match result {
                Ok(()) => {
                    info!("nvs: config saved ({} bytes)", blob.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("nvs: write error {e}");
                    Err(ConfigError::Io)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        assert!(validate(&NodeConfig::default()).is_ok());
    }

    #[test]
    fn rejects_inverted_limits() {
        let mut cfg = NodeConfig::default();
        cfg.stepper.minpos = 100;
        cfg.stepper.maxpos = 50;
        assert!(matches!(
            validate(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn rejects_homing_start_overflow() {
        let mut cfg = NodeConfig::default();
        cfg.stepper.maxpos = u16::MAX - 10;
        cfg.stepper.overrun = 96;
        assert!(matches!(
            validate(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn rejects_compare_beyond_period() {
        let mut cfg = NodeConfig::default();
        cfg.servo.pwm1 = cfg.servo.period + 1;
        assert!(matches!(
            validate(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn missing_storage_loads_defaults() {
        let store = NvsConfigStore::new().unwrap();
        assert_eq!(store.load(), NodeConfig::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut store = NvsConfigStore::new().unwrap();
        let cfg = NodeConfig {
            address: 0x42,
            ack_motion: true,
            ..Default::default()
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    #[cfg(not(target_os = "espidf"))]
    fn bad_magic_falls_back_to_defaults() {
        let store = NvsConfigStore::new().unwrap();
        store
            .store
            .borrow_mut()
            .insert(CONFIG_NAMESPACE.to_string(), vec![0x00, 1, 2, 3]);
        assert_eq!(store.load(), NodeConfig::default());
    }

    #[test]
    #[cfg(not(target_os = "espidf"))]
    fn truncated_blob_falls_back_to_defaults() {
        let mut store = NvsConfigStore::new().unwrap();
        let cfg = NodeConfig::default();
        store.save(&cfg).unwrap();
        store
            .store
            .borrow_mut()
            .entry(CONFIG_NAMESPACE.to_string())
            .and_modify(|blob| blob.truncate(3));
        assert_eq!(store.load(), NodeConfig::default());
    }

    #[test]
    fn invalid_config_is_never_persisted() {
        let mut store = NvsConfigStore::new().unwrap();
        let mut cfg = NodeConfig::default();
        cfg.stepper.maxpos = 0;
        assert!(store.save(&cfg).is_err());
        assert_eq!(store.load(), NodeConfig::default());
    }
}

use heapless::String;

use crate::config::DEVICE_ID_MAX_LEN;

/// Keys the application reads from the runtime key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ThingName,
    S3ApiKey,
    S3Endpoint,
}

impl ConfigKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThingName => "CS_CORE_THING_NAME",
            Self::S3ApiKey => "CS_S3_API_KEY",
            Self::S3Endpoint => "CS_S3_ENDPOINT",
        }
    }
}

/// Reader interface for the runtime key-value store
pub trait ConfigStore {
    /// Copy the value of `key` into `buf` and return its full length.
    ///
    /// Returns `0` when the key is unset. A value longer than `buf` is cut
    /// to fit, but the returned length is still the stored one.
    fn get_string(&self, key: ConfigKey, buf: &mut [u8]) -> usize;
}

impl<S: ConfigStore + ?Sized> ConfigStore for &S {
    fn get_string(&self, key: ConfigKey, buf: &mut [u8]) -> usize {
        (**self).get_string(key, buf)
    }
}

/// Read `key` as UTF-8. `None` when unset, not UTF-8 or longer than `N`.
pub fn read_config_string<const N: usize>(
    store: &impl ConfigStore,
    key: ConfigKey,
) -> Option<String<N>> {
    let mut buf = [0u8; N];
    let len = store.get_string(key, &mut buf);
    if len == 0 || len > N {
        return None;
    }
    let value = core::str::from_utf8(&buf[..len]).ok()?;
    String::try_from(value).ok()
}

/// Device identity, used in every MQTT topic
pub fn read_device_id(store: &impl ConfigStore) -> Option<String<DEVICE_ID_MAX_LEN>> {
    read_config_string(store, ConfigKey::ThingName)
}

//! Transfer buffer singletons.
//!
//! Each buffer set lives in static memory and is handed out once, so only
//! one download and one upload can ever hold a region.

use iotc_transfer::{DownloadBuffers, UploadBuffers};
use static_cell::ConstStaticCell;

static OTA_BUFFERS: ConstStaticCell<DownloadBuffers> = ConstStaticCell::new(DownloadBuffers::new());
static RETRAIN_BUFFERS: ConstStaticCell<UploadBuffers> = ConstStaticCell::new(UploadBuffers::new());

/// Claim the OTA download buffers. `None` once claimed.
pub fn take_ota_buffers() -> Option<&'static mut DownloadBuffers> {
    OTA_BUFFERS.try_take()
}

/// Claim the retrain upload buffers. `None` once claimed.
pub fn take_retrain_buffers() -> Option<&'static mut UploadBuffers> {
    RETRAIN_BUFFERS.try_take()
}

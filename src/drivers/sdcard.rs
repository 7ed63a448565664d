// TerraLog — SD Card Volume (SPI)
//
// Mounts the FAT volume at /sd through the ESP-IDF VFS, after which all
// file I/O is plain std::fs. Raw esp_idf_sys calls for the mount itself —
// the sdspi glue has no safe wrapper that matches our IDF version.

use std::ffi::CString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use terralog::config::{
    PIN_SD_CS, PIN_SD_MISO, PIN_SD_MOSI, PIN_SD_SCK, SD_MOUNT_POINT, SD_SPI_FREQ_KHZ,
};
use terralog::peripherals::{PeripheralError, Storage};

/// A mounted SD volume. Exists from bootstrap until the end-of-burst
/// unmount; file handles never outlive a single call.
pub struct SdVolume {
    mount_point: CString,
    card: *mut esp_idf_sys::sdmmc_card_t,
    mounted: bool,
}

// The card pointer is only ever touched from the single control thread.
unsafe impl Send for SdVolume {}

impl SdVolume {
    /// Initialize the SPI bus and mount the FAT volume at /sd.
    pub fn mount() -> anyhow::Result<Self> {
        let mount_point = CString::new(SD_MOUNT_POINT)?;

        unsafe {
            let bus_cfg = esp_idf_sys::spi_bus_config_t {
                __bindgen_anon_1: esp_idf_sys::spi_bus_config_t__bindgen_ty_1 {
                    mosi_io_num: PIN_SD_MOSI,
                },
                __bindgen_anon_2: esp_idf_sys::spi_bus_config_t__bindgen_ty_2 {
                    miso_io_num: PIN_SD_MISO,
                },
                sclk_io_num: PIN_SD_SCK,
                __bindgen_anon_3: esp_idf_sys::spi_bus_config_t__bindgen_ty_3 {
                    quadwp_io_num: -1,
                },
                __bindgen_anon_4: esp_idf_sys::spi_bus_config_t__bindgen_ty_4 {
                    quadhd_io_num: -1,
                },
                max_transfer_sz: 4000,
                ..core::mem::zeroed()
            };
            esp_idf_sys::esp!(esp_idf_sys::spi_bus_initialize(
                esp_idf_sys::spi_host_device_t_SPI2_HOST,
                &bus_cfg,
                esp_idf_sys::spi_common_dma_t_SPI_DMA_CH_AUTO,
            ))?;

            // SDSPI_HOST_DEFAULT(), spelled out.
            let mut host: esp_idf_sys::sdmmc_host_t = core::mem::zeroed();
            host.flags = esp_idf_sys::SDMMC_HOST_FLAG_SPI | esp_idf_sys::SDMMC_HOST_FLAG_DEINIT_ARG;
            host.slot = esp_idf_sys::spi_host_device_t_SPI2_HOST as i32;
            host.max_freq_khz = SD_SPI_FREQ_KHZ as i32;
            host.io_voltage = 3.3;
            host.init = Some(esp_idf_sys::sdspi_host_init);
            host.set_card_clk = Some(esp_idf_sys::sdspi_host_set_card_clk);
            host.do_transaction = Some(esp_idf_sys::sdspi_host_do_transaction);
            host.__bindgen_anon_1.deinit_p = Some(esp_idf_sys::sdspi_host_remove_device);
            host.io_int_enable = Some(esp_idf_sys::sdspi_host_io_int_enable);
            host.io_int_wait = Some(esp_idf_sys::sdspi_host_io_int_wait);
            host.get_real_freq = Some(esp_idf_sys::sdspi_host_get_real_freq);

            let mut slot_cfg: esp_idf_sys::sdspi_device_config_t = core::mem::zeroed();
            slot_cfg.host_id = esp_idf_sys::spi_host_device_t_SPI2_HOST;
            slot_cfg.gpio_cs = PIN_SD_CS;
            slot_cfg.gpio_cd = -1; // no card-detect line
            slot_cfg.gpio_wp = -1;
            slot_cfg.gpio_int = -1;

            let mut mount_cfg: esp_idf_sys::esp_vfs_fat_mount_config_t = core::mem::zeroed();
            mount_cfg.format_if_mount_failed = false;
            mount_cfg.max_files = 4;

            let mut card: *mut esp_idf_sys::sdmmc_card_t = core::ptr::null_mut();
            esp_idf_sys::esp!(esp_idf_sys::esp_vfs_fat_sdspi_mount(
                mount_point.as_ptr(),
                &host,
                &slot_cfg,
                &mount_cfg,
                &mut card,
            ))?;

            log::info!("SD card mounted at {}", SD_MOUNT_POINT);
            Ok(Self {
                mount_point,
                card,
                mounted: true,
            })
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        PathBuf::from(SD_MOUNT_POINT).join(name)
    }
}

fn storage_err(e: impl std::fmt::Display) -> PeripheralError {
    PeripheralError::Storage(e.to_string())
}

impl Storage for SdVolume {
    fn root_entries(&mut self) -> Result<Vec<String>, PeripheralError> {
        let entries = fs::read_dir(SD_MOUNT_POINT).map_err(storage_err)?;
        let mut names = Vec::new();
        for entry in entries {
            names.push(entry.map_err(storage_err)?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn create(&mut self, name: &str, contents: &str) -> Result<(), PeripheralError> {
        fs::write(self.path_for(name), contents).map_err(storage_err)
    }

    fn append(&mut self, name: &str, data: &str) -> Result<(), PeripheralError> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.path_for(name))
            .map_err(storage_err)?;
        file.write_all(data.as_bytes()).map_err(storage_err)?;
        // Closing flushes through to the FAT driver; the line is durable
        // before the next sample is taken.
        Ok(())
    }

    fn free_gigabytes(&mut self) -> Result<f32, PeripheralError> {
        let mut total: u64 = 0;
        let mut free: u64 = 0;
        unsafe {
            esp_idf_sys::esp!(esp_idf_sys::esp_vfs_fat_info(
                self.mount_point.as_ptr(),
                &mut total,
                &mut free,
            ))
            .map_err(storage_err)?;
        }
        let gb = free as f32 / (1024.0 * 1024.0 * 1024.0);
        Ok((gb * 100.0).round() / 100.0)
    }

    fn unmount(&mut self) -> Result<(), PeripheralError> {
        if !self.mounted {
            return Ok(());
        }
        unsafe {
            esp_idf_sys::esp!(esp_idf_sys::esp_vfs_fat_sdcard_unmount(
                self.mount_point.as_ptr(),
                self.card,
            ))
            .map_err(storage_err)?;
        }
        self.mounted = false;
        Ok(())
    }
}

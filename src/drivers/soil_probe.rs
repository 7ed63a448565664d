// TerraLog — Capacitive Soil Probe (ADC)
//
// One-shot ADC reads via raw ESP-IDF calls. GPIO36 / ADC1_CHANNEL_0 with
// 11 dB attenuation (0–3.3 V range), 12-bit width. Classification of the
// raw count happens in the library, not here.

use terralog::peripherals::{PeripheralError, SoilProbe};

pub struct SoilProbeAdc {
    handle: esp_idf_sys::adc_oneshot_unit_handle_t,
    channel: esp_idf_sys::adc_channel_t,
}

impl SoilProbeAdc {
    /// One-time ADC setup via raw ESP-IDF calls.
    pub fn new() -> anyhow::Result<Self> {
        unsafe {
            let mut handle: esp_idf_sys::adc_oneshot_unit_handle_t = core::ptr::null_mut();
            let unit_cfg = esp_idf_sys::adc_oneshot_unit_init_cfg_t {
                unit_id: esp_idf_sys::adc_unit_t_ADC_UNIT_1,
                ulp_mode: esp_idf_sys::adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..core::mem::zeroed()
            };
            esp_idf_sys::esp!(esp_idf_sys::adc_oneshot_new_unit(&unit_cfg, &mut handle))?;

            let chan_cfg = esp_idf_sys::adc_oneshot_chan_cfg_t {
                atten: esp_idf_sys::adc_atten_t_ADC_ATTEN_DB_11,
                bitwidth: esp_idf_sys::adc_bitwidth_t_ADC_BITWIDTH_12,
            };
            let channel = esp_idf_sys::adc_channel_t_ADC_CHANNEL_0; // GPIO36
            esp_idf_sys::esp!(esp_idf_sys::adc_oneshot_config_channel(
                handle, channel, &chan_cfg
            ))?;

            log::info!("Soil probe ADC configured (ADC1_CH0, 11 dB, 12-bit)");
            Ok(Self { handle, channel })
        }
    }
}

impl SoilProbe for SoilProbeAdc {
    fn read_raw(&mut self) -> Result<u16, PeripheralError> {
        let mut raw: i32 = 0;
        let ret = unsafe { esp_idf_sys::adc_oneshot_read(self.handle, self.channel, &mut raw) };
        if ret != esp_idf_sys::ESP_OK {
            return Err(PeripheralError::Bus(format!("ADC read failed ({})", ret)));
        }
        Ok(raw.clamp(0, 4095) as u16)
    }
}
